// tests/aggregator.rs
//
// Aggregator semantics with in-process fake sources (no sockets). The tokio clock is paused,
// so latencies are exact and the tests run instantly.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use movies_aggregator::domain::{MovieInfo, Review};
use movies_aggregator::downstream::{MovieInfoSource, ReviewSource};
use movies_aggregator::{Aggregator, Failure};
use tokio::time::Instant;

struct FakeInfo {
    latency: Duration,
    result: Result<MovieInfo, Failure>,
}

#[async_trait::async_trait]
impl MovieInfoSource for FakeInfo {
    async fn fetch_one(&self, _id: &str) -> Result<MovieInfo, Failure> {
        tokio::time::sleep(self.latency).await;
        self.result.clone()
    }
    fn name(&self) -> &'static str {
        "FakeInfo"
    }
}

struct FakeReviews {
    latency: Duration,
    result: Result<Vec<Review>, Failure>,
    started: Arc<AtomicUsize>,
    finished: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl ReviewSource for FakeReviews {
    async fn fetch_many(&self, _movie_info_id: &str) -> Result<Vec<Review>, Failure> {
        self.started.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.finished.store(true, Ordering::SeqCst);
        self.result.clone()
    }
    fn name(&self) -> &'static str {
        "FakeReviews"
    }
}

fn batman() -> MovieInfo {
    MovieInfo {
        movie_info_id: Some("123".into()),
        name: "Batman Begins".into(),
        description: None,
        cast: vec!["Christian Bale".into(), "Michael Cane".into()],
        release_date: None,
        year: Some(2005),
    }
}

fn review(id: &str, comment: &str) -> Review {
    Review {
        review_id: Some(id.into()),
        movie_info_id: "123".into(),
        comment: Some(comment.into()),
        rating: Some(9.0),
    }
}

struct Harness {
    aggregator: Aggregator,
    reviews_started: Arc<AtomicUsize>,
    reviews_finished: Arc<AtomicBool>,
}

fn harness(
    info: (Duration, Result<MovieInfo, Failure>),
    reviews: (Duration, Result<Vec<Review>, Failure>),
) -> Harness {
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));
    let aggregator = Aggregator::new(
        Arc::new(FakeInfo {
            latency: info.0,
            result: info.1,
        }),
        Arc::new(FakeReviews {
            latency: reviews.0,
            result: reviews.1,
            started: started.clone(),
            finished: finished.clone(),
        }),
    );
    Harness {
        aggregator,
        reviews_started: started,
        reviews_finished: finished,
    }
}

const MS_100: Duration = Duration::from_millis(100);

#[tokio::test(start_paused = true)]
async fn batman_begins_with_two_reviews() {
    let reviews = vec![review("1", "Awesome Movie"), review("2", "Excellent Movie")];
    let h = harness((MS_100, Ok(batman())), (MS_100, Ok(reviews.clone())));

    let movie = h.aggregator.aggregate("123").await.unwrap();
    assert_eq!(movie.movie_info.name, "Batman Begins");
    assert_eq!(movie.review_list.len(), 2);
    assert_eq!(movie.review_list, reviews);
}

#[tokio::test(start_paused = true)]
async fn both_calls_run_concurrently() {
    let h = harness((MS_100, Ok(batman())), (MS_100, Ok(vec![])));

    let started = Instant::now();
    h.aggregator.aggregate("123").await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= MS_100, "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(150), "calls serialized: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn missing_movie_info_does_not_wait_for_reviews() {
    let h = harness(
        (Duration::from_millis(10), Err(Failure::NotFound)),
        (Duration::from_secs(30), Ok(vec![review("1", "late")])),
    );

    let started = Instant::now();
    let out = h.aggregator.aggregate("123").await;

    assert_eq!(out, Err(Failure::NotFound));
    assert!(started.elapsed() < Duration::from_secs(1));

    // The abandoned reviews call is aborted, not left running to completion.
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!h.reviews_finished.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn movie_info_server_error_propagates_unchanged() {
    let failure = Failure::ServerError {
        message: "Server Exception in MoviesInfoService responseMessage down".into(),
    };
    let h = harness((MS_100, Err(failure.clone())), (MS_100, Ok(vec![])));

    assert_eq!(h.aggregator.aggregate("123").await, Err(failure));
}

#[tokio::test(start_paused = true)]
async fn reviews_not_found_degrades_to_empty_list() {
    let h = harness((MS_100, Ok(batman())), (MS_100, Err(Failure::NotFound)));

    let movie = h.aggregator.aggregate("123").await.unwrap();
    assert_eq!(movie.movie_info, batman());
    assert!(movie.review_list.is_empty());
}

#[tokio::test(start_paused = true)]
async fn reviews_empty_list_is_success() {
    let h = harness((MS_100, Ok(batman())), (MS_100, Ok(vec![])));

    let movie = h.aggregator.aggregate("123").await.unwrap();
    assert!(movie.review_list.is_empty());
}

#[tokio::test(start_paused = true)]
async fn reviews_server_error_fails_the_aggregate() {
    let failure = Failure::ServerError {
        message: "Server Exception in ReviewsService responseMessage boom".into(),
    };
    let h = harness((MS_100, Ok(batman())), (MS_100, Err(failure.clone())));

    assert_eq!(h.aggregator.aggregate("123").await, Err(failure));
}

#[tokio::test(start_paused = true)]
async fn reviews_client_error_is_surfaced_not_swallowed() {
    let failure = Failure::ClientError {
        message: "bad movieInfoId".into(),
        status: 400,
    };
    let h = harness((MS_100, Ok(batman())), (MS_100, Err(failure.clone())));

    assert_eq!(h.aggregator.aggregate("123").await, Err(failure));
}

#[tokio::test(start_paused = true)]
async fn every_call_refetches_both_sources() {
    let h = harness((MS_100, Ok(batman())), (MS_100, Ok(vec![])));

    h.aggregator.aggregate("123").await.unwrap();
    h.aggregator.aggregate("123").await.unwrap();
    assert_eq!(h.reviews_started.load(Ordering::SeqCst), 2);
}
