// src/aggregator.rs
//! Joins the movie-info and reviews upstreams into one [`Movie`].
//!
//! Both calls start together. Movie info is mandatory: if it fails, that failure is returned
//! right away and the in-flight reviews call is aborted. Reviews are optional only in the
//! "none exist" sense: a 404 becomes an empty list, every other failure still surfaces.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::domain::{Movie, Review};
use crate::downstream::{MovieInfoSource, MovieInfoStream, ReviewSource};
use crate::failure::Failure;

#[derive(Clone)]
pub struct Aggregator {
    movie_info: Arc<dyn MovieInfoSource>,
    reviews: Arc<dyn ReviewSource>,
}

/// Aborts the wrapped task when dropped, so an abandoned call never outlives its request.
struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Aggregator {
    pub fn new(movie_info: Arc<dyn MovieInfoSource>, reviews: Arc<dyn ReviewSource>) -> Self {
        Self {
            movie_info,
            reviews,
        }
    }

    pub async fn aggregate(&self, id: &str) -> Result<Movie, Failure> {
        let started = Instant::now();
        let result = self.aggregate_inner(id).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(f) => f.kind(),
        };
        counter!("aggregate_requests_total", "outcome" => outcome).increment(1);
        histogram!("aggregate_duration_ms").record(started.elapsed().as_secs_f64() * 1000.0);

        result
    }

    /// Relay of the movie-info upstream's record feed. Reviews play no part here.
    pub async fn movie_info_stream(&self) -> Result<MovieInfoStream, Failure> {
        let result = self.movie_info.fetch_stream().await;
        if let Err(failure) = &result {
            warn!(source = self.movie_info.name(), error = %failure, "movie info stream unavailable");
        }
        result
    }

    async fn aggregate_inner(&self, id: &str) -> Result<Movie, Failure> {
        // Reviews run on their own task; movie info runs here. Neither waits for the other.
        let reviews = Arc::clone(&self.reviews);
        let owned_id = id.to_string();
        let reviews_task = AbortOnDrop(tokio::spawn(async move {
            reviews.fetch_many(&owned_id).await
        }));

        let movie_info = match self.movie_info.fetch_one(id).await {
            Ok(mi) => mi,
            Err(failure) => {
                warn!(
                    id,
                    source = self.movie_info.name(),
                    error = %failure,
                    "movie info failed; abandoning reviews call"
                );
                // Dropping the guard aborts the reviews task without awaiting it.
                drop(reviews_task);
                return Err(failure);
            }
        };

        let review_list = match join_reviews(reviews_task).await {
            Ok(list) => list,
            Err(Failure::NotFound) => {
                info!(id, source = self.reviews.name(), "no reviews; returning empty list");
                Vec::new()
            }
            Err(failure) => {
                warn!(id, source = self.reviews.name(), error = %failure, "reviews failed");
                return Err(failure);
            }
        };

        Ok(Movie::new(movie_info, review_list))
    }
}

async fn join_reviews(mut task: AbortOnDrop<Result<Vec<Review>, Failure>>) -> Result<Vec<Review>, Failure> {
    match (&mut task.0).await {
        Ok(result) => result,
        Err(join_err) => Err(Failure::Unclassified {
            cause: format!("reviews task failed: {join_err}"),
        }),
    }
}
