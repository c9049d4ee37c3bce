// tests/common/mod.rs
//
// Stub upstreams for integration tests: a real axum server on 127.0.0.1:0 that serves
// both the movie-info and the reviews routes with canned replies and counts hits.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::RawQuery,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use movies_aggregator::config::{RetrySettings, ServiceConfig};
use tokio::net::TcpListener;

pub const MOVIE_INFO_JSON: &str = include_str!("../fixtures/movieinfo.json");
pub const REVIEWS_JSON: &str = include_str!("../fixtures/reviews.json");

#[derive(Clone, Debug)]
pub struct StubReply {
    pub status: u16,
    pub body: String,
    pub delay: Duration,
}

impl StubReply {
    pub fn json(body: &str) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn after(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn respond(self) -> Response {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let status = StatusCode::from_u16(self.status).unwrap();
        (status, [(header::CONTENT_TYPE, "application/json")], self.body).into_response()
    }
}

pub struct Upstreams {
    pub addr: SocketAddr,
    pub info_hits: Arc<AtomicUsize>,
    pub review_hits: Arc<AtomicUsize>,
    pub feed_hits: Arc<AtomicUsize>,
    pub review_queries: Arc<Mutex<Vec<String>>>,
    /// Raw path (and query, if any) of every movie-info request, as received.
    pub info_paths: Arc<Mutex<Vec<String>>>,
}

impl Upstreams {
    pub fn movies_info_url(&self) -> String {
        format!("http://{}/v1/movieinfos", self.addr)
    }

    pub fn reviews_url(&self) -> String {
        format!("http://{}/v1/reviews", self.addr)
    }

    pub fn info_hits(&self) -> usize {
        self.info_hits.load(Ordering::SeqCst)
    }

    pub fn review_hits(&self) -> usize {
        self.review_hits.load(Ordering::SeqCst)
    }

    pub fn feed_hits(&self) -> usize {
        self.feed_hits.load(Ordering::SeqCst)
    }

    pub fn info_paths(&self) -> Vec<String> {
        self.info_paths.lock().unwrap().clone()
    }

    /// Config pointing at this stub, with a short retry delay so tests stay fast.
    pub fn config(&self) -> ServiceConfig {
        ServiceConfig {
            movies_info_url: self.movies_info_url(),
            reviews_url: self.reviews_url(),
            request_timeout_ms: 2_000,
            connect_timeout_ms: 1_000,
            retry: RetrySettings {
                max_retries: 3,
                delay_ms: 20,
            },
        }
    }
}

pub async fn spawn_upstreams(info: StubReply, reviews: StubReply) -> Upstreams {
    spawn_with_feed(info, reviews, StubReply::status(404, "")).await
}

/// Like [`spawn_upstreams`], plus `GET /v1/movieinfos/stream` answering with `feed`.
pub async fn spawn_with_feed(info: StubReply, reviews: StubReply, feed: StubReply) -> Upstreams {
    let info_hits = Arc::new(AtomicUsize::new(0));
    let review_hits = Arc::new(AtomicUsize::new(0));
    let feed_hits = Arc::new(AtomicUsize::new(0));
    let review_queries = Arc::new(Mutex::new(Vec::new()));
    let info_paths = Arc::new(Mutex::new(Vec::new()));

    // Catch-all under the movie-info prefix so escaped paths are still seen.
    let info_handler = {
        let hits = info_hits.clone();
        let paths = info_paths.clone();
        move |uri: Uri| {
            hits.fetch_add(1, Ordering::SeqCst);
            let raw = uri
                .path_and_query()
                .map(|pq| pq.as_str().to_string())
                .unwrap_or_default();
            paths.lock().unwrap().push(raw);
            info.clone().respond()
        }
    };
    let reviews_handler = {
        let hits = review_hits.clone();
        let queries = review_queries.clone();
        move |RawQuery(q): RawQuery| {
            hits.fetch_add(1, Ordering::SeqCst);
            queries.lock().unwrap().push(q.unwrap_or_default());
            reviews.clone().respond()
        }
    };
    let feed_handler = {
        let hits = feed_hits.clone();
        move || {
            hits.fetch_add(1, Ordering::SeqCst);
            feed.clone().respond()
        }
    };

    let app = Router::new()
        .route("/v1/movieinfos/stream", get(feed_handler))
        .route("/v1/reviews", get(reviews_handler))
        .fallback(info_handler);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Upstreams {
        addr,
        info_hits,
        review_hits,
        feed_hits,
        review_queries,
        info_paths,
    }
}

/// An address nothing is listening on.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
