// src/downstream/reviews.rs
use reqwest::{Client, Url};
use tracing::info;

use super::{build_http_client, get_json, parse_base_url, ReviewSource};
use crate::config::ServiceConfig;
use crate::domain::Review;
use crate::failure::Failure;
use crate::retry::{self, RetryPolicy};

pub const REVIEWS_SOURCE: &str = "ReviewsService";
/// Query parameter the reviews upstream filters on.
pub const CORRELATION_KEY: &str = "movieInfoId";

/// Client for the reviews upstream: `GET {base_url}?movieInfoId={id}`.
#[derive(Clone)]
pub struct ReviewsClient {
    http: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl ReviewsClient {
    pub fn new(http: Client, base_url: &str, retry: RetryPolicy) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            base_url: parse_base_url(base_url)?,
            retry,
        })
    }

    pub fn from_config(cfg: &ServiceConfig) -> anyhow::Result<Self> {
        let http = build_http_client(cfg)?;
        Self::new(http, &cfg.reviews_url, cfg.retry_policy())
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl ReviewSource for ReviewsClient {
    async fn fetch_many(&self, movie_info_id: &str) -> Result<Vec<Review>, Failure> {
        info!(
            source = REVIEWS_SOURCE,
            url = %self.base_url,
            movie_info_id,
            "retrieving reviews"
        );

        let http = &self.http;
        let url = &self.base_url;
        let query = [(CORRELATION_KEY, movie_info_id)];
        let query = &query[..];
        retry::run(&self.retry, REVIEWS_SOURCE, move || {
            get_json::<Vec<Review>>(http, REVIEWS_SOURCE, url, query)
        })
        .await
    }

    fn name(&self) -> &'static str {
        REVIEWS_SOURCE
    }
}
