// src/downstream/movie_info.rs
use reqwest::{Client, Url};
use tracing::info;

use super::{
    build_http_client, build_stream_client, get_json, join_segment, ndjson_stream, open_stream,
    parse_base_url, MovieInfoSource, MovieInfoStream,
};
use crate::config::ServiceConfig;
use crate::domain::MovieInfo;
use crate::failure::Failure;
use crate::retry::{self, RetryPolicy};

pub const MOVIES_INFO_SOURCE: &str = "MoviesInfoService";
/// Path segment of the upstream's NDJSON record feed.
pub const STREAM_SEGMENT: &str = "stream";

/// Client for the movie-info upstream: `GET {base_url}/{id}` and `GET {base_url}/stream`.
#[derive(Clone)]
pub struct MoviesInfoClient {
    http: Client,
    // no total timeout here; the feed stays open for as long as the upstream keeps it
    stream_http: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl MoviesInfoClient {
    pub fn new(http: Client, base_url: &str, retry: RetryPolicy) -> anyhow::Result<Self> {
        Ok(Self {
            stream_http: http.clone(),
            http,
            base_url: parse_base_url(base_url)?,
            retry,
        })
    }

    /// Use a separate client for the long-lived record feed.
    pub fn with_stream_client(mut self, stream_http: Client) -> Self {
        self.stream_http = stream_http;
        self
    }

    pub fn from_config(cfg: &ServiceConfig) -> anyhow::Result<Self> {
        let http = build_http_client(cfg)?;
        Ok(Self::new(http, &cfg.movies_info_url, cfg.retry_policy())?
            .with_stream_client(build_stream_client(cfg)?))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl MovieInfoSource for MoviesInfoClient {
    async fn fetch_one(&self, id: &str) -> Result<MovieInfo, Failure> {
        // Dot segments would be resolved away by the URL, so they can never name a record.
        if matches!(id, "." | "..") {
            return Err(Failure::NotFound);
        }
        let url = join_segment(&self.base_url, id)?;
        info!(source = MOVIES_INFO_SOURCE, %url, "retrieving movie info");

        let http = &self.http;
        let url = &url;
        retry::run(&self.retry, MOVIES_INFO_SOURCE, move || {
            get_json::<MovieInfo>(http, MOVIES_INFO_SOURCE, url, &[])
        })
        .await
    }

    async fn fetch_stream(&self) -> Result<MovieInfoStream, Failure> {
        let url = join_segment(&self.base_url, STREAM_SEGMENT)?;
        info!(source = MOVIES_INFO_SOURCE, %url, "retrieving movie info stream");

        let http = &self.stream_http;
        let url = &url;
        let resp = retry::run(&self.retry, MOVIES_INFO_SOURCE, move || {
            open_stream(http, MOVIES_INFO_SOURCE, url)
        })
        .await?;
        Ok(ndjson_stream(MOVIES_INFO_SOURCE, resp))
    }

    fn name(&self) -> &'static str {
        MOVIES_INFO_SOURCE
    }
}
