// src/downstream/mod.rs
pub mod movie_info;
pub mod reviews;

use std::time::Duration;

use anyhow::Context as _;
use axum::http::StatusCode;
use metrics::counter;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::config::ServiceConfig;
use crate::domain::{MovieInfo, Review};
use crate::failure::Failure;

pub use movie_info::MoviesInfoClient;
pub use reviews::ReviewsClient;

/// Live movie-info feed. Ends when the upstream closes it or after the first failed item.
pub type MovieInfoStream = UnboundedReceiverStream<Result<MovieInfo, Failure>>;

/// Raw result of one HTTP attempt, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    Response { status: u16, body: String },
    Transport(String),
}

/// Map one HTTP outcome to the success body or a [`Failure`]. No I/O, no state.
pub fn classify(source: &str, outcome: HttpOutcome) -> Result<String, Failure> {
    let (status, body) = match outcome {
        HttpOutcome::Transport(cause) => return Err(Failure::Unclassified { cause }),
        HttpOutcome::Response { status, body } => (status, body),
    };

    match status {
        200..=299 => Ok(body),
        404 => Err(Failure::NotFound),
        400..=499 => {
            let message = if body.trim().is_empty() {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|c| c.canonical_reason())
                    .unwrap_or("client error")
                    .to_string()
            } else {
                body
            };
            Err(Failure::ClientError { message, status })
        }
        500..=599 => Err(Failure::ServerError {
            message: format!("Server Exception in {source} responseMessage {body}"),
        }),
        other => Err(Failure::Unclassified {
            cause: format!("unexpected status {other} from {source}"),
        }),
    }
}

#[async_trait::async_trait]
pub trait MovieInfoSource: Send + Sync + 'static {
    async fn fetch_one(&self, id: &str) -> Result<MovieInfo, Failure>;

    /// Open the upstream's record feed. Sources without one say so as an unclassified failure.
    async fn fetch_stream(&self) -> Result<MovieInfoStream, Failure> {
        Err(Failure::Unclassified {
            cause: format!("{} has no record stream", self.name()),
        })
    }

    fn name(&self) -> &'static str;
}

#[async_trait::async_trait]
pub trait ReviewSource: Send + Sync + 'static {
    async fn fetch_many(&self, movie_info_id: &str) -> Result<Vec<Review>, Failure>;
    fn name(&self) -> &'static str;
}

/// Shared reqwest client; per-attempt timeouts come from config.
pub fn build_http_client(cfg: &ServiceConfig) -> anyhow::Result<Client> {
    build_http_client_with(cfg.connect_timeout(), cfg.request_timeout())
}

pub fn build_http_client_with(connect: Duration, request: Duration) -> anyhow::Result<Client> {
    let http = Client::builder()
        .user_agent(concat!("movies-aggregator/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(connect)
        .timeout(request)
        .build()?;
    Ok(http)
}

/// Client for long-lived feeds: connect timeout only, no cap on the whole exchange.
pub fn build_stream_client(cfg: &ServiceConfig) -> anyhow::Result<Client> {
    let http = Client::builder()
        .user_agent(concat!("movies-aggregator/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(cfg.connect_timeout())
        .build()?;
    Ok(http)
}

/// Parse an upstream base URL once. Trailing slashes are dropped so both clients join alike.
pub fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).with_context(|| format!("invalid upstream url {raw:?}"))?;
    anyhow::ensure!(
        !url.cannot_be_a_base(),
        "upstream url {raw:?} cannot take path segments"
    );
    Ok(url)
}

/// `base` with one more path segment. `/`, `?`, `#` and `%` in `segment` are percent-encoded.
pub(crate) fn join_segment(base: &Url, segment: &str) -> Result<Url, Failure> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Failure::Unclassified {
            cause: format!("{base} cannot take path segments"),
        })?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

fn transport(source: &str, e: &reqwest::Error) -> HttpOutcome {
    if e.is_timeout() {
        HttpOutcome::Transport(format!("{source} request timed out: {e}"))
    } else {
        HttpOutcome::Transport(format!("{source} request failed: {e}"))
    }
}

async fn read_outcome(source: &str, resp: Response) -> HttpOutcome {
    let status = resp.status().as_u16();
    match resp.text().await {
        Ok(body) => HttpOutcome::Response { status, body },
        Err(e) => HttpOutcome::Transport(format!("reading {source} response: {e}")),
    }
}

fn record_attempt<T>(source: &'static str, result: &Result<T, Failure>) {
    let outcome_label = match result {
        Ok(_) => "ok",
        Err(f) => f.kind(),
    };
    counter!("downstream_requests_total", "source" => source, "outcome" => outcome_label)
        .increment(1);
}

/// One GET attempt: send, read the body, classify, decode.
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    source: &'static str,
    url: &Url,
    query: &[(&str, &str)],
) -> Result<T, Failure> {
    let outcome = match http.get(url.clone()).query(query).send().await {
        Ok(resp) => read_outcome(source, resp).await,
        Err(e) => transport(source, &e),
    };

    if let HttpOutcome::Response { status, .. } = &outcome {
        tracing::info!(source, status = *status, url = %url, "downstream responded");
    }

    let result = classify(source, outcome).and_then(|body| {
        serde_json::from_str::<T>(&body).map_err(|e| Failure::Unclassified {
            cause: format!("decoding {source} response: {e}"),
        })
    });
    record_attempt(source, &result);
    result
}

/// One attempt at opening a streaming GET. A 2xx hands back the live response; anything else
/// is read to the end and classified like a unary call.
pub(crate) async fn open_stream(
    http: &Client,
    source: &'static str,
    url: &Url,
) -> Result<Response, Failure> {
    let result = match http.get(url.clone()).send().await {
        Ok(resp) if resp.status().is_success() => Ok(resp),
        Ok(resp) => {
            let status = resp.status().as_u16();
            tracing::info!(source, status, url = %url, "downstream refused stream");
            match classify(source, read_outcome(source, resp).await) {
                Err(failure) => Err(failure),
                Ok(_) => Err(Failure::Unclassified {
                    cause: format!("unexpected status {status} from {source}"),
                }),
            }
        }
        Err(e) => match classify(source, transport(source, &e)) {
            Err(failure) => Err(failure),
            Ok(_) => Err(Failure::Unclassified {
                cause: format!("{source} request failed: {e}"),
            }),
        },
    };
    record_attempt(source, &result);
    result
}

/// Split an NDJSON response body into decoded items on `tx`.
///
/// Stops at end of body, after the first failed item, or as soon as the receiver is dropped.
pub(crate) async fn pump_ndjson<T: DeserializeOwned>(
    source: &'static str,
    mut resp: Response,
    tx: UnboundedSender<Result<T, Failure>>,
) {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let chunk = tokio::select! {
            _ = tx.closed() => return,
            chunk = resp.chunk() => chunk,
        };
        match chunk {
            Ok(Some(bytes)) => {
                buf.extend_from_slice(&bytes);
                while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    if !forward_line(source, &line, &tx) {
                        return;
                    }
                }
            }
            Ok(None) => {
                forward_line(source, &buf, &tx);
                return;
            }
            Err(e) => {
                let _ = tx.send(Err(Failure::Unclassified {
                    cause: format!("reading {source} stream: {e}"),
                }));
                return;
            }
        }
    }
}

/// Decode and send one line; blank lines are skipped. `false` means stop pumping.
fn forward_line<T: DeserializeOwned>(
    source: &str,
    line: &[u8],
    tx: &UnboundedSender<Result<T, Failure>>,
) -> bool {
    let line = line.trim_ascii();
    if line.is_empty() {
        return true;
    }
    let item = serde_json::from_slice::<T>(line).map_err(|e| Failure::Unclassified {
        cause: format!("decoding {source} stream item: {e}"),
    });
    let keep_going = item.is_ok();
    tx.send(item).is_ok() && keep_going
}

/// Spawn the pump for `resp` and hand back the receiving end.
pub(crate) fn ndjson_stream<T: DeserializeOwned + Send + 'static>(
    source: &'static str,
    resp: Response,
) -> UnboundedReceiverStream<Result<T, Failure>> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(pump_ndjson(source, resp, tx));
    UnboundedReceiverStream::new(rx)
}
