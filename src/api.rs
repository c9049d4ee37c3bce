use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    BoxError, Json, Router,
};
use serde::Deserialize;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::aggregator::Aggregator;
use crate::broadcast::BroadcastLog;
use crate::config::ServiceConfig;
use crate::domain::{Movie, MovieInfo};
use crate::downstream::{build_http_client, build_stream_client, MoviesInfoClient, ReviewsClient};
use crate::failure::Failure;
use crate::store::{self, MovieInfoStore};

/// Everything the handlers share. The broadcast log is created once here and injected.
#[derive(Clone)]
pub struct AppState {
    pub aggregator: Aggregator,
    pub store: Arc<MovieInfoStore>,
    pub log: Arc<BroadcastLog<MovieInfo>>,
}

impl AppState {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            store: Arc::new(MovieInfoStore::new()),
            log: Arc::new(BroadcastLog::new()),
        }
    }

    /// Real HTTP clients for both upstreams, sharing one connection pool.
    pub fn from_config(cfg: &ServiceConfig) -> anyhow::Result<Self> {
        let http = build_http_client(cfg)?;
        let movie_info =
            MoviesInfoClient::new(http.clone(), &cfg.movies_info_url, cfg.retry_policy())?
                .with_stream_client(build_stream_client(cfg)?);
        let reviews = ReviewsClient::new(http, &cfg.reviews_url, cfg.retry_policy())?;
        Ok(Self::new(Aggregator::new(
            Arc::new(movie_info),
            Arc::new(reviews),
        )))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/v1/movies/stream", get(stream_movies))
        .route("/v1/movies/{id}", get(get_movie))
        .route("/v1/records", get(list_records).post(create_record))
        .route("/v1/records/stream", get(stream_records))
        .route(
            "/v1/records/{id}",
            get(get_record).put(update_record).delete(delete_record),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Failures surfaced by the HTTP layer, rendered as plain-text bodies.
#[derive(Debug)]
pub enum ApiError {
    Upstream { id: String, failure: Failure },
    Feed(Failure),
    Invalid(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Upstream {
                id,
                failure: Failure::NotFound,
            } => (
                StatusCode::NOT_FOUND,
                format!("There is no movie info available for the passed in Id: {id}"),
            )
                .into_response(),
            ApiError::Upstream { id, failure } => {
                error!(%id, kind = failure.kind(), error = %failure, "aggregate read failed");
                (failure.status_code(), failure.to_string()).into_response()
            }
            ApiError::Feed(failure) => (failure.status_code(), failure.to_string()).into_response(),
            ApiError::Invalid(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
        }
    }
}

async fn get_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    state
        .aggregator
        .aggregate(&id)
        .await
        .map(Json)
        .map_err(|failure| ApiError::Upstream { id, failure })
}

async fn create_record(
    State(state): State<AppState>,
    Json(mut body): Json<MovieInfo>,
) -> Result<(StatusCode, Json<MovieInfo>), ApiError> {
    store::validate(&body).map_err(ApiError::Invalid)?;
    // The store owns id generation.
    body.movie_info_id = None;

    let saved = state.store.save(body);
    state.log.append(saved.clone());
    info!(id = ?saved.movie_info_id, "record created and broadcast");
    Ok((StatusCode::CREATED, Json(saved)))
}

/// NDJSON relay of the movie-info upstream's feed. An item that fails upstream cuts the body.
async fn stream_movies(State(state): State<AppState>) -> Result<Response, ApiError> {
    let feed = state
        .aggregator
        .movie_info_stream()
        .await
        .map_err(ApiError::Feed)?;

    let lines = feed.map(|item| -> Result<Vec<u8>, BoxError> {
        let info = item.inspect_err(|failure| {
            warn!(kind = failure.kind(), error = %failure, "movie info stream broke off");
        })?;
        let mut line = serde_json::to_vec(&info)?;
        line.push(b'\n');
        Ok(line)
    });

    Ok((
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct RecordsQuery {
    year: Option<i32>,
    name: Option<String>,
}

async fn list_records(
    State(state): State<AppState>,
    Query(q): Query<RecordsQuery>,
) -> Json<Vec<MovieInfo>> {
    let rows = match (q.name, q.year) {
        (Some(name), _) => state.store.find_by_name(&name),
        (None, Some(year)) => state.store.find_by_year(year),
        (None, None) => state.store.find_all(),
    };
    Json(rows)
}

async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MovieInfo>, StatusCode> {
    state
        .store
        .find_by_id(&id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Same validation as create. 200 with the stored record, 404 for an unknown id.
async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<MovieInfo>,
) -> Result<Json<MovieInfo>, Response> {
    store::validate(&changes).map_err(|msg| ApiError::Invalid(msg).into_response())?;
    match state.store.update(&id, changes) {
        Some(updated) => {
            info!(%id, "record updated");
            Ok(Json(updated))
        }
        None => Err(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn delete_record(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    let removed = state.store.delete(&id);
    info!(%id, removed, "record delete");
    StatusCode::NO_CONTENT
}

/// NDJSON stream: full backlog, then live records. Ends only when the client hangs up.
async fn stream_records(State(state): State<AppState>) -> Response {
    let lines = state.log.subscribe().map(|info| {
        serde_json::to_vec(&info).map(|mut line| {
            line.push(b'\n');
            line
        })
    });

    (
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(lines),
    )
        .into_response()
}
