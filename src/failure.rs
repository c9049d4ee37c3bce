// src/failure.rs
//! Failure taxonomy for downstream calls. Every failed attempt maps to exactly one variant.

use axum::http::StatusCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Failure {
    /// Upstream answered 404.
    #[error("not found")]
    NotFound,
    /// Any other 4xx; `message` is the upstream body (or the reason phrase when empty).
    #[error("{message}")]
    ClientError { message: String, status: u16 },
    /// 5xx; `message` already names the failing source.
    #[error("{message}")]
    ServerError { message: String },
    /// Connection refused, timeout, unreadable or undecodable body.
    #[error("{cause}")]
    Unclassified { cause: String },
}

impl Failure {
    /// Only server errors are worth another attempt; 4xx and transport failures fail fast.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Failure::ServerError { .. })
    }

    /// HTTP status we answer with when this failure surfaces to our caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Failure::NotFound => StatusCode::NOT_FOUND,
            Failure::ClientError { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST)
            }
            Failure::ServerError { .. } | Failure::Unclassified { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Failure::NotFound => "not_found",
            Failure::ClientError { .. } => "client_error",
            Failure::ServerError { .. } => "server_error",
            Failure::Unclassified { .. } => "unclassified",
        }
    }
}
