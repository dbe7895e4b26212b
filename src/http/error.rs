//! Mapping from internal failures to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::{error, warn};

use super::dto::ErrorEnvelope;
use crate::fetcher::FetchError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Query string or path segment that does not deserialize
    #[error("{0}")]
    BadRequest(String),

    /// Misconfigured upstream base URL and similar local faults
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Fetch(FetchError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Fetch(_) => StatusCode::BAD_GATEWAY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            AppError::Fetch(FetchError::UpstreamError { status_code, url }) => {
                error!(%url, upstream_status = status_code, "upstream returned an error status");
            }
            AppError::Fetch(FetchError::ParseError { url, snippet }) => {
                error!(%url, %snippet, "upstream payload could not be parsed");
            }
            AppError::Fetch(e) => error!(url = %e.url(), error = %e, "upstream request failed"),
            AppError::BadRequest(msg) => warn!(error = %msg, "rejected request"),
            AppError::Internal(msg) => error!(error = %msg, "internal error"),
        }

        (status, Json(ErrorEnvelope::new(self.to_string()))).into_response()
    }
}
