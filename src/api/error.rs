//! Error responses of the API.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::error;

use super::types::ErrorResponse;
use crate::config::ConfigError;

/// Failure to start a run.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request values out of range or unparsable.
    #[error("invalid run request: {0}")]
    InvalidRequest(ConfigError),
    /// The server's scenario cannot build an engine.
    #[error("scenario rejected: {0}")]
    Scenario(ConfigError),
    /// Engine construction panicked or was cancelled.
    #[error("run setup failed: {0}")]
    Setup(#[from] JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Scenario(_) | Self::Setup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Offending field, when the error names one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidRequest(e) | Self::Scenario(e) => Some(&e.field),
            Self::Setup(_) => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "cannot start run");
        }
        let body = ErrorResponse {
            error: self.to_string(),
            field: self.field().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}
