use std::{future::Future, time::Duration};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Failure of a pipeline operation, classified by where it happened.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or disallowed input, detected before any network call.
    #[error("{0}")]
    Validation(String),
    /// Entity absent or not owned by the caller.
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    /// Asset host rejected or failed an upload/destroy.
    #[error("upload failed: {0:#}")]
    Upload(anyhow::Error),
    /// Image generation failed or returned nothing usable.
    #[error("{0:#}")]
    Generation(anyhow::Error),
    #[error("persist failed: {0:#}")]
    Persist(anyhow::Error),
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

/// Marker placed in an error chain when an external call ran out of time.
#[derive(Debug, Error)]
#[error("{what} timed out after {secs}s", secs = .after.as_secs())]
pub struct TimedOut {
    pub what: &'static str,
    pub after: Duration,
}

pub async fn with_timeout<T, F>(after: Duration, what: &'static str, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(res) => res,
        Err(_) => {
            warn!(what, secs = after.as_secs(), "external call timed out");
            Err(TimedOut { what, after }.into())
        }
    }
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    /// Timeouts of external calls may succeed on resubmission.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Upload(e) | AppError::Generation(e) => {
                e.chain().any(|cause| cause.is::<TimedOut>())
            }
            _ => false,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            _ if self.is_retryable() => StatusCode::GATEWAY_TIMEOUT,
            AppError::Upload(_)
            | AppError::Generation(_)
            | AppError::Persist(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Server-side failures are reported with `message` only.
    pub fn masked(self, message: &'static str) -> ApiError {
        ApiError {
            error: self,
            message,
            echo_detail: false,
        }
    }

    /// Like [`AppError::masked`], but the underlying error text is sent back in `error`.
    pub fn echoed(self, message: &'static str) -> ApiError {
        ApiError {
            error: self,
            message,
            echo_detail: true,
        }
    }
}

/// An [`AppError`] bound to the user-facing message of the endpoint that produced it.
#[derive(Debug)]
pub struct ApiError {
    error: AppError,
    message: &'static str,
    echo_detail: bool,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let mut body = if status.is_server_error() {
            error!(error = %self.error, %status, "request failed");
            json!({ "message": self.message })
        } else {
            json!({ "message": self.error.to_string() })
        };
        if self.echo_detail && status.is_server_error() {
            body["error"] = json!(self.error.to_string());
        }
        if self.error.is_retryable() {
            body["retryable"] = json!(true);
        }
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.masked("Internal server error").into_response()
    }
}
