//! Error mapping for the control surface
//!
//! Translates manager facade errors into HTTP status codes and a JSON
//! error body. Partial command batches also report how many commands were
//! accepted before the failure.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use machgate_core::Error;

/// An error response: status code, message, and (for command batches) how
/// many commands were accepted before the failure.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status returned to the client.
    pub status: StatusCode,
    /// Human-readable error message.
    pub message: String,
    /// Commands accepted before the failure, for partial batches.
    pub accepted: Option<usize>,
}

impl ApiError {
    /// Build a plain bad-request error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            accepted: None,
        }
    }

    /// Attach the accepted-count to a batch failure.
    pub fn with_accepted(mut self, accepted: usize) -> Self {
        self.accepted = Some(accepted);
        self
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match &err {
            Error::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            Error::ResourceExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Error::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::AlreadyResumed => StatusCode::CONFLICT,
            Error::Transport(_) => StatusCode::BAD_GATEWAY,
            Error::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
            accepted: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.accepted {
            Some(accepted) => serde_json::json!({
                "error": self.message,
                "accepted": accepted,
            }),
            None => serde_json::json!({ "error": self.message }),
        };
        (self.status, Json(body)).into_response()
    }
}
