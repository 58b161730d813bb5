//! Error types for the HTTP API
//!
//! The pipeline answers denials, validation failures and unimplemented
//! operations itself. What reaches this module is everything it could not
//! answer for.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use srf_core::{BodyError, DispatchError};
use thiserror::Error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Body over the configured limit (413)
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge {
        /// Configured limit in bytes
        limit: usize,
    },

    /// Internal server error (500)
    #[error("Internal error: {message}")]
    Internal {
        /// Public message
        message: String,
        /// Error chain, exposed only in debug mode
        details: Option<String>,
    },

    /// Service unavailable (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    /// Map a dispatch failure; `debug` exposes the error chain on 5xx
    pub fn from_dispatch(err: DispatchError, debug: bool) -> Self {
        let details = debug.then(|| err_chain(&err));

        match err {
            DispatchError::BodyRead(BodyError::TooLarge { limit }) => {
                ApiError::PayloadTooLarge { limit }
            }
            DispatchError::BodyRead(body) => ApiError::BadRequest(body.to_string()),
            DispatchError::Overloaded(_) => {
                ApiError::ServiceUnavailable("Too many blocking requests in flight".to_string())
            }
            DispatchError::Handler(_)
            | DispatchError::WorkerPanicked(_)
            | DispatchError::DataMismatch { .. } => ApiError::Internal {
                message: "Internal server error".to_string(),
                details,
            },
        }
    }

    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::Internal { .. } => "internal_error",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
        }
    }
}

fn err_chain(err: &DispatchError) -> String {
    let mut chain = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        chain.push_str(": ");
        chain.push_str(&cause.to_string());
        source = cause.source();
    }
    chain
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.kind().to_string();
        crate::metrics::record_error(self.kind());

        let (message, details) = match self {
            ApiError::BadRequest(msg) | ApiError::ServiceUnavailable(msg) => (msg, None),
            ApiError::PayloadTooLarge { limit } => {
                (format!("Request body exceeds {} bytes", limit), None)
            }
            ApiError::Internal { message, details } => (message, details),
        };

        let body = Json(ErrorResponse {
            error,
            message,
            details,
        });

        (status, body).into_response()
    }
}
