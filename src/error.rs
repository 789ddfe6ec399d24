//! # Error Handling
//!
//! The HTTP-facing error type and how it is rendered.
//!
//! Components keep their own `thiserror` enums ([`StoreError`],
//! [`PushError`], [`GenerationError`], ...). They are folded into
//! [`AppError`] at the service boundary, and `AppError` turns itself into a
//! JSON response through actix's `ResponseError`.
//!
//! ## Error Categories:
//! - **Internal**: server-side problems (500)
//! - **BadRequest**: the client sent something unusable (400)
//! - **NotFound**: unknown or malformed session ID, or a missing artifact (404)
//! - **Upstream**: the speech pipeline failed during push-to-talk (502)
//! - **Generation**: the LLM could not produce an artifact (502)
//! - **Unavailable**: the relay is at capacity (503)
//!
//! ## JSON Response Format:
//! ```json
//! {
//!   "error": {
//!     "type": "not_found",
//!     "message": "session 6f1c... not found",
//!     "timestamp": "2025-01-01T12:00:00Z"
//!   }
//! }
//! ```

use crate::llm::GenerationError;
use crate::push::PushError;
use crate::store::StoreError;
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Internal(String),
    BadRequest(String),
    NotFound(String),
    /// A pipeline phase failed; the message names the phase
    Upstream(String),
    Generation(String),
    Unavailable(String),
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, &str) {
        match self {
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.as_str()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.as_str()),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "upstream_error", msg.as_str()),
            AppError::Generation(msg) => (StatusCode::BAD_GATEWAY, "generation_error", msg.as_str()),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg.as_str()),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Upstream(msg) => write!(f, "Pipeline error: {}", msg),
            AppError::Generation(msg) => write!(f, "Generation failed: {}", msg),
            AppError::Unavailable(msg) => write!(f, "Unavailable: {}", msg),
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.parts().0
    }

    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = self.parts();
        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// JSON parsing errors are almost always the client's fault.
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppError::NotFound(err.to_string()),
            StoreError::Database(_) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<PushError> for AppError {
    fn from(err: PushError) -> Self {
        AppError::Upstream(format!("{} phase: {}", err.phase(), err))
    }
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        AppError::Generation(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
