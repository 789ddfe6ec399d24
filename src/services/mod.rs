//! Request-level operations behind the HTTP handlers.
//!
//! Each service receives only the collaborators it uses (store, cache,
//! generator) and speaks [`AppError`] so handlers can return its results
//! directly.

pub mod post_lesson;
pub mod sessions;

pub use post_lesson::PostLessonService;
pub use sessions::SessionService;

use crate::error::{AppError, AppResult};
use crate::model::SessionId;

/// Client-supplied IDs that do not parse can never name a session.
pub fn parse_session_id(raw: &str) -> AppResult<SessionId> {
    SessionId::parse(raw).ok_or_else(|| AppError::NotFound(format!("invalid session ID: {}", raw)))
}
