//! # Session Store
//!
//! The persistent source of truth for sessions. Everything else (the cache,
//! the relay, the push-to-talk flow, the post-lesson services) talks to it
//! through the [`SessionStore`] trait, so the backing database can be swapped
//! without touching the callers.
//!
//! ## Guarantees:
//! - `find_all` returns sessions newest first.
//! - Segments are append-only and come back in append order.
//! - Every write bumps `updated_at`.
//! - Operations on an unknown ID fail with [`StoreError::NotFound`].

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteSessionStore;

use crate::model::{Flashcard, Segment, Session, SessionConfig, SessionId, SessionStatus, Summary, VocabItem};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(SessionId),

    #[error("database error: {0}")]
    Database(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<r2d2::Error> for StoreError {
    fn from(err: r2d2::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Database(format!("corrupt artifact column: {}", err))
    }
}

/// Persistent session collaborator.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a new `active` session from its configuration.
    async fn insert(&self, config: SessionConfig) -> Result<Session, StoreError>;

    async fn find_one(&self, id: SessionId) -> Result<Session, StoreError>;

    /// All sessions, newest first.
    async fn find_all(&self) -> Result<Vec<Session>, StoreError>;

    /// Replace the configuration and status of an existing session.
    async fn update(&self, id: SessionId, config: SessionConfig, status: SessionStatus) -> Result<Session, StoreError>;

    /// Append one segment to the end of the session's transcript.
    async fn append_segment(&self, id: SessionId, segment: Segment) -> Result<(), StoreError>;

    async fn set_summary(&self, id: SessionId, summary: Summary) -> Result<(), StoreError>;

    async fn set_vocabulary(&self, id: SessionId, vocabulary: Vec<VocabItem>) -> Result<(), StoreError>;

    async fn set_flashcards(&self, id: SessionId, flashcards: Vec<Flashcard>) -> Result<(), StoreError>;
}
