//! # Lesson Generation
//!
//! Turns a lesson transcript into post-lesson study material through a
//! chat-completion LLM. The rest of the service only sees the
//! [`LessonGenerator`] trait; a failed call is a [`GenerationError`] and is
//! never retried here.

pub mod openrouter;
pub mod prompts;

pub use openrouter::OpenRouterGenerator;

use crate::model::{Flashcard, Segment, Summary, VocabItem};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("LLM returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM returned no choices")]
    EmptyResponse,

    #[error("failed to parse {artifact} response: {source}")]
    Parse {
        artifact: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// What a generator needs to know about a lesson.
#[derive(Debug, Clone, Copy)]
pub struct Lesson<'a> {
    pub segments: &'a [Segment],
    pub source_lang: &'a str,
    pub target_lang: &'a str,
}

#[async_trait]
pub trait LessonGenerator: Send + Sync {
    async fn summary(&self, lesson: Lesson<'_>) -> Result<Summary, GenerationError>;

    async fn vocabulary(&self, lesson: Lesson<'_>) -> Result<Vec<VocabItem>, GenerationError>;

    async fn flashcards(&self, lesson: Lesson<'_>) -> Result<Vec<Flashcard>, GenerationError>;
}
