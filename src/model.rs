//! # Session Data Model
//!
//! The shapes shared by the relay, the push-to-talk flow, the persistent store
//! and the cache. A [`Session`] owns an ordered, append-only list of
//! [`Segment`]s plus the artifacts generated after the lesson (summary,
//! vocabulary, flashcards).
//!
//! ## Ownership:
//! The store owns session records. The relay and push flows only ever hold a
//! [`SessionId`] and append segments through the store; they never keep a
//! mutable copy of the record around.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, unique session identifier.
///
/// The nil UUID is never a valid session ID; it plays the role of the
/// "no session bound yet" value on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh random ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied ID.
    ///
    /// Returns `None` for anything that is not a well-formed, non-nil UUID.
    pub fn parse(raw: &str) -> Option<Self> {
        match Uuid::parse_str(raw.trim()) {
            Ok(uuid) if !uuid.is_nil() => Some(Self(uuid)),
            _ => None,
        }
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the client talks to the pipeline during a lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Continuous bidirectional streaming through the session relay
    #[default]
    Realtime,
    /// One audio clip in, one translation out, per request
    PushToTalk,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Realtime => "realtime",
            SessionMode::PushToTalk => "push_to_talk",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "realtime" => Some(SessionMode::Realtime),
            "push_to_talk" => Some(SessionMode::PushToTalk),
            _ => None,
        }
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn from_str(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

/// Lesson configuration chosen by the teacher at setup time.
///
/// Every field defaults so partially filled setup forms still deserialize.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub teacher_name: String,
    pub class_name: String,
    pub subject: String,
    pub course_outline: String,
    pub source_lang: String,
    pub target_lang: String,
    pub voice_type: String,
    pub mode: SessionMode,
    pub noise_cancellation: bool,
}

/// One timestamped utterance/translation pair. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Position within the session, taken as the segment count at append time
    pub index: i64,
    pub original_text: String,
    pub translated_text: String,
    /// When the segment was captured
    pub timestamp: DateTime<Utc>,
}

impl Segment {
    /// Build a segment stamped with the current time.
    pub fn new(index: i64, original_text: impl Into<String>, translated_text: impl Into<String>) -> Self {
        Self {
            index,
            original_text: original_text.into(),
            translated_text: translated_text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Bilingual lesson summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub th: String,
    pub en: String,
}

/// One vocabulary entry extracted from a lesson.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabItem {
    pub th: String,
    pub en: String,
    pub phonetic: String,
    /// "beginner", "intermediate" or "advanced"
    pub difficulty: String,
    pub example: String,
}

/// One study flashcard.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
    pub example: String,
}

/// A persisted lesson session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    #[serde(flatten)]
    pub config: SessionConfig,
    pub status: SessionStatus,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Summary>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vocabulary: Vec<VocabItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flashcards: Vec<Flashcard>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of a session update: the full configuration plus the new status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpdate {
    #[serde(flatten)]
    pub config: SessionConfig,
    #[serde(default)]
    pub status: SessionStatus,
}
