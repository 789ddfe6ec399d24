//! SQLite-backed [`SessionStore`].
//!
//! Sessions live in one table with their configuration in plain columns and
//! the generated artifacts as JSON text. Segments get their own table keyed
//! by `(session_id, seq)`, where `seq` is assigned inside the insert so the
//! append order survives even when callers hand out duplicate indices.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{schema, SessionStore, StoreError};
use crate::model::{
    Flashcard, Segment, Session, SessionConfig, SessionId, SessionMode, SessionStatus, Summary, VocabItem,
};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

const SESSION_COLUMNS: &str = "id, teacher_name, class_name, subject, course_outline, source_lang, \
     target_lang, voice_type, mode, noise_cancellation, status, summary, vocabulary, flashcards, \
     created_at, updated_at";

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: DbPool,
}

impl SqliteSessionStore {
    /// Open (or create) the database file and run migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if path.as_ref() == Path::new(":memory:") {
            return Self::open_in_memory();
        }
        let manager =
            SqliteConnectionManager::file(path).with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(4).build(manager)?;
        Self::migrate(pool)
    }

    /// In-memory database. Each connection would get its own empty database,
    /// so the pool is capped at one.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let manager =
            SqliteConnectionManager::memory().with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager)?;
        Self::migrate(pool)
    }

    fn migrate(pool: DbPool) -> Result<Self, StoreError> {
        let conn = pool.get()?;
        schema::init(&conn)?;
        drop(conn);

        tracing::info!(version = schema::SCHEMA_VERSION, "Session store initialized");
        Ok(Self { pool })
    }

    /// Run blocking SQLite work off the async runtime.
    async fn with_conn<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            work(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Database(format!("store task failed: {}", e)))?
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn insert(&self, config: SessionConfig) -> Result<Session, StoreError> {
        self.with_conn(move |conn| {
            let id = SessionId::new();
            let now = Utc::now();
            let stamp = format_time(&now);

            conn.execute(
                "INSERT INTO sessions (id, teacher_name, class_name, subject, course_outline, source_lang,
                     target_lang, voice_type, mode, noise_cancellation, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
                params![
                    id.to_string(),
                    config.teacher_name,
                    config.class_name,
                    config.subject,
                    config.course_outline,
                    config.source_lang,
                    config.target_lang,
                    config.voice_type,
                    config.mode.as_str(),
                    config.noise_cancellation,
                    SessionStatus::Active.as_str(),
                    stamp,
                ],
            )?;

            Ok(Session {
                id,
                config,
                status: SessionStatus::Active,
                segments: Vec::new(),
                summary: None,
                vocabulary: Vec::new(),
                flashcards: Vec::new(),
                created_at: now,
                updated_at: now,
            })
        })
        .await
    }

    async fn find_one(&self, id: SessionId) -> Result<Session, StoreError> {
        self.with_conn(move |conn| fetch(conn, id)).await
    }

    async fn find_all(&self) -> Result<Vec<Session>, StoreError> {
        self.with_conn(|conn| {
            let rows = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM sessions ORDER BY created_at DESC, rowid DESC",
                    SESSION_COLUMNS
                ))?;
                let rows = stmt.query_map([], read_row)?.collect::<Result<Vec<_>, _>>()?;
                rows
            };

            rows.into_iter()
                .map(|row| {
                    let segments = load_segments(conn, &row.id)?;
                    row.into_session(segments)
                })
                .collect()
        })
        .await
    }

    async fn update(&self, id: SessionId, config: SessionConfig, status: SessionStatus) -> Result<Session, StoreError> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE sessions SET teacher_name = ?2, class_name = ?3, subject = ?4, course_outline = ?5,
                     source_lang = ?6, target_lang = ?7, voice_type = ?8, mode = ?9,
                     noise_cancellation = ?10, status = ?11, updated_at = ?12
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    config.teacher_name,
                    config.class_name,
                    config.subject,
                    config.course_outline,
                    config.source_lang,
                    config.target_lang,
                    config.voice_type,
                    config.mode.as_str(),
                    config.noise_cancellation,
                    status.as_str(),
                    format_time(&Utc::now()),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(id));
            }
            fetch(conn, id)
        })
        .await
    }

    async fn append_segment(&self, id: SessionId, segment: Segment) -> Result<(), StoreError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if touch(&tx, id)? == 0 {
                return Err(StoreError::NotFound(id));
            }

            tx.execute(
                "INSERT INTO segments (session_id, seq, idx, original_text, translated_text, timestamp)
                 VALUES (?1, (SELECT COALESCE(MAX(seq) + 1, 0) FROM segments WHERE session_id = ?1),
                         ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    segment.index,
                    segment.original_text,
                    segment.translated_text,
                    format_time(&segment.timestamp),
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn set_summary(&self, id: SessionId, summary: Summary) -> Result<(), StoreError> {
        let json = serde_json::to_string(&summary)?;
        self.with_conn(move |conn| set_artifact(conn, id, "summary", json)).await
    }

    async fn set_vocabulary(&self, id: SessionId, vocabulary: Vec<VocabItem>) -> Result<(), StoreError> {
        let json = serde_json::to_string(&vocabulary)?;
        self.with_conn(move |conn| set_artifact(conn, id, "vocabulary", json)).await
    }

    async fn set_flashcards(&self, id: SessionId, flashcards: Vec<Flashcard>) -> Result<(), StoreError> {
        let json = serde_json::to_string(&flashcards)?;
        self.with_conn(move |conn| set_artifact(conn, id, "flashcards", json)).await
    }
}

/// Raw `sessions` row, before the JSON columns and segments are attached.
struct SessionRow {
    id: String,
    config: SessionConfig,
    status: String,
    summary: Option<String>,
    vocabulary: String,
    flashcards: String,
    created_at: String,
    updated_at: String,
}

impl SessionRow {
    fn into_session(self, segments: Vec<Segment>) -> Result<Session, StoreError> {
        let id = SessionId::parse(&self.id)
            .ok_or_else(|| StoreError::Database(format!("invalid session id in store: {}", self.id)))?;

        Ok(Session {
            id,
            config: self.config,
            status: SessionStatus::from_str(&self.status).unwrap_or_default(),
            segments,
            summary: self.summary.map(|json| serde_json::from_str(&json)).transpose()?,
            vocabulary: serde_json::from_str(&self.vocabulary)?,
            flashcards: serde_json::from_str(&self.flashcards)?,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<SessionRow> {
    let mode: String = row.get(8)?;
    Ok(SessionRow {
        id: row.get(0)?,
        config: SessionConfig {
            teacher_name: row.get(1)?,
            class_name: row.get(2)?,
            subject: row.get(3)?,
            course_outline: row.get(4)?,
            source_lang: row.get(5)?,
            target_lang: row.get(6)?,
            voice_type: row.get(7)?,
            mode: SessionMode::from_str(&mode).unwrap_or_default(),
            noise_cancellation: row.get(9)?,
        },
        status: row.get(10)?,
        summary: row.get(11)?,
        vocabulary: row.get(12)?,
        flashcards: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn fetch(conn: &Connection, id: SessionId) -> Result<Session, StoreError> {
    let key = id.to_string();
    let row = conn
        .query_row(
            &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
            [&key],
            read_row,
        )
        .optional()?
        .ok_or(StoreError::NotFound(id))?;

    let segments = load_segments(conn, &key)?;
    row.into_session(segments)
}

fn load_segments(conn: &Connection, session_id: &str) -> Result<Vec<Segment>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT idx, original_text, translated_text, timestamp
         FROM segments WHERE session_id = ?1 ORDER BY seq",
    )?;
    let rows = stmt
        .query_map([session_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(index, original_text, translated_text, timestamp)| {
            Ok(Segment {
                index,
                original_text,
                translated_text,
                timestamp: parse_time(&timestamp)?,
            })
        })
        .collect()
}

/// Bump `updated_at`; returns the number of sessions touched (0 or 1).
fn touch(conn: &Connection, id: SessionId) -> Result<usize, StoreError> {
    Ok(conn.execute(
        "UPDATE sessions SET updated_at = ?2 WHERE id = ?1",
        params![id.to_string(), format_time(&Utc::now())],
    )?)
}

fn set_artifact(conn: &Connection, id: SessionId, column: &'static str, json: String) -> Result<(), StoreError> {
    let changed = conn.execute(
        &format!("UPDATE sessions SET {} = ?2, updated_at = ?3 WHERE id = ?1", column),
        params![id.to_string(), json, format_time(&Utc::now())],
    )?;
    if changed == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

/// Fixed-width RFC 3339 so text ordering matches time ordering.
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Database(format!("invalid timestamp {:?}: {}", raw, e)))
}
