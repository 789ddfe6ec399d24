//! Database schema and migrations

use rusqlite::Connection;

use super::StoreError;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Bring the schema up to [`SCHEMA_VERSION`].
pub fn init(conn: &Connection) -> Result<(), StoreError> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r"
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            teacher_name TEXT NOT NULL DEFAULT '',
            class_name TEXT NOT NULL DEFAULT '',
            subject TEXT NOT NULL DEFAULT '',
            course_outline TEXT NOT NULL DEFAULT '',
            source_lang TEXT NOT NULL DEFAULT '',
            target_lang TEXT NOT NULL DEFAULT '',
            voice_type TEXT NOT NULL DEFAULT '',
            mode TEXT NOT NULL DEFAULT 'realtime',
            noise_cancellation INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'active',
            summary TEXT,
            vocabulary TEXT NOT NULL DEFAULT '[]',
            flashcards TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_created ON sessions(created_at);

        -- seq preserves append order; idx is the advisory index the caller assigned
        CREATE TABLE IF NOT EXISTS segments (
            session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            seq INTEGER NOT NULL,
            idx INTEGER NOT NULL,
            original_text TEXT NOT NULL,
            translated_text TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            PRIMARY KEY (session_id, seq)
        );

        PRAGMA user_version = 1;
        ",
    )?;

    Ok(())
}
