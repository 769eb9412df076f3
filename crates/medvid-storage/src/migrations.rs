//! Database schema initialization.
//!
//! Creates the videos, transcripts and analysis tables (plus the
//! schema_migrations bookkeeping table) if they do not already exist.

use rusqlite::Connection;
use tracing::info;

use medvid_core::error::{MedvidError, Result};

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// Run all pending schema steps. Idempotent.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| MedvidError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| MedvidError::Storage(format!("Failed to query schema version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied schema v1: videos_transcripts_analysis");
    }

    Ok(())
}

/// Version 1: the three ingestion tables.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS videos (
            video_id            TEXT PRIMARY KEY NOT NULL,
            title               TEXT,
            description         TEXT,
            published_date      TEXT,
            duration_seconds    INTEGER,
            url                 TEXT
        );

        CREATE TABLE IF NOT EXISTS transcripts (
            transcript_id       INTEGER PRIMARY KEY AUTOINCREMENT,
            video_id            TEXT NOT NULL UNIQUE,
            full_transcript     TEXT,
            language            TEXT DEFAULT 'en',
            FOREIGN KEY (video_id) REFERENCES videos(video_id) ON DELETE CASCADE
        );

        -- JSON columns hold complete JSON documents or NULL.
        CREATE TABLE IF NOT EXISTS analysis (
            video_id                            TEXT PRIMARY KEY NOT NULL,
            video_type                          TEXT,
            name                                TEXT,
            age                                 TEXT,
            sex                                 TEXT,
            location                            TEXT,
            symptoms                            TEXT CHECK (symptoms IS NULL OR json_valid(symptoms)),
            medical_history_of_patient          TEXT CHECK (medical_history_of_patient IS NULL
                                                            OR json_valid(medical_history_of_patient)),
            family_medical_history              TEXT CHECK (family_medical_history IS NULL
                                                            OR json_valid(family_medical_history)),
            challenges_faced_during_diagnosis   TEXT CHECK (challenges_faced_during_diagnosis IS NULL
                                                            OR json_valid(challenges_faced_during_diagnosis)),
            key_opinion                         TEXT,
            FOREIGN KEY (video_id) REFERENCES videos(video_id) ON DELETE CASCADE
        );

        INSERT OR IGNORE INTO schema_migrations (version, name)
            VALUES (1, 'videos_transcripts_analysis');
        ",
    )
    .map_err(|e| MedvidError::Storage(format!("Failed to apply schema v1: {}", e)))?;

    Ok(())
}
