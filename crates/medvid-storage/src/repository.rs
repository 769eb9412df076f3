//! Repository implementations for SQLite-backed persistence.
//!
//! Provides VideoRepository, TranscriptRepository and AnalysisRepository.
//! Every write is an upsert keyed on the video ID, so re-running an
//! ingestion overwrites rows instead of failing on conflicts.

use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;
use tracing::debug;

use medvid_core::error::{MedvidError, Result};
use medvid_core::types::{Transcript, VideoAnalysis, VideoMetadata, DEFAULT_LANGUAGE};

use crate::db::{storage_error, Database};

/// Repository for video metadata rows.
pub struct VideoRepository {
    db: Arc<Database>,
}

impl VideoRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or overwrite a video row.
    ///
    /// A blank `video_id` is derived from the URL; metadata with neither is
    /// rejected. Returns the ID the row was stored under.
    pub fn store(&self, video: &VideoMetadata) -> Result<String> {
        let video_id = video.resolved_id().ok_or_else(|| {
            MedvidError::InvalidInput(format!(
                "video has no ID and none can be derived from URL {:?}",
                video.url
            ))
        })?;

        let published = video
            .published_date
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true));

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO videos (video_id, title, description, published_date, duration_seconds, url)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(video_id) DO UPDATE SET
                    title = excluded.title,
                    description = excluded.description,
                    published_date = excluded.published_date,
                    duration_seconds = excluded.duration_seconds,
                    url = excluded.url",
                rusqlite::params![
                    video_id,
                    video.title,
                    video.description,
                    published,
                    video.duration_seconds,
                    video.url,
                ],
            )
            .map_err(|e| storage_error("Failed to store video", e))?;
            Ok(())
        })?;

        debug!(video_id = %video_id, "Video stored");
        Ok(video_id)
    }

    /// Look up a video. `Ok(None)` when no row exists.
    ///
    /// `view_count` is not persisted and is always 0 in the result.
    pub fn get(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        let row = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT video_id, title, description, published_date, duration_seconds, url
                 FROM videos WHERE video_id = ?1",
                rusqlite::params![video_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| storage_error("Failed to load video", e))
        })?;

        let Some((video_id, title, description, published, duration_seconds, url)) = row else {
            return Ok(None);
        };

        let published_date = published.as_deref().map(parse_timestamp).transpose()?;

        Ok(Some(VideoMetadata {
            video_id,
            title: title.unwrap_or_default(),
            description: description.unwrap_or_default(),
            published_date,
            duration_seconds,
            view_count: 0,
            url: url.unwrap_or_default(),
        }))
    }

    /// Every stored video ID. Order is not significant.
    pub fn all_ids(&self) -> Result<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT video_id FROM videos ORDER BY video_id")
                .map_err(|e| storage_error("Failed to prepare video ID query", e))?;

            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| storage_error("Failed to list video IDs", e))?;

            let mut ids = Vec::new();
            for row in rows {
                ids.push(row.map_err(|e| storage_error("Failed to read video ID", e))?);
            }
            Ok(ids)
        })
    }

    /// Count stored videos.
    pub fn count(&self) -> Result<u64> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
                .map_err(|e| storage_error("Failed to count videos", e))?;
            Ok(count as u64)
        })
    }
}

/// Repository for transcript rows.
pub struct TranscriptRepository {
    db: Arc<Database>,
}

impl TranscriptRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or overwrite the transcript for a video.
    ///
    /// The video must already be stored; otherwise the foreign key rejects
    /// the row and a storage error is returned.
    pub fn store(&self, transcript: &Transcript) -> Result<()> {
        if transcript.video_id.trim().is_empty() {
            return Err(MedvidError::InvalidInput(
                "transcript has an empty video ID".to_string(),
            ));
        }
        let language = if transcript.language.trim().is_empty() {
            DEFAULT_LANGUAGE
        } else {
            transcript.language.as_str()
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO transcripts (video_id, full_transcript, language)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(video_id) DO UPDATE SET
                    full_transcript = excluded.full_transcript,
                    language = excluded.language",
                rusqlite::params![transcript.video_id, transcript.full_transcript, language],
            )
            .map_err(|e| storage_error("Failed to store transcript", e))?;
            Ok(())
        })?;

        debug!(video_id = %transcript.video_id, language, "Transcript stored");
        Ok(())
    }

    /// Look up the transcript for a video. `Ok(None)` when no row exists.
    pub fn get(&self, video_id: &str) -> Result<Option<Transcript>> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT video_id, full_transcript, language FROM transcripts WHERE video_id = ?1",
                rusqlite::params![video_id],
                |row| {
                    Ok(Transcript {
                        video_id: row.get(0)?,
                        full_transcript: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        language: row
                            .get::<_, Option<String>>(2)?
                            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                    })
                },
            )
            .optional()
            .map_err(|e| storage_error("Failed to load transcript", e))
        })
    }
}

/// Repository for extracted analysis rows.
pub struct AnalysisRepository {
    db: Arc<Database>,
}

impl AnalysisRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert or overwrite the analysis for a video.
    ///
    /// JSON fields are serialized here and nowhere earlier; absent fields
    /// (and JSON `null`) are stored as SQL NULL.
    pub fn store(&self, analysis: &VideoAnalysis) -> Result<()> {
        if analysis.video_id.trim().is_empty() {
            return Err(MedvidError::InvalidInput(
                "analysis has an empty video ID".to_string(),
            ));
        }

        let symptoms = json_column(&analysis.symptoms)?;
        let medical_history = json_column(&analysis.medical_history_of_patient)?;
        let family_history = json_column(&analysis.family_medical_history)?;
        let challenges = json_column(&analysis.challenges_faced_during_diagnosis)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO analysis (
                    video_id, video_type, name, age, sex, location, symptoms,
                    medical_history_of_patient, family_medical_history,
                    challenges_faced_during_diagnosis, key_opinion)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                 ON CONFLICT(video_id) DO UPDATE SET
                    video_type = excluded.video_type,
                    name = excluded.name,
                    age = excluded.age,
                    sex = excluded.sex,
                    location = excluded.location,
                    symptoms = excluded.symptoms,
                    medical_history_of_patient = excluded.medical_history_of_patient,
                    family_medical_history = excluded.family_medical_history,
                    challenges_faced_during_diagnosis = excluded.challenges_faced_during_diagnosis,
                    key_opinion = excluded.key_opinion",
                rusqlite::params![
                    analysis.video_id,
                    analysis.video_type,
                    analysis.name,
                    analysis.age,
                    analysis.sex,
                    analysis.location,
                    symptoms,
                    medical_history,
                    family_history,
                    challenges,
                    analysis.key_opinion,
                ],
            )
            .map_err(|e| storage_error("Failed to store analysis", e))?;
            Ok(())
        })?;

        debug!(video_id = %analysis.video_id, "Analysis stored");
        Ok(())
    }

    /// Look up the analysis for a video. `Ok(None)` when no row exists.
    pub fn get(&self, video_id: &str) -> Result<Option<VideoAnalysis>> {
        type Row = (
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            Option<String>,
            [Option<String>; 4],
            Option<String>,
        );

        let row: Option<Row> = self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT video_id, video_type, name, age, sex, location, symptoms,
                        medical_history_of_patient, family_medical_history,
                        challenges_faced_during_diagnosis, key_opinion
                 FROM analysis WHERE video_id = ?1",
                rusqlite::params![video_id],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        [row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?],
                        row.get(10)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| storage_error("Failed to load analysis", e))
        })?;

        let Some((video_id, video_type, name, age, sex, location, json, key_opinion)) = row else {
            return Ok(None);
        };
        let [symptoms, medical_history, family_history, challenges] = json;

        Ok(Some(VideoAnalysis {
            video_id,
            video_type,
            name,
            age,
            sex,
            location,
            symptoms: parse_json_column(symptoms)?,
            medical_history_of_patient: parse_json_column(medical_history)?,
            family_medical_history: parse_json_column(family_history)?,
            challenges_faced_during_diagnosis: parse_json_column(challenges)?,
            key_opinion,
        }))
    }
}

/// Serialize an optional JSON value for a JSON column.
fn json_column(value: &Option<serde_json::Value>) -> Result<Option<String>> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(v) => Ok(Some(serde_json::to_string(v)?)),
    }
}

fn parse_json_column(text: Option<String>) -> Result<Option<serde_json::Value>> {
    text.map(|t| serde_json::from_str(&t).map_err(MedvidError::from))
        .transpose()
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            MedvidError::Storage(format!("Invalid published_date {:?} in database: {}", text, e))
        })
}
