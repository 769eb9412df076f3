//! Ingestion job.
//!
//! Runs the three phases of an ingestion in order:
//! 1. Fetch: one video by ID, or a keyword search bounded by `max_results`
//! 2. Store: sequential upsert of every fetched record
//! 3. Output: JSON files or one JSON line per record on a stream
//!
//! Fetch failures and empty results abort the run. Store failures are
//! recorded per item and the batch continues.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use medvid_core::error::{MedvidError, Result};
use medvid_core::types::VideoMetadata;
use medvid_fetch::VideoSource;
use medvid_storage::{Database, VideoRepository};

use crate::output::{self, OutputPlan, OutputSummary};

/// Default bound on keyword search results.
pub const DEFAULT_MAX_RESULTS: usize = 1000;

/// What a run fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestTarget {
    /// Keyword search for a disease name.
    Disease { name: String, max_results: usize },
    /// A single video by platform ID.
    VideoId(String),
}

/// Outcome of storing one fetched record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ItemOutcome {
    Stored { video_id: String },
    Failed { video_id: String, error: String },
}

impl ItemOutcome {
    pub fn video_id(&self) -> &str {
        match self {
            ItemOutcome::Stored { video_id } | ItemOutcome::Failed { video_id, .. } => video_id,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, ItemOutcome::Stored { .. })
    }
}

/// Per-item results of the store phase, in fetch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn stored_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_stored()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.stored_count()
    }

    pub fn failed(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| !o.is_stored())
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone)]
pub struct IngestReport {
    /// Every fetched record, whether or not it was stored.
    pub records: Vec<VideoMetadata>,
    pub batch: BatchReport,
    pub output: OutputSummary,
}

/// Fetch, store and output for one run.
pub struct IngestJob<S: VideoSource> {
    source: S,
    videos: VideoRepository,
}

impl<S: VideoSource> IngestJob<S> {
    pub fn new(source: S, db: Arc<Database>) -> Self {
        Self {
            source,
            videos: VideoRepository::new(db),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run every phase. `stream` receives JSON lines when the plan names no files.
    pub async fn run<W: Write>(
        &self,
        target: &IngestTarget,
        plan: &OutputPlan,
        stream: &mut W,
    ) -> Result<IngestReport> {
        let records = self.fetch(target).await?;
        let batch = self.store_all(&records);
        let output = output::emit(plan, &records, stream)?;

        info!(
            fetched = records.len(),
            stored = batch.stored_count(),
            failed = batch.failed_count(),
            "Ingestion complete"
        );

        Ok(IngestReport {
            records,
            batch,
            output,
        })
    }

    /// Fetch phase. Errors with `NotFound` for a missing single video and
    /// `NoResults` when nothing was fetched at all.
    pub async fn fetch(&self, target: &IngestTarget) -> Result<Vec<VideoMetadata>> {
        let records = match target {
            IngestTarget::VideoId(video_id) => {
                info!(video_id = %video_id, "Fetching single video");
                match self.source.fetch_video(video_id).await? {
                    Some(video) => vec![video],
                    None => {
                        warn!(video_id = %video_id, "No metadata found for video");
                        return Err(MedvidError::NotFound(video_id.clone()));
                    }
                }
            }
            IngestTarget::Disease { name, max_results } => {
                info!(disease = %name, max_results, "Searching videos");
                self.source.search(name, *max_results).await?
            }
        };

        if records.is_empty() {
            warn!("Fetch produced no videos");
            return Err(MedvidError::NoResults);
        }

        info!(count = records.len(), "Fetch complete");
        Ok(records)
    }

    /// Store phase. Never fails as a whole; see the returned report.
    pub fn store_all(&self, records: &[VideoMetadata]) -> BatchReport {
        let mut report = BatchReport::default();

        for record in records {
            let outcome = match self.videos.store(record) {
                Ok(video_id) => {
                    debug!(video_id = %video_id, "Stored video");
                    ItemOutcome::Stored { video_id }
                }
                Err(e) => {
                    warn!(video_id = %record.video_id, error = %e, "Failed to store video, continuing");
                    ItemOutcome::Failed {
                        video_id: record.video_id.clone(),
                        error: e.to_string(),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        info!(
            stored = report.stored_count(),
            failed = report.failed_count(),
            "Store phase complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medvid_fetch::MockVideoSource;

    fn job(videos: Vec<VideoMetadata>) -> (Arc<Database>, IngestJob<MockVideoSource>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let job = IngestJob::new(MockVideoSource::with_videos(videos), Arc::clone(&db));
        (db, job)
    }

    fn unstorable() -> VideoMetadata {
        let mut v = VideoMetadata::new("", "no id anywhere");
        v.url = "https://example.com/clip".to_string();
        v
    }

    #[tokio::test]
    async fn test_fetch_single_video() {
        let (_db, job) = job(vec![VideoMetadata::new("a", "A"), VideoMetadata::new("b", "B")]);
        let records = job.fetch(&IngestTarget::VideoId("b".to_string())).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].video_id, "b");
        assert_eq!(job.source().search_calls(), 0);
    }

    #[tokio::test]
    async fn test_fetch_missing_single_video() {
        let (_db, job) = job(vec![VideoMetadata::new("a", "A")]);
        let err = job
            .fetch(&IngestTarget::VideoId("zzz".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, MedvidError::NotFound(ref id) if id == "zzz"));
    }

    #[tokio::test]
    async fn test_fetch_search_bounded() {
        let videos = (0..10)
            .map(|i| VideoMetadata::new(format!("v{}", i), "t"))
            .collect();
        let (_db, job) = job(videos);
        let records = job
            .fetch(&IngestTarget::Disease {
                name: "sarcoidosis".to_string(),
                max_results: 4,
            })
            .await
            .unwrap();
        assert_eq!(records.len(), 4);
    }

    #[tokio::test]
    async fn test_fetch_empty_search_is_error() {
        let (_db, job) = job(vec![]);
        let err = job
            .fetch(&IngestTarget::Disease {
                name: "nothing".to_string(),
                max_results: DEFAULT_MAX_RESULTS,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MedvidError::NoResults));
    }

    #[test]
    fn test_store_all_continues_after_failure() {
        let (db, job) = job(vec![]);
        let records = vec![
            VideoMetadata::new("first", "1"),
            unstorable(),
            VideoMetadata::new("third", "3"),
        ];

        let report = job.store_all(&records);
        assert_eq!(report.len(), 3);
        assert_eq!(report.stored_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert!(report.outcomes[0].is_stored());
        assert!(!report.outcomes[1].is_stored());
        assert!(report.outcomes[2].is_stored());

        let mut ids = VideoRepository::new(db).all_ids().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["first", "third"]);
    }

    #[test]
    fn test_batch_report_failed_iter() {
        let report = BatchReport {
            outcomes: vec![
                ItemOutcome::Stored {
                    video_id: "a".to_string(),
                },
                ItemOutcome::Failed {
                    video_id: "b".to_string(),
                    error: "boom".to_string(),
                },
            ],
        };
        let failed: Vec<_> = report.failed().map(|o| o.video_id()).collect();
        assert_eq!(failed, vec!["b"]);
        assert!(!report.is_empty());
    }

    #[test]
    fn test_item_outcome_json() {
        let outcome = ItemOutcome::Failed {
            video_id: "b".to_string(),
            error: "boom".to_string(),
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["video_id"], "b");
    }
}
