//! End-to-end persistence tests against an on-disk database.
//!
//! Each test connects through `Database::connect` the way the binary does,
//! so the retry path, schema initialization and explicit close are covered
//! together with the repository queries.

use std::sync::Arc;

use serde_json::json;

use medvid_core::config::StorageConfig;
use medvid_core::error::MedvidError;
use medvid_core::types::{Transcript, VideoAnalysis, VideoMetadata};
use medvid_storage::{AnalysisRepository, Database, TranscriptRepository, VideoRepository};

fn config_for(dir: &tempfile::TempDir) -> StorageConfig {
    StorageConfig {
        database_url: format!("sqlite://{}", dir.path().join("medvid.db").display()),
        connect_attempts: 2,
        connect_retry_delay_ms: 0,
        busy_timeout_ms: 1000,
    }
}

fn video(id: &str, title: &str) -> VideoMetadata {
    let mut v = VideoMetadata::new(id, title);
    v.description = format!("description for {}", id);
    v.duration_seconds = Some(300);
    v
}

#[tokio::test]
async fn test_rows_survive_reconnect() {
    let dir = tempfile::tempdir().unwrap();

    {
        let db = Arc::new(Database::connect(&config_for(&dir)).await.unwrap());
        let videos = VideoRepository::new(Arc::clone(&db));
        videos.store(&video("v1", "first")).unwrap();
        videos.store(&video("v2", "second")).unwrap();
        drop(videos);
        Arc::try_unwrap(db).unwrap().close().unwrap();
    }

    let db = Arc::new(Database::connect(&config_for(&dir)).await.unwrap());
    let videos = VideoRepository::new(Arc::clone(&db));
    let mut ids = videos.all_ids().unwrap();
    ids.sort();
    assert_eq!(ids, vec!["v1", "v2"]);
    assert_eq!(videos.get("v2").unwrap().unwrap().title, "second");
}

#[tokio::test]
async fn test_store_order_does_not_matter_for_listing() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::connect(&config_for(&dir)).await.unwrap());
    let videos = VideoRepository::new(Arc::clone(&db));

    let order = ["m", "z", "a", "m", "q", "a"];
    for id in order {
        videos.store(&video(id, id)).unwrap();
    }

    let mut ids = videos.all_ids().unwrap();
    ids.sort();
    assert_eq!(ids, vec!["a", "m", "q", "z"]);
}

#[tokio::test]
async fn test_dependents_require_video_and_follow_it() {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(Database::connect(&config_for(&dir)).await.unwrap());
    let videos = VideoRepository::new(Arc::clone(&db));
    let transcripts = TranscriptRepository::new(Arc::clone(&db));
    let analyses = AnalysisRepository::new(Arc::clone(&db));

    assert!(matches!(
        transcripts.store(&Transcript::new("v1", "text")),
        Err(MedvidError::Storage(_))
    ));
    assert!(matches!(
        analyses.store(&VideoAnalysis::new("v1")),
        Err(MedvidError::Storage(_))
    ));

    videos.store(&video("v1", "t")).unwrap();
    transcripts.store(&Transcript::new("v1", "text")).unwrap();
    let mut analysis = VideoAnalysis::new("v1");
    analysis.symptoms = Some(json!(["headache"]));
    analyses.store(&analysis).unwrap();

    // Re-storing the video must not disturb its dependents.
    videos.store(&video("v1", "retitled")).unwrap();
    assert_eq!(transcripts.get("v1").unwrap().unwrap().full_transcript, "text");
    assert_eq!(
        analyses.get("v1").unwrap().unwrap().symptoms,
        Some(json!(["headache"]))
    );
}

#[tokio::test]
async fn test_schema_init_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::connect(&config_for(&dir)).await.unwrap();
    db.init_schema().unwrap();
    db.init_schema().unwrap();
    db.ping().unwrap();
    db.close().unwrap();
}
