//! medvid fetch crate - video platform metadata sources.
//!
//! Provides the VideoSource trait used by the ingestion job, a
//! YouTubeClient backed by the YouTube Data API v3, and a MockVideoSource
//! for tests.

pub mod duration;
pub mod youtube;

use std::sync::atomic::{AtomicUsize, Ordering};

use medvid_core::error::{MedvidError, Result};
use medvid_core::types::VideoMetadata;

pub use duration::parse_iso8601_duration;
pub use youtube::YouTubeClient;

/// Source of video metadata.
///
/// Implementations query a video platform by keyword or by ID.
pub trait VideoSource: Send + Sync {
    /// Search for videos matching `query`, returning at most `max_results`.
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> impl std::future::Future<Output = Result<Vec<VideoMetadata>>> + Send;

    /// Fetch a single video. `Ok(None)` when the platform has no such video.
    fn fetch_video(
        &self,
        video_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<VideoMetadata>>> + Send;
}

/// In-memory video source for testing.
///
/// Search returns the configured videos in order (truncated to
/// `max_results`); fetch looks a video up by ID. Call counts are recorded.
#[derive(Debug, Default)]
pub struct MockVideoSource {
    videos: Vec<VideoMetadata>,
    fail_with: Option<String>,
    search_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockVideoSource {
    /// A source that knows about the given videos.
    pub fn with_videos(videos: Vec<VideoMetadata>) -> Self {
        Self {
            videos,
            ..Self::default()
        }
    }

    /// A source with no videos.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A source whose every call fails with a fetch error.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<()> {
        match &self.fail_with {
            Some(message) => Err(MedvidError::Fetch(message.clone())),
            None => Ok(()),
        }
    }
}

impl VideoSource for MockVideoSource {
    async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<VideoMetadata>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.videos.iter().take(max_results).cloned().collect())
    }

    async fn fetch_video(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.videos.iter().find(|v| v.video_id == video_id).cloned())
    }
}
