use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Language code assigned to transcripts when none is given.
pub const DEFAULT_LANGUAGE: &str = "en";

// =============================================================================
// Video metadata
// =============================================================================

/// Metadata for a single platform video.
///
/// `published_date` and `duration_seconds` stay `None` when the platform did
/// not report them (or the stored row holds NULL). Consumers that expect the
/// flat defaulted shape use [`VideoMetadata::published_date_or_default`] and
/// [`VideoMetadata::duration_or_default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(default, rename = "durationInSeconds")]
    pub duration_seconds: Option<i64>,
    /// Not persisted. Always 0 for metadata read back from storage.
    #[serde(default)]
    pub view_count: u64,
    pub url: String,
}

impl VideoMetadata {
    /// Create metadata with the canonical watch URL and no optional fields.
    pub fn new(video_id: impl Into<String>, title: impl Into<String>) -> Self {
        let video_id = video_id.into();
        let url = canonical_video_url(&video_id);
        Self {
            video_id,
            title: title.into(),
            description: String::new(),
            published_date: None,
            duration_seconds: None,
            view_count: 0,
            url,
        }
    }

    /// Published timestamp as RFC 3339, or an empty string when unknown.
    pub fn published_date_or_default(&self) -> String {
        self.published_date
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default()
    }

    /// Duration in seconds, or 0 when unknown.
    pub fn duration_or_default(&self) -> i64 {
        self.duration_seconds.unwrap_or(0)
    }

    /// The ID to persist under: the explicit ID, or one derived from the URL.
    pub fn resolved_id(&self) -> Option<String> {
        let id = self.video_id.trim();
        if !id.is_empty() {
            return Some(id.to_string());
        }
        video_id_from_url(&self.url)
    }
}

/// Canonical watch URL for a video ID.
pub fn canonical_video_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

/// Extract a video ID from the common YouTube URL forms.
///
/// Handles `watch?v=<id>`, `youtu.be/<id>`, `/shorts/<id>` and `/embed/<id>`.
/// Returns `None` when no non-empty ID can be found.
pub fn video_id_from_url(url: &str) -> Option<String> {
    let url = url.trim();

    if let Some((_, query)) = url.split_once('?') {
        let query = query.split('#').next().unwrap_or(query);
        let from_query = query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))
            .filter(|v| !v.is_empty());
        if let Some(id) = from_query {
            return Some(id.to_string());
        }
    }

    for marker in ["youtu.be/", "/shorts/", "/embed/"] {
        if let Some(idx) = url.find(marker) {
            let rest = &url[idx + marker.len()..];
            let id: String = rest
                .chars()
                .take_while(|c| !matches!(c, '?' | '&' | '/' | '#'))
                .collect();
            if !id.is_empty() {
                return Some(id);
            }
        }
    }

    None
}

// =============================================================================
// Transcripts
// =============================================================================

/// Full transcript text for a video.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub video_id: String,
    pub full_transcript: String,
    pub language: String,
}

impl Transcript {
    /// Create a transcript in the default language.
    pub fn new(video_id: impl Into<String>, full_transcript: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            full_transcript: full_transcript.into(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

// =============================================================================
// Analysis
// =============================================================================

/// Narrative fields extracted from a video's transcript.
///
/// The list-like fields hold arbitrary JSON (usually arrays of strings or
/// objects) and are only serialized to text when written to storage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoAnalysis {
    pub video_id: String,
    pub video_type: Option<String>,
    pub name: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    pub location: Option<String>,
    pub symptoms: Option<serde_json::Value>,
    pub medical_history_of_patient: Option<serde_json::Value>,
    pub family_medical_history: Option<serde_json::Value>,
    pub challenges_faced_during_diagnosis: Option<serde_json::Value>,
    pub key_opinion: Option<String>,
}

impl VideoAnalysis {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
            ..Self::default()
        }
    }
}
