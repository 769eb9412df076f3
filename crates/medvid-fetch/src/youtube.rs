//! YouTube Data API v3 client.
//!
//! Keyword search pages through `search.list` collecting video IDs, then
//! hydrates them with `videos.list` (snippet, contentDetails, statistics).

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use medvid_core::config::FetchConfig;
use medvid_core::error::{MedvidError, Result};
use medvid_core::types::{canonical_video_url, VideoMetadata};

use crate::duration::parse_iso8601_duration;
use crate::VideoSource;

/// The Data API refuses page sizes above this.
const MAX_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
    next_page_token: Option<String>,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    content_details: ContentDetails,
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    published_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
}

impl From<VideoItem> for VideoMetadata {
    fn from(item: VideoItem) -> Self {
        let published_date = item.snippet.published_at.as_deref().and_then(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| warn!(video_id = %item.id, value = s, error = %e, "Unparseable publishedAt"))
                .ok()
        });
        let duration_seconds = item
            .content_details
            .duration
            .as_deref()
            .and_then(parse_iso8601_duration);
        let view_count = item
            .statistics
            .view_count
            .as_deref()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        VideoMetadata {
            url: canonical_video_url(&item.id),
            video_id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
            published_date,
            duration_seconds,
            view_count,
        }
    }
}

/// The request URL carries the API key, so it is stripped before the error
/// reaches a message or a log line.
fn request_error(endpoint: &str, what: &str, err: reqwest::Error) -> MedvidError {
    MedvidError::Fetch(format!("{} {}: {}", endpoint, what, err.without_url()))
}

/// Client for the YouTube Data API.
#[derive(Clone)]
pub struct YouTubeClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
    page_size: usize,
}

impl std::fmt::Debug for YouTubeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YouTubeClient")
            .field("base_url", &self.base_url)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl YouTubeClient {
    /// Build a client from configuration. Fails when no API key is set.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                MedvidError::Config(
                    "no API key configured (set YOUTUBE_API_KEY or fetch.api_key)".to_string(),
                )
            })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MedvidError::Fetch(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size.clamp(1, MAX_PAGE_SIZE),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .http_client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| request_error(endpoint, "request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MedvidError::Fetch(format!(
                "{} returned HTTP {}: {}",
                endpoint,
                status.as_u16(),
                body
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| request_error(endpoint, "response could not be parsed", e))
    }

    /// Collect up to `max_results` distinct video IDs for a query.
    async fn search_ids(&self, query: &str, max_results: usize) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut seen = HashSet::new();
        let mut page_token: Option<String> = None;

        while ids.len() < max_results {
            let want = (max_results - ids.len()).min(self.page_size);
            let mut params = vec![
                ("part", "id".to_string()),
                ("type", "video".to_string()),
                ("q", query.to_string()),
                ("maxResults", want.to_string()),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: SearchListResponse = self.get_json("search", &params).await?;
            let page_len = page.items.len();
            for id in page.items.into_iter().filter_map(|item| item.id.video_id) {
                if ids.len() < max_results && seen.insert(id.clone()) {
                    ids.push(id);
                }
            }
            debug!(page_len, collected = ids.len(), "Search page received");

            match page.next_page_token {
                Some(token) if page_len > 0 => page_token = Some(token),
                _ => break,
            }
        }

        Ok(ids)
    }

    /// Hydrate IDs with full metadata, preserving the input order.
    async fn hydrate(&self, ids: &[String]) -> Result<Vec<VideoMetadata>> {
        let mut by_id: HashMap<String, VideoMetadata> = HashMap::with_capacity(ids.len());

        for chunk in ids.chunks(self.page_size) {
            let params = [
                ("part", "snippet,contentDetails,statistics".to_string()),
                ("id", chunk.join(",")),
                ("maxResults", chunk.len().to_string()),
            ];
            let page: VideoListResponse = self.get_json("videos", &params).await?;
            for item in page.items {
                let meta = VideoMetadata::from(item);
                by_id.insert(meta.video_id.clone(), meta);
            }
        }

        let mut videos = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(id) {
                Some(meta) => videos.push(meta),
                None => debug!(video_id = %id, "Search hit missing from videos.list, skipping"),
            }
        }
        Ok(videos)
    }
}

impl VideoSource for YouTubeClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<VideoMetadata>> {
        if max_results == 0 {
            return Ok(Vec::new());
        }
        let ids = self.search_ids(query, max_results).await?;
        info!(ids = ids.len(), "Search complete, fetching details");
        self.hydrate(&ids).await
    }

    #[instrument(skip(self))]
    async fn fetch_video(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        let videos = self.hydrate(&[video_id.to_string()]).await?;
        Ok(videos.into_iter().next())
    }
}
