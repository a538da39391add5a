//! Latest-upload check over the YouTube Data API.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;

use flexauto_core::error::{FlexError, Result};
use flexauto_core::traits::VideoCheck;

const DEFAULT_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Remembers the last seen upload per channel.
pub struct YouTubeService {
    client: reqwest::Client,
    api_base: String,
    last_seen: Mutex<HashMap<String, String>>,
}

impl Default for YouTubeService {
    fn default() -> Self {
        Self::new()
    }
}

impl YouTubeService {
    pub fn new() -> Self {
        Self::with_api_base(DEFAULT_API_BASE)
    }

    pub fn with_api_base(api_base: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    async fn latest_upload(&self, channel_id: &str, api_key: &str) -> Result<Option<String>> {
        let playlist_id = uploads_playlist_id(channel_id)?;
        let resp = self
            .client
            .get(format!("{}/playlistItems", self.api_base))
            .query(&[
                ("part", "snippet"),
                ("playlistId", playlist_id.as_str()),
                ("maxResults", "1"),
                ("key", api_key),
            ])
            .send()
            .await
            .map_err(|e| FlexError::Http(format!("YouTube request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(FlexError::Http(format!("YouTube API {status}: {text}")));
        }

        let body: PlaylistItems = resp
            .json()
            .await
            .map_err(|e| FlexError::Http(format!("Invalid YouTube response: {e}")))?;
        Ok(body.latest_video_id())
    }

    /// Record `video_id` for the channel; true when it differs from the last one.
    fn observe(&self, channel_id: &str, video_id: &str) -> bool {
        let Ok(mut seen) = self.last_seen.lock() else {
            return false;
        };
        if seen.get(channel_id).is_some_and(|last| last == video_id) {
            return false;
        }
        seen.insert(channel_id.to_string(), video_id.to_string());
        true
    }
}

#[async_trait]
impl VideoCheck for YouTubeService {
    async fn check_new_video(&self, channel_id: &str, api_key: &str) -> Result<Option<String>> {
        let Some(video_id) = self.latest_upload(channel_id, api_key).await? else {
            return Ok(None);
        };
        if !self.observe(channel_id, &video_id) {
            return Ok(None);
        }
        tracing::debug!("New upload {video_id} on channel {channel_id}");
        Ok(Some(video_url(&video_id)))
    }
}

/// Uploads playlist of a channel: `UC…` becomes `UU…`.
pub fn uploads_playlist_id(channel_id: &str) -> Result<String> {
    let channel_id = channel_id.trim();
    match channel_id.get(2..) {
        Some(rest) if !rest.is_empty() => Ok(format!("UU{rest}")),
        _ => Err(FlexError::Http(format!("Invalid channel id '{channel_id}'"))),
    }
}

pub fn video_url(video_id: &str) -> String {
    format!("https://youtube.com/watch?v={video_id}")
}

// --- API types ---

#[derive(Debug, Deserialize)]
struct PlaylistItems {
    #[serde(default)]
    items: Vec<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    #[serde(rename = "resourceId")]
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
struct ResourceId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

impl PlaylistItems {
    fn latest_video_id(&self) -> Option<String> {
        self.items
            .first()
            .and_then(|item| item.snippet.resource_id.video_id.clone())
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uploads_playlist_id() {
        assert_eq!(uploads_playlist_id("UCabc123").unwrap(), "UUabc123");
        assert!(uploads_playlist_id("UC").is_err());
        assert!(uploads_playlist_id("").is_err());
    }

    #[test]
    fn test_first_observation_is_new_then_deduplicated() {
        let service = YouTubeService::new();
        assert!(service.observe("UC1", "vid-a"));
        assert!(!service.observe("UC1", "vid-a"));
        assert!(service.observe("UC2", "vid-a"));
        assert!(service.observe("UC1", "vid-b"));
        assert!(!service.observe("UC1", "vid-b"));
    }

    #[test]
    fn test_latest_video_id_parsing() {
        let body: PlaylistItems = serde_json::from_value(serde_json::json!({
            "items": [{"snippet": {"resourceId": {"videoId": "xyz"}}}]
        }))
        .unwrap();
        assert_eq!(body.latest_video_id().as_deref(), Some("xyz"));

        let empty: PlaylistItems = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(empty.latest_video_id().is_none());
        assert_eq!(video_url("xyz"), "https://youtube.com/watch?v=xyz");
    }

    #[tokio::test]
    async fn test_network_failure_is_error() {
        let service = YouTubeService::with_api_base("http://127.0.0.1:9");
        assert!(service.check_new_video("UCabc", "key").await.is_err());
    }
}
