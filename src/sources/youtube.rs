use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::error::TransportError;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

/// Búsqueda de la mejor coincidencia en YouTube.
#[async_trait]
pub trait YouTubeApi: Send + Sync {
    /// URL de la mejor coincidencia para `search_text`, o `None`.
    async fn search_url(&self, search_text: &str) -> Option<String>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: VideoId,
}

#[derive(Debug, Deserialize)]
struct VideoId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

/// Cliente de YouTube Data API v3.
pub struct YouTubeApiClient {
    api_key: Option<String>,
    client: reqwest::Client,
}

impl YouTubeApiClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { api_key, client })
    }

    async fn search(&self, api_key: &str, query: &str) -> Result<Option<String>, TransportError> {
        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("part", "snippet"),
                ("q", query),
                ("type", "video"),
                ("maxResults", "1"),
                ("key", api_key),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("❌ YouTube API error: {} - {}", status, error_text);
            return Err(TransportError::Http(status.to_string()));
        }

        let body: SearchResponse = response.json().await?;
        Ok(body
            .items
            .into_iter()
            .find_map(|item| item.id.video_id)
            .map(|id| format!("https://www.youtube.com/watch?v={}", id)))
    }
}

#[async_trait]
impl YouTubeApi for YouTubeApiClient {
    async fn search_url(&self, search_text: &str) -> Option<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("YOUTUBE_API_KEY no configurada, no se puede buscar: {}", search_text);
            return None;
        };
        debug!("🔍 Búsqueda YouTube API v3: {}", search_text);
        match self.search(api_key, search_text).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Búsqueda en YouTube falló para '{}': {}", search_text, e);
                None
            }
        }
    }
}
