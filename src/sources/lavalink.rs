use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use crate::error::TransportError;

/// Duración (ms) que reportan los streams en lugar de una real.
pub const STREAM_LENGTH_MS: u64 = 9_223_372_036_854_775_807;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadType {
    TrackLoaded,
    PlaylistLoaded,
    SearchResult,
    NoMatches,
    LoadFailed,
    #[serde(alias = "V2_COMPACT")]
    V2Compat,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub selected_track: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub is_seekable: bool,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub length: u64,
    #[serde(default)]
    pub is_stream: bool,
    #[serde(default)]
    pub position: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub uri: String,
}

/// Track reproducible tal como lo devuelve el proveedor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track codificado por el proveedor.
    #[serde(default)]
    pub track: String,
    pub info: TrackInfo,
    /// Marcado cuando lo eligió el autoplay.
    #[serde(skip)]
    pub autoplay: bool,
}

impl Track {
    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn author(&self) -> &str {
        &self.info.author
    }

    pub fn uri(&self) -> &str {
        &self.info.uri
    }

    pub fn length(&self) -> Duration {
        Duration::from_millis(self.info.length)
    }

    /// Si el track entra en una duración máxima en segundos. Los streams siempre entran.
    pub fn within_length_limit(&self, max_seconds: u64) -> bool {
        if self.info.is_stream || self.info.length >= STREAM_LENGTH_MS {
            return true;
        }
        let seconds = (self.info.length + 500) / 1000;
        seconds <= max_seconds
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadResultBody {
    load_type: LoadType,
    #[serde(default)]
    playlist_info: PlaylistInfo,
    #[serde(default)]
    tracks: Vec<Track>,
    #[serde(default)]
    exception: Option<Value>,
}

/// Estado resumido de una carga.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Success,
    PartialError,
    Empty,
    Failed,
}

/// Respuesta de carga del proveedor, junto al JSON original.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub load_type: LoadType,
    pub playlist_info: PlaylistInfo,
    pub tracks: Vec<Track>,
    pub exception: Option<Value>,
    raw: Value,
}

impl LoadResult {
    /// Interpreta una respuesta del proveedor. Lo ilegible es una carga fallida y vacía.
    pub fn from_raw(raw: Value) -> Self {
        match serde_json::from_value::<LoadResultBody>(raw.clone()) {
            Ok(body) => Self {
                load_type: body.load_type,
                playlist_info: body.playlist_info,
                tracks: body.tracks,
                exception: body.exception,
                raw,
            },
            Err(e) => {
                debug!("Respuesta de carga inválida: {}", e);
                Self::failed()
            }
        }
    }

    pub fn failed() -> Self {
        let raw = serde_json::json!({"loadType": "LOAD_FAILED", "playlistInfo": {}, "tracks": []});
        Self {
            load_type: LoadType::LoadFailed,
            playlist_info: PlaylistInfo::default(),
            tracks: Vec::new(),
            exception: None,
            raw,
        }
    }

    pub fn has_error(&self) -> bool {
        self.load_type == LoadType::LoadFailed
    }

    pub fn status(&self) -> LoadStatus {
        if self.has_error() {
            LoadStatus::Failed
        } else if self.tracks.is_empty() {
            LoadStatus::Empty
        } else if self.exception.is_some() {
            LoadStatus::PartialError
        } else {
            LoadStatus::Success
        }
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Si la respuesta cruda tiene la forma completa para cachear: `loadType`
    /// y `playlistInfo` arriba, e `isSeekable`/`isStream` en cada track.
    pub fn has_cacheable_shape(&self) -> bool {
        let Some(body) = self.raw.as_object() else {
            return false;
        };
        if !body.contains_key("loadType") || !body.contains_key("playlistInfo") {
            return false;
        }
        match body.get("tracks").and_then(Value::as_array) {
            Some(tracks) if !tracks.is_empty() => tracks.iter().all(|track| {
                track
                    .get("info")
                    .and_then(Value::as_object)
                    .is_some_and(|info| info.contains_key("isSeekable") && info.contains_key("isStream"))
            }),
            _ => false,
        }
    }
}

/// Proveedor de tracks reproducibles.
#[async_trait]
pub trait TrackLoader: Send + Sync {
    /// Carga `query`. Solo los fallos de I/O son error; lo demás es un cuerpo de respuesta.
    async fn load_tracks(&self, query: &str) -> Result<Value, TransportError>;
}

/// Cliente REST de Lavalink (`GET /loadtracks`).
pub struct LavalinkRestLoader {
    client: reqwest::Client,
    base_url: String,
    password: String,
}

impl LavalinkRestLoader {
    pub fn new(host: &str, port: u16, password: String, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: format!("http://{}:{}", host, port),
            password,
        })
    }
}

#[async_trait]
impl TrackLoader for LavalinkRestLoader {
    async fn load_tracks(&self, query: &str) -> Result<Value, TransportError> {
        debug!("🎼 Consultando Lavalink: {}", query);
        let response = self
            .client
            .get(format!("{}/loadtracks", self.base_url))
            .header("Authorization", &self.password)
            .query(&[("identifier", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            error!("❌ Lavalink error: {}", status);
            return Err(TransportError::Http(status.to_string()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn track_json(title: &str) -> Value {
        json!({
            "track": "QAAA",
            "info": {
                "identifier": "abc",
                "isSeekable": true,
                "author": "Artist",
                "length": 180_000,
                "isStream": false,
                "position": 0,
                "title": title,
                "uri": "https://www.youtube.com/watch?v=abc"
            }
        })
    }

    #[test]
    fn parses_a_full_response() {
        let result = LoadResult::from_raw(json!({
            "loadType": "SEARCH_RESULT",
            "playlistInfo": {},
            "tracks": [track_json("One"), track_json("Two")]
        }));
        assert_eq!(result.load_type, LoadType::SearchResult);
        assert_eq!(result.tracks.len(), 2);
        assert_eq!(result.tracks[1].title(), "Two");
        assert_eq!(result.status(), LoadStatus::Success);
        assert!(result.has_cacheable_shape());
    }

    #[test]
    fn legacy_compact_spelling_is_accepted() {
        let result = LoadResult::from_raw(json!({"loadType": "V2_COMPACT", "playlistInfo": {}, "tracks": []}));
        assert_eq!(result.load_type, LoadType::V2Compat);
    }

    #[test]
    fn garbage_becomes_a_failed_load() {
        let result = LoadResult::from_raw(json!({"unexpected": true}));
        assert!(result.has_error());
        assert_eq!(result.status(), LoadStatus::Failed);
        assert!(result.tracks.is_empty());
    }

    #[test]
    fn partial_shapes_are_not_cacheable() {
        let missing_stream_flag = LoadResult::from_raw(json!({
            "loadType": "TRACK_LOADED",
            "playlistInfo": {},
            "tracks": [{"track": "QAAA", "info": {"title": "x", "isSeekable": true}}]
        }));
        assert_eq!(missing_stream_flag.tracks.len(), 1);
        assert!(!missing_stream_flag.has_cacheable_shape());

        let missing_playlist_info = LoadResult::from_raw(json!({
            "loadType": "TRACK_LOADED",
            "tracks": [track_json("x")]
        }));
        assert!(!missing_playlist_info.has_cacheable_shape());
    }

    #[test]
    fn length_limit_lets_streams_through() {
        let mut track: Track = serde_json::from_value(track_json("x")).unwrap();
        assert!(track.within_length_limit(180));
        assert!(!track.within_length_limit(179));

        track.info.is_stream = true;
        track.info.length = STREAM_LENGTH_MS;
        assert!(track.within_length_limit(1));
    }

    #[test]
    fn autoplay_flag_is_not_serialized() {
        let mut track: Track = serde_json::from_value(track_json("x")).unwrap();
        track.autoplay = true;
        let value = serde_json::to_value(&track).unwrap();
        assert!(value.get("autoplay").is_none());
    }
}
