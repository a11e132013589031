use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::TransportError;

const API_BASE: &str = "https://api.spotify.com/v1/";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

static SPOTIFY_REFERENCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"^(?:spotify:|https?://open\.spotify\.com/(?:intl-[a-zA-Z-]+/)?)(track|album|playlist)[:/]([A-Za-z0-9]+)",
    )
    .ok()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotifyQueryType {
    Track,
    Album,
    Playlist,
}

impl fmt::Display for SpotifyQueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpotifyQueryType::Track => "track",
            SpotifyQueryType::Album => "album",
            SpotifyQueryType::Playlist => "playlist",
        })
    }
}

/// Extrae tipo e id de una URI o URL de Spotify.
pub fn parse_spotify_reference(input: &str) -> Option<(SpotifyQueryType, String)> {
    let captures = SPOTIFY_REFERENCE.as_ref()?.captures(input.trim())?;
    let kind = match &captures[1] {
        "track" => SpotifyQueryType::Track,
        "album" => SpotifyQueryType::Album,
        _ => SpotifyQueryType::Playlist,
    };
    Some((kind, captures[2].to_string()))
}

/// Endpoint y parámetros de la primera página de un listado.
pub fn format_call(query_type: SpotifyQueryType, id: &str) -> (String, Vec<(String, String)>) {
    match query_type {
        SpotifyQueryType::Track => (format!("tracks/{id}"), Vec::new()),
        SpotifyQueryType::Album => (
            format!("albums/{id}/tracks"),
            vec![("limit".to_string(), "50".to_string())],
        ),
        SpotifyQueryType::Playlist => (
            format!("playlists/{id}/tracks"),
            vec![("limit".to_string(), "100".to_string())],
        ),
    }
}

/// Datos de un track de Spotify que se guardan en caché.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotifyTrack {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub uri: String,
    pub track_name: String,
    pub artist_name: String,
    pub song_url: String,
    /// Texto con el que se busca en YouTube.
    pub track_info: String,
}

impl SpotifyTrack {
    pub fn from_api(track: &Value) -> Self {
        let text = |value: &Value| value.as_str().unwrap_or_default().to_string();
        let track_name = text(&track["name"]);
        let artist_name = text(&track["artists"][0]["name"]);
        let track_info = format!("{} {}", track_name, artist_name).trim().to_string();
        Self {
            id: text(&track["id"]),
            kind: text(&track["type"]),
            uri: text(&track["uri"]),
            track_name,
            artist_name,
            song_url: text(&track["external_urls"]["spotify"]),
            track_info,
        }
    }

    /// Contenido de la fila en la tabla de Spotify.
    pub fn to_payload(&self) -> Value {
        json!({
            "id": self.id,
            "type": self.kind,
            "uri": self.uri,
            "track_name": self.track_name,
            "artist_name": self.artist_name,
            "song_url": self.song_url,
            "track_info": self.track_info,
        })
    }

    /// Spotify responde `invalid id` en el lugar de los tracks eliminados.
    pub fn is_invalid_id(track: &Value) -> bool {
        track["error"]["message"].as_str() == Some("invalid id")
    }
}

/// Código de estado si `body` es una respuesta de error.
pub fn error_status(body: &Value) -> Option<u64> {
    body.get("error")?.get("status")?.as_u64()
}

/// Cliente de la API de Spotify.
#[async_trait]
pub trait SpotifyApi: Send + Sync {
    /// Llama a `endpoint` (relativo a la API o URL absoluta de paginación).
    /// Los errores llegan como cuerpos `{"error": {"status": ..}}`.
    async fn get_call(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value, TransportError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Cliente HTTP de Spotify con credenciales de cliente.
pub struct SpotifyHttpClient {
    client: reqwest::Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    token: Mutex<Option<(String, DateTime<Utc>)>>,
}

impl SpotifyHttpClient {
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            client_id,
            client_secret,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<Option<String>, TransportError> {
        if let Some((token, expires_at)) = self.token.lock().clone() {
            if Utc::now() < expires_at {
                return Ok(Some(token));
            }
        }

        let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) else {
            return Ok(None);
        };

        let credentials = STANDARD.encode(format!("{}:{}", id, secret));
        let response = self
            .client
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("❌ Spotify rechazó las credenciales: {}", response.status());
            return Ok(None);
        }

        let token: TokenResponse = response.json().await?;
        // renovar un minuto antes
        let expires_at = Utc::now() + ChronoDuration::seconds(token.expires_in - 60);
        *self.token.lock() = Some((token.access_token.clone(), expires_at));
        info!("🔑 Token de Spotify renovado");
        Ok(Some(token.access_token))
    }
}

#[async_trait]
impl SpotifyApi for SpotifyHttpClient {
    async fn get_call(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value, TransportError> {
        let Some(token) = self.access_token().await? else {
            return Ok(json!({"error": {"status": 401, "message": "No token provided"}}));
        };

        let url = if endpoint.starts_with("http") {
            endpoint.to_string()
        } else {
            format!("{}{}", API_BASE, endpoint)
        };
        debug!("🔍 Spotify: {}", url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.token.lock().take();
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| TransportError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_uris_and_urls() {
        assert_eq!(
            parse_spotify_reference("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M"),
            Some((SpotifyQueryType::Playlist, "37i9dQZF1DXcBWIGoYBM5M".to_string()))
        );
        assert_eq!(
            parse_spotify_reference("https://open.spotify.com/intl-es/album/4aawyAB9vmqN3uQ7FjRGTy?si=x"),
            Some((SpotifyQueryType::Album, "4aawyAB9vmqN3uQ7FjRGTy".to_string()))
        );
        assert_eq!(
            parse_spotify_reference("https://open.spotify.com/track/11dFghVXANMlKmJXsNCbNl"),
            Some((SpotifyQueryType::Track, "11dFghVXANMlKmJXsNCbNl".to_string()))
        );
        assert_eq!(parse_spotify_reference("never gonna give you up"), None);
    }

    #[test]
    fn extracts_track_fields() {
        let track = SpotifyTrack::from_api(&json!({
            "id": "11dFghVXANMlKmJXsNCbNl",
            "type": "track",
            "uri": "spotify:track:11dFghVXANMlKmJXsNCbNl",
            "name": "Cut To The Feeling",
            "artists": [{"name": "Carly Rae Jepsen"}, {"name": "Other"}],
            "external_urls": {"spotify": "https://open.spotify.com/track/11dFghVXANMlKmJXsNCbNl"}
        }));
        assert_eq!(track.track_info, "Cut To The Feeling Carly Rae Jepsen");
        assert_eq!(track.kind, "track");
        assert_eq!(track.song_url, "https://open.spotify.com/track/11dFghVXANMlKmJXsNCbNl");

        let cached: SpotifyTrack = serde_json::from_value(track.to_payload()).unwrap();
        assert_eq!(cached, track);
    }

    #[test]
    fn detects_error_envelopes() {
        assert_eq!(error_status(&json!({"error": {"status": 401, "message": "x"}})), Some(401));
        assert_eq!(error_status(&json!({"items": []})), None);
        assert!(SpotifyTrack::is_invalid_id(&json!({"error": {"message": "invalid id"}})));
    }

    #[test]
    fn listings_use_paged_endpoints() {
        let (endpoint, params) = format_call(SpotifyQueryType::Playlist, "abc");
        assert_eq!(endpoint, "playlists/abc/tracks");
        assert_eq!(params, vec![("limit".to_string(), "100".to_string())]);
        assert_eq!(format_call(SpotifyQueryType::Track, "t").0, "tracks/t");
    }
}
