use serde_json::Value;
use tracing::{debug, warn};

use super::{AudioResolver, Lookup};
use crate::cache::{CacheEntry, CacheTable, StagedWrite};
use crate::config::ResolverSettings;
use crate::context::RequestContext;
use crate::error::{ResolverError, Result};
use crate::notifier::{Notifier, ProgressKey};
use crate::sources::spotify::{error_status, format_call};
use crate::sources::{SpotifyApi, SpotifyQueryType, SpotifyTrack};

/// Cursor sobre las páginas de un listado de Spotify.
///
/// Entrega el cuerpo de cada página hasta que el proveedor deja de devolver
/// `next`. [`SpotifyPages::restart`] vuelve a la primera página.
pub struct SpotifyPages<'a> {
    api: &'a dyn SpotifyApi,
    query_type: SpotifyQueryType,
    first: (String, Vec<(String, String)>),
    next: Option<(String, Vec<(String, String)>)>,
    on_first_page: bool,
}

impl<'a> SpotifyPages<'a> {
    pub fn new(api: &'a dyn SpotifyApi, query_type: SpotifyQueryType, id: &str) -> Self {
        let first = format_call(query_type, id);
        Self {
            api,
            query_type,
            next: Some(first.clone()),
            first,
            on_first_page: true,
        }
    }

    pub fn restart(&mut self) {
        self.next = Some(self.first.clone());
        self.on_first_page = true;
    }

    pub async fn next_page(&mut self) -> Result<Option<Value>> {
        let Some((endpoint, params)) = self.next.take() else {
            return Ok(None);
        };
        let first_page = std::mem::replace(&mut self.on_first_page, false);

        let body = self.api.get_call(&endpoint, &params).await?;

        if let Some(status) = error_status(&body) {
            if first_page && status == 401 {
                return Err(ResolverError::AuthConfig);
            }
            if !first_page {
                warn!("⚠️ Spotify devolvió error {} en {}, deteniendo paginación", status, endpoint);
                return Ok(None);
            }
            // una primera página con error no trae items; el listado termina ahí
            return Ok(Some(body));
        }

        if !body.is_object() {
            return Err(ResolverError::SourceFormat(format!("{} page is not an object", self.query_type)));
        }

        let container = page_container(&body);
        match container.get("next") {
            None | Some(Value::Null) => {}
            Some(Value::String(cursor)) => self.next = Some((cursor.clone(), Vec::new())),
            Some(other) => {
                return Err(ResolverError::SourceFormat(format!("unexpected pagination cursor {}", other)));
            }
        }
        Ok(Some(body))
    }
}

/// Álbumes y playlists anidan el listado bajo `tracks` en la primera página.
fn page_container(body: &Value) -> &Value {
    match body.get("tracks") {
        Some(tracks) if tracks.is_object() => tracks,
        _ => body,
    }
}

fn page_tracks(query_type: SpotifyQueryType, body: &Value) -> Vec<Value> {
    if error_status(body).is_some() {
        return Vec::new();
    }
    let container = page_container(body);
    let items = container.get("items").and_then(Value::as_array);
    match query_type {
        SpotifyQueryType::Track => vec![body.clone()],
        SpotifyQueryType::Album => items.cloned().unwrap_or_default(),
        SpotifyQueryType::Playlist => items
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("track"))
                    .filter(|track| !track.is_null())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default(),
    }
}

impl AudioResolver {
    /// Todos los tracks de una referencia de Spotify, recorriendo las páginas.
    pub(super) async fn fetch_spotify_tracks(
        &self,
        query_type: SpotifyQueryType,
        id: &str,
        notifier: Option<&dyn Notifier>,
    ) -> Result<Vec<Value>> {
        let mut pages = SpotifyPages::new(self.providers.spotify.as_ref(), query_type, id);
        let mut tracks = Vec::new();
        let mut total = None;

        while let Some(page) = pages.next_page().await? {
            let reported = *total.get_or_insert_with(|| {
                page_container(&page)
                    .get("total")
                    .and_then(Value::as_u64)
                    .unwrap_or(1) as usize
            });
            tracks.extend(page_tracks(query_type, &page));
            if let Some(notifier) = notifier {
                notifier.notify(tracks.len(), reported.max(tracks.len()), ProgressKey::Spotify).await;
            }
        }

        debug!("🎵 Spotify {} {}: {} tracks", query_type, id, tracks.len());
        Ok(tracks)
    }

    /// URLs de una referencia de Spotify, o los textos de búsqueda si
    /// `skip_youtube` está activo. Los tracks sueltos salen de la caché si se puede.
    pub async fn spotify_query(
        &self,
        ctx: &RequestContext,
        query_type: SpotifyQueryType,
        id: &str,
        skip_youtube: bool,
        notifier: Option<&dyn Notifier>,
    ) -> Result<Vec<String>> {
        let settings = self.settings.snapshot().await;
        let mut stale = None;

        if query_type == SpotifyQueryType::Track {
            let key = format!("spotify:track:{id}");
            match self.lookup(&settings, CacheTable::Spotify, &key).await {
                Lookup::Hit(payload) => {
                    if let Some(track) = cached_track(payload) {
                        self.stage(ctx, StagedWrite::update(CacheTable::Spotify, &key));
                        return Ok(self
                            .search_or_resolve(ctx, &settings, &track, skip_youtube)
                            .await
                            .into_iter()
                            .collect());
                    }
                }
                Lookup::Stale(payload) => stale = cached_track(payload),
                Lookup::Miss => {}
            }
        }

        let fresh = self
            .spotify_first_time_query(ctx, &settings, query_type, id, skip_youtube, notifier)
            .await;

        match (fresh, stale) {
            (Ok(urls), Some(track)) if urls.is_empty() => Ok(self
                .search_or_resolve(ctx, &settings, &track, skip_youtube)
                .await
                .into_iter()
                .collect()),
            (Err(ResolverError::ProviderTransport(e)), Some(track)) => {
                debug!("Spotify no respondió ({}), usando la entrada vencida", e);
                Ok(self
                    .search_or_resolve(ctx, &settings, &track, skip_youtube)
                    .await
                    .into_iter()
                    .collect())
            }
            (fresh, _) => fresh,
        }
    }

    async fn spotify_first_time_query(
        &self,
        ctx: &RequestContext,
        settings: &ResolverSettings,
        query_type: SpotifyQueryType,
        id: &str,
        skip_youtube: bool,
        notifier: Option<&dyn Notifier>,
    ) -> Result<Vec<String>> {
        let tracks = self.fetch_spotify_tracks(query_type, id, notifier).await?;
        let total = tracks.len();
        let mut entries = Vec::with_capacity(total);
        let mut urls = Vec::with_capacity(total);

        for (index, raw) in tracks.iter().enumerate() {
            if SpotifyTrack::is_invalid_id(raw) {
                debug!("Track de Spotify con id inválido, se omite");
            } else {
                let track = SpotifyTrack::from_api(raw);
                if let Some(url) = self.search_or_resolve(ctx, settings, &track, skip_youtube).await {
                    urls.push(url);
                }
                if !track.uri.is_empty() {
                    entries.push(CacheEntry::new(track.uri.clone(), track.to_payload()));
                }
            }

            tokio::task::yield_now().await;
            let done = index + 1;
            if let Some(notifier) = notifier {
                if done % 2 == 0 || done == total {
                    notifier.notify(done, total, ProgressKey::YouTube).await;
                }
            }
        }

        self.stage_spotify_entries(ctx, settings, entries);
        Ok(urls)
    }

    async fn search_or_resolve(
        &self,
        ctx: &RequestContext,
        settings: &ResolverSettings,
        track: &SpotifyTrack,
        skip_youtube: bool,
    ) -> Option<String> {
        if skip_youtube {
            return Some(track.track_info.clone());
        }
        self.resolve_youtube(ctx, settings, &track.track_info).await
    }

    pub(super) fn stage_spotify_entries(
        &self,
        ctx: &RequestContext,
        settings: &ResolverSettings,
        entries: Vec<CacheEntry>,
    ) {
        if settings.cache_enabled(CacheTable::Spotify) {
            self.stage(ctx, StagedWrite::insert(CacheTable::Spotify, entries));
        }
    }
}

fn cached_track(payload: Value) -> Option<SpotifyTrack> {
    match serde_json::from_value(payload) {
        Ok(track) => Some(track),
        Err(e) => {
            debug!("Entrada de Spotify ilegible en caché: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Scripted(Vec<Value>);

    #[async_trait]
    impl SpotifyApi for Scripted {
        async fn get_call(&self, endpoint: &str, _params: &[(String, String)]) -> std::result::Result<Value, TransportError> {
            let page = endpoint.strip_prefix("page-").and_then(|n| n.parse::<usize>().ok()).unwrap_or(0);
            Ok(self.0[page].clone())
        }
    }

    #[tokio::test]
    async fn follows_cursors_until_exhausted() {
        let api = Scripted(vec![
            json!({"tracks": {"items": [{"track": {"name": "a"}}], "next": "page-1", "total": 2}}),
            json!({"items": [{"track": {"name": "b"}}], "next": null}),
        ]);
        let mut pages = SpotifyPages::new(&api, SpotifyQueryType::Playlist, "p");

        let first = pages.next_page().await.unwrap().unwrap();
        assert_eq!(page_tracks(SpotifyQueryType::Playlist, &first), vec![json!({"name": "a"})]);
        let second = pages.next_page().await.unwrap().unwrap();
        assert_eq!(page_tracks(SpotifyQueryType::Playlist, &second), vec![json!({"name": "b"})]);
        assert!(pages.next_page().await.unwrap().is_none());

        pages.restart();
        assert!(pages.next_page().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unauthorized_first_page_is_an_auth_error() {
        let api = Scripted(vec![json!({"error": {"status": 401, "message": "No token provided"}})]);
        let mut pages = SpotifyPages::new(&api, SpotifyQueryType::Album, "a");
        assert!(matches!(pages.next_page().await, Err(ResolverError::AuthConfig)));
    }

    #[tokio::test]
    async fn non_string_cursor_is_a_format_error() {
        let api = Scripted(vec![json!({"items": [], "next": 42})]);
        let mut pages = SpotifyPages::new(&api, SpotifyQueryType::Album, "a");
        assert!(matches!(pages.next_page().await, Err(ResolverError::SourceFormat(_))));
    }

    #[tokio::test]
    async fn error_on_a_later_page_ends_the_listing() {
        let api = Scripted(vec![
            json!({"items": [{"name": "a"}], "next": "page-1"}),
            json!({"error": {"status": 500, "message": "oops"}}),
        ]);
        let mut pages = SpotifyPages::new(&api, SpotifyQueryType::Album, "a");
        assert!(pages.next_page().await.unwrap().is_some());
        assert!(pages.next_page().await.unwrap().is_none());
    }

    #[test]
    fn playlist_items_without_track_are_dropped() {
        let body = json!({"items": [{"track": null}, {"track": {"name": "x"}}, {}]});
        assert_eq!(page_tracks(SpotifyQueryType::Playlist, &body).len(), 1);
    }
}
