//! # Resolver
//!
//! Turns a Spotify reference, a YouTube search or a playable query into
//! tracks, always trying the local cache before calling a provider:
//!
//! 1. Spotify listing ([`spotify`]): paginated track metadata.
//! 2. YouTube resolution ([`youtube`]): one best-match URL per Spotify track.
//! 3. Playable-track fetch ([`fetch`]): the provider's load result.
//!
//! Cache writes produced along the way are staged per request and only hit
//! storage when [`AudioResolver::flush`] runs for that request.

mod autoplay;
mod enqueue;
mod fetch;
mod spotify;
mod youtube;


use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cache::{CacheTable, DeferredWrites, LocalCacheStore, PendingWrites, StagedWrite};
use crate::config::{ResolverSettings, SettingsProvider};
use crate::context::{GuildId, RequestContext, RequestId, UserId};
use crate::filter::{ContentFilter, KeywordFilter};
use crate::query::{QueryNormalizer, StandardNormalizer};
use crate::sources::{SpotifyApi, Track, TrackLoader, YouTubeApi};

pub use autoplay::TOP_100_FALLBACK;
pub use enqueue::MAX_CONSECUTIVE_FAILURES;
pub use fetch::{FetchOptions, ResolutionResult};
pub use spotify::SpotifyPages;

/// Eventos que emite el resolver hacia el resto del bot.
#[derive(Debug, Clone)]
pub enum ResolverEvent {
    TrackEnqueued {
        guild_id: GuildId,
        track: Track,
        requester: UserId,
    },
    TrackAutoPlayed {
        guild_id: GuildId,
        track: Track,
    },
}

/// Fuente de listas de reproducción para autoplay.
#[async_trait]
pub trait PlaylistProvider: Send + Sync {
    async fn playlist_tracks(&self, guild_id: GuildId, playlist_id: &str) -> anyhow::Result<Vec<Track>>;
}

/// Los tres proveedores externos del pipeline.
#[derive(Clone)]
pub struct Providers {
    pub spotify: Arc<dyn SpotifyApi>,
    pub youtube: Arc<dyn YouTubeApi>,
    pub loader: Arc<dyn TrackLoader>,
}

/// Resultado de leer la caché, ya aplicada la política de vencimiento.
#[derive(Debug)]
enum Lookup {
    Hit(Value),
    /// Presente pero vencida: se revalida y queda de respaldo si eso no trae nada.
    Stale(Value),
    Miss,
}

/// Pipeline de resolución con caché local y escrituras diferidas.
pub struct AudioResolver {
    providers: Providers,
    store: LocalCacheStore,
    writes: DeferredWrites,
    settings: Arc<dyn SettingsProvider>,
    normalizer: Arc<dyn QueryNormalizer>,
    filter: Arc<dyn ContentFilter>,
    playlists: Option<Arc<dyn PlaylistProvider>>,
    events: broadcast::Sender<ResolverEvent>,
}

impl AudioResolver {
    pub fn new(providers: Providers, store: LocalCacheStore, settings: Arc<dyn SettingsProvider>) -> Self {
        let (events, _rx) = broadcast::channel(1024);
        Self {
            providers,
            writes: DeferredWrites::new(store.clone()),
            store,
            filter: Arc::new(KeywordFilter::new(settings.clone())),
            settings,
            normalizer: Arc::new(StandardNormalizer),
            playlists: None,
            events,
        }
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn QueryNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_filter(mut self, filter: Arc<dyn ContentFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_playlists(mut self, playlists: Arc<dyn PlaylistProvider>) -> Self {
        self.playlists = Some(playlists);
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ResolverEvent> {
        self.events.subscribe()
    }

    pub fn writes(&self) -> &DeferredWrites {
        &self.writes
    }

    /// Ejecuta las escrituras de caché pendientes de `request`.
    pub async fn flush(&self, request: RequestId) -> PendingWrites {
        self.writes.flush(request).await
    }

    /// Vacía todas las peticiones pendientes. Llamar al cerrar.
    pub async fn shutdown(&self) {
        let written = self.writes.flush_all().await;
        info!("💾 {} escrituras pendientes completadas al cerrar", written);
    }

    fn stage(&self, ctx: &RequestContext, write: StagedWrite) {
        self.writes.append(ctx.request_id, write);
    }

    fn emit(&self, event: ResolverEvent) {
        // sin suscriptores no es un error
        let _ = self.events.send(event);
    }

    /// Lee `key` de `table` si ese nivel está activo. Un fallo de almacenamiento cuenta como fallo de caché.
    async fn lookup(&self, settings: &ResolverSettings, table: CacheTable, key: &str) -> Lookup {
        if !settings.cache_enabled(table) {
            return Lookup::Miss;
        }
        match self.store.fetch_one(table, key, settings.cache_age_days).await {
            Ok(Some(hit)) if hit.needs_revalidation && settings.revalidates(table) => Lookup::Stale(hit.payload),
            Ok(Some(hit)) => Lookup::Hit(hit.payload),
            Ok(None) => Lookup::Miss,
            Err(e) => {
                debug!("No se pudo leer '{}' de la tabla {}: {}", key, table, e);
                Lookup::Miss
            }
        }
    }

    /// Aplica la política de contenido del servidor a un track resuelto.
    async fn is_allowed(&self, guild_id: GuildId, settings: &ResolverSettings, track: &Track) -> bool {
        let normalized = self.normalizer.normalize(track.uri(), &settings.local_root);
        let text = format!("{} {} {} {}", track.title(), track.author(), track.uri(), normalized);
        let allowed = self.filter.is_allowed(guild_id, &text).await;
        if !allowed {
            debug!("Consulta no permitida en el servidor {}", guild_id);
        }
        allowed
    }
}
