use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::{AudioResolver, FetchOptions, ResolverEvent};
use crate::cache::CacheTable;
use crate::config::ResolverSettings;
use crate::context::{GuildId, RequestContext, UserId};
use crate::error::{ResolverError, Result};
use crate::player::Player;
use crate::sources::{LoadResult, Track};

/// Playlist "Top 100" de YouTube Music, la última fuente del autoplay.
pub const TOP_100_FALLBACK: &str = "https://www.youtube.com/playlist?list=PL4fGSI1pDJn5rWitrRWFKdm-ulaFiIyoK";

impl AudioResolver {
    /// Elige un track para un reproductor inactivo y lo encola a nombre de `bot_user`.
    ///
    /// Los candidatos salen de la autoplaylist del servidor, luego de una carga
    /// al azar de la caché y por último de la playlist Top 100.
    pub async fn autoplay(&self, player: &dyn Player, bot_user: UserId) -> Result<Track> {
        let guild_id = player.guild_id();
        let ctx = RequestContext::for_guild(guild_id, bot_user);
        let settings = self.settings.snapshot().await;

        let candidates = self.autoplay_candidates(&ctx, &settings).await?;
        let mut track = self.pick_valid(guild_id, &settings, candidates).await?;
        track.autoplay = true;

        info!("🎲 Autoplay: {}", track.title());
        player.add(bot_user, track.clone());
        self.emit(ResolverEvent::TrackAutoPlayed {
            guild_id,
            track: track.clone(),
        });
        if !player.is_playing() {
            if let Err(e) = player.play().await {
                warn!("❌ No se pudo iniciar autoplay: {}", e);
            }
        }
        Ok(track)
    }

    async fn autoplay_candidates(&self, ctx: &RequestContext, settings: &ResolverSettings) -> Result<Vec<Track>> {
        let guild = self.settings.guild(ctx.guild_id).await;
        if let (Some(playlist_id), Some(playlists)) = (&guild.autoplaylist, &self.playlists) {
            match playlists.playlist_tracks(ctx.guild_id, playlist_id).await {
                Ok(tracks) if !tracks.is_empty() => return Ok(tracks),
                Ok(_) => debug!("Autoplaylist {} vacía", playlist_id),
                Err(e) => debug!("No se pudo cargar la autoplaylist {}: {}", playlist_id, e),
            }
        }

        if settings.cache_enabled(CacheTable::Lavalink) {
            match self.store.fetch_random(CacheTable::Lavalink, settings.cache_age_days).await {
                Ok(Some(payload)) => {
                    let tracks = LoadResult::from_raw(payload).tracks;
                    if !tracks.is_empty() {
                        return Ok(tracks);
                    }
                }
                Ok(None) => {}
                Err(e) => debug!("No se pudo leer una entrada al azar de la tabla lavalink: {}", e),
            }
        }

        let result = self.fetch_with(ctx, settings, TOP_100_FALLBACK, FetchOptions::default()).await?;
        Ok(result.load.tracks)
    }

    /// Saca candidatos al azar hasta que uno pase la validación.
    async fn pick_valid(&self, guild_id: GuildId, settings: &ResolverSettings, candidates: Vec<Track>) -> Result<Track> {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.shuffle(&mut rand::thread_rng());

        for index in order {
            let track = &candidates[index];
            let query = self.normalizer.normalize(track.uri(), &settings.local_root);
            tokio::task::yield_now().await;

            if !query.valid {
                debug!("Autoplay: '{}' no es una consulta válida", track.uri());
                continue;
            }
            if query.is_local && !query.local_path_exists() {
                debug!("Autoplay: archivo local inexistente {}", query);
                continue;
            }
            if !self.is_allowed(guild_id, settings, track).await {
                continue;
            }
            return Ok(track.clone());
        }

        Err(ResolverError::NoValidEntry)
    }
}
