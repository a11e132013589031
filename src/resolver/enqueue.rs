use tracing::{debug, info, warn};

use super::{AudioResolver, FetchOptions, ResolverEvent};
use crate::cache::CacheEntry;
use crate::context::RequestContext;
use crate::error::{ResolverError, Result, TransportError};
use crate::notifier::{Notice, Notifier, ProgressKey};
use crate::player::{Player, MAX_QUEUE_LENGTH};
use crate::sources::{SpotifyQueryType, SpotifyTrack, Track};
use crate::storage::GuildSettings;

/// Resoluciones vacías seguidas que cortan el resto del lote.
pub const MAX_CONSECUTIVE_FAILURES: usize = 10;

impl AudioResolver {
    /// Resuelve cada track de una referencia de Spotify hasta un track reproducible.
    ///
    /// Con `enqueue`, cada track resuelto va directo a `player`. Devuelve los
    /// tracks que pasaron el filtro de contenido. Un fallo de conexión o
    /// demasiados fallos seguidos cortan el lote con un aviso y devuelven
    /// lo resuelto hasta ese punto.
    pub async fn spotify_enqueue(
        &self,
        ctx: &RequestContext,
        query_type: SpotifyQueryType,
        id: &str,
        enqueue: bool,
        player: &dyn Player,
        notifier: &dyn Notifier,
    ) -> Result<Vec<Track>> {
        let settings = self.settings.snapshot().await;
        let guild = self.settings.guild(ctx.guild_id).await;

        let spotify_tracks = self.fetch_spotify_tracks(query_type, id, Some(notifier)).await?;
        let total = spotify_tracks.len();
        if total == 0 {
            notifier.show_notice(Notice::NoSupportedReference).await;
            return Ok(Vec::new());
        }

        let mut entries = Vec::with_capacity(total);
        let mut resolved = Vec::new();
        let mut enqueued = 0;
        let mut consecutive_fails = 0;
        let mut has_not_allowed = false;
        let mut aborted = false;

        for (index, raw) in spotify_tracks.iter().enumerate() {
            let done = index + 1;
            let found = if SpotifyTrack::is_invalid_id(raw) {
                debug!("Track de Spotify con id inválido, se omite");
                None
            } else {
                let spotify_track = SpotifyTrack::from_api(raw);
                if !spotify_track.uri.is_empty() {
                    entries.push(CacheEntry::new(spotify_track.uri.clone(), spotify_track.to_payload()));
                }

                let tracks = match self.resolve_youtube(ctx, &settings, &spotify_track.track_info).await {
                    Some(url) => match self.fetch_with(ctx, &settings, &url, FetchOptions::default()).await {
                        Ok(result) => result.load.tracks,
                        Err(ResolverError::ProviderTransport(e)) => {
                            warn!("❌ Error cargando '{}': {}", url, e);
                            let notice = match e {
                                TransportError::Timeout => Notice::Timeout,
                                _ => Notice::ConnectionReset,
                            };
                            notifier.show_notice(notice).await;
                            aborted = true;
                            break;
                        }
                        Err(e) => return Err(e),
                    },
                    None => Vec::new(),
                };
                Some((spotify_track, tracks))
            };

            tokio::task::yield_now().await;
            if done % 2 == 0 || done == total {
                notifier.notify(done, total, ProgressKey::Lavalink).await;
            }

            let Some((spotify_track, tracks)) = found else {
                continue;
            };
            let Some(track) = tracks.into_iter().next() else {
                consecutive_fails += 1;
                debug!("Sin resultados para '{}' ({} seguidos)", spotify_track.track_info, consecutive_fails);
                if consecutive_fails >= MAX_CONSECUTIVE_FAILURES {
                    notifier.show_notice(Notice::TooManyFailures).await;
                    aborted = true;
                    break;
                }
                continue;
            };
            consecutive_fails = 0;

            if !self.is_allowed(ctx.guild_id, &settings, &track).await {
                has_not_allowed = true;
                continue;
            }

            if enqueue && self.enqueue_track(ctx, player, &guild, track.clone()).await {
                enqueued += 1;
            }
            resolved.push(track);
        }

        self.stage_spotify_entries(ctx, &settings, entries);

        if !aborted && resolved.is_empty() && !has_not_allowed {
            notifier.show_notice(Notice::NothingFound).await;
            return Err(ResolverError::NothingResolved(format!("spotify:{}:{}", query_type, id)));
        }

        if enqueue {
            if guild.shuffle {
                player.shuffle_queue();
            }
            notifier
                .show_notice(Notice::PlaylistEnqueued {
                    added: enqueued,
                    not_queued: total.saturating_sub(enqueued),
                })
                .await;
        }

        info!("✅ Spotify {} {}: {} de {} tracks resueltos", query_type, id, resolved.len(), total);
        Ok(resolved)
    }

    /// Agrega un track al reproductor si la cola y el servidor lo permiten.
    /// Si el reproductor estaba inactivo, empieza a reproducir.
    pub async fn enqueue_track(
        &self,
        ctx: &RequestContext,
        player: &dyn Player,
        guild: &GuildSettings,
        track: Track,
    ) -> bool {
        if player.queue_len() >= MAX_QUEUE_LENGTH {
            debug!("Cola llena en el servidor {}", ctx.guild_id);
            return false;
        }
        if guild.max_track_length > 0 && !track.within_length_limit(guild.max_track_length) {
            debug!("'{}' supera la duración máxima, se omite", track.title());
            return false;
        }

        player.add(ctx.requester, track.clone());
        self.emit(ResolverEvent::TrackEnqueued {
            guild_id: ctx.guild_id,
            track,
            requester: ctx.requester,
        });

        if !player.is_playing() {
            if let Err(e) = player.play().await {
                warn!("❌ No se pudo iniciar la reproducción: {}", e);
            }
        }
        true
    }
}
