use tracing::{debug, warn};

use super::{AudioResolver, Lookup};
use crate::cache::{CacheEntry, CacheTable, StagedWrite};
use crate::config::ResolverSettings;
use crate::context::RequestContext;
use crate::error::{Result, TransportError};
use crate::query::NormalizedQuery;
use crate::sources::{LoadResult, LoadStatus, Track};

/// Opciones de `fetch_track`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
    /// Ignora la caché y siempre llama al proveedor.
    pub forced: bool,
    /// Nunca llama al proveedor; sin caché la carga falla.
    pub lazy: bool,
}

impl FetchOptions {
    pub fn forced() -> Self {
        Self { forced: true, lazy: false }
    }

    pub fn lazy() -> Self {
        Self { forced: false, lazy: true }
    }
}

/// Resultado de resolver una consulta.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    pub load: LoadResult,
    /// Si se llamó al proveedor en vez de servir desde la caché.
    pub called_api: bool,
    pub query: NormalizedQuery,
}

impl ResolutionResult {
    pub fn status(&self) -> LoadStatus {
        self.load.status()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.load.tracks
    }
}

impl AudioResolver {
    /// Tracks reproducibles para `query`, primero desde la caché.
    pub async fn fetch_track(
        &self,
        ctx: &RequestContext,
        query: &str,
        options: FetchOptions,
    ) -> Result<ResolutionResult> {
        let settings = self.settings.snapshot().await;
        self.fetch_with(ctx, &settings, query, options).await
    }

    pub(super) async fn fetch_with(
        &self,
        ctx: &RequestContext,
        settings: &ResolverSettings,
        raw_query: &str,
        options: FetchOptions,
    ) -> Result<ResolutionResult> {
        let query = self.normalizer.normalize(raw_query, &settings.local_root);
        if !query.valid {
            debug!("Consulta inválida: '{}'", raw_query);
            return Ok(ResolutionResult {
                load: LoadResult::failed(),
                called_api: false,
                query,
            });
        }

        let key = query.canonical.clone();
        let cache_enabled = settings.cache_enabled(CacheTable::Lavalink) && !query.is_local;
        let mut refresh_error = false;
        let mut stale = None;

        if cache_enabled && !options.forced {
            match self.lookup(settings, CacheTable::Lavalink, &key).await {
                Lookup::Hit(payload) => {
                    self.stage(ctx, StagedWrite::update(CacheTable::Lavalink, &key));
                    let cached = LoadResult::from_raw(payload);
                    if !cached.has_error() {
                        return Ok(ResolutionResult {
                            load: cached,
                            called_api: false,
                            query,
                        });
                    }
                    debug!("🔄 Entrada con error en caché para '{}', forzando recarga", key);
                    refresh_error = true;
                }
                Lookup::Stale(payload) => stale = Some(LoadResult::from_raw(payload)).filter(|s| !s.has_error()),
                Lookup::Miss => {}
            }
        }

        if options.lazy && !refresh_error {
            return Ok(ResolutionResult {
                load: stale.unwrap_or_else(LoadResult::failed),
                called_api: false,
                query,
            });
        }

        let load = match self.providers.loader.load_tracks(&key).await {
            Ok(raw) => LoadResult::from_raw(raw),
            Err(TransportError::Malformed(e)) => {
                debug!("Respuesta ilegible para '{}': {}", key, e);
                LoadResult::failed()
            }
            Err(e) => match stale {
                Some(stale) => {
                    warn!("⚠️ Proveedor no disponible ({}), usando entrada vencida de '{}'", e, key);
                    return Ok(ResolutionResult {
                        load: stale,
                        called_api: true,
                        query,
                    });
                }
                None => return Err(e.into()),
            },
        };

        if load.tracks.is_empty() {
            if let Some(stale) = stale {
                debug!("Revalidación sin resultados, usando entrada vencida de '{}'", key);
                return Ok(ResolutionResult {
                    load: stale,
                    called_api: true,
                    query,
                });
            }
        }

        if cache_enabled && !load.has_error() && !load.tracks.is_empty() {
            if load.has_cacheable_shape() {
                self.stage(
                    ctx,
                    StagedWrite::insert(CacheTable::Lavalink, vec![CacheEntry::new(key, load.raw().clone())]),
                );
            } else {
                debug!("Respuesta incompleta, no se guarda en caché");
            }
        }

        Ok(ResolutionResult {
            load,
            called_api: true,
            query,
        })
    }
}
