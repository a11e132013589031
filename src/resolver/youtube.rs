use serde_json::Value;
use tracing::debug;

use super::{AudioResolver, Lookup};
use crate::cache::{CacheEntry, CacheTable, StagedWrite};
use crate::config::ResolverSettings;
use crate::context::RequestContext;

impl AudioResolver {
    /// URL de YouTube para `search_text`, desde la caché si se puede.
    pub async fn youtube_query(&self, ctx: &RequestContext, search_text: &str) -> Option<String> {
        let settings = self.settings.snapshot().await;
        self.resolve_youtube(ctx, &settings, search_text).await
    }

    pub(super) async fn resolve_youtube(
        &self,
        ctx: &RequestContext,
        settings: &ResolverSettings,
        search_text: &str,
    ) -> Option<String> {
        let mut stale = None;
        match self.lookup(settings, CacheTable::YouTube, search_text).await {
            Lookup::Hit(Value::String(url)) => {
                self.stage(ctx, StagedWrite::update(CacheTable::YouTube, search_text));
                return Some(url);
            }
            Lookup::Stale(Value::String(url)) => stale = Some(url),
            _ => {}
        }

        let fresh = self.youtube_first_time_query(ctx, settings, search_text).await;
        if fresh.is_none() && stale.is_some() {
            debug!("Usando URL vencida de YouTube para '{}'", search_text);
        }
        fresh.or(stale)
    }

    /// Llama a YouTube y deja la respuesta pendiente para la caché.
    async fn youtube_first_time_query(
        &self,
        ctx: &RequestContext,
        settings: &ResolverSettings,
        search_text: &str,
    ) -> Option<String> {
        let url = self.providers.youtube.search_url(search_text).await?;
        if settings.cache_enabled(CacheTable::YouTube) {
            self.stage(
                ctx,
                StagedWrite::insert(
                    CacheTable::YouTube,
                    vec![CacheEntry::new(search_text, Value::String(url.clone()))],
                ),
            );
        }
        Some(url)
    }
}
