use anyhow::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{CacheScope, CacheTable};
use crate::context::GuildId;
use crate::storage::{GuildSettings, GuildSettingsStore};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Caché
    pub cache_level: CacheScope,
    pub cache_age_days: u32,
    /// Tablas cuyas entradas vencidas se revalidan antes de usarse.
    pub cache_revalidate: CacheScope,

    // Rutas
    pub data_dir: PathBuf,
    pub local_tracks_path: PathBuf,

    // APIs (opcionales)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,
    pub youtube_api_key: Option<String>,

    // Lavalink
    pub lavalink_host: String,
    pub lavalink_port: u16,
    pub lavalink_password: String,

    pub http_timeout_secs: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let optional = |name: &str| std::env::var(name).ok().filter(|value| !value.trim().is_empty());

        let config = Self {
            cache_level: CacheScope::from_bits(
                std::env::var("CACHE_LEVEL")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()?,
            ),
            cache_age_days: std::env::var("CACHE_AGE_DAYS")
                .unwrap_or_else(|_| "365".to_string())
                .parse()?,
            cache_revalidate: parse_tables(
                &std::env::var("CACHE_REVALIDATE").unwrap_or_else(|_| "lavalink".to_string()),
            )?,

            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "/app/data".to_string())
                .into(),
            local_tracks_path: std::env::var("LOCAL_TRACKS_PATH")
                .unwrap_or_else(|_| "/app/localtracks".to_string())
                .into(),

            spotify_client_id: optional("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: optional("SPOTIFY_CLIENT_SECRET"),
            youtube_api_key: optional("YOUTUBE_API_KEY"),

            lavalink_host: std::env::var("LAVALINK_HOST").unwrap_or_else(|_| "localhost".to_string()),
            lavalink_port: std::env::var("LAVALINK_PORT")
                .unwrap_or_else(|_| "2333".to_string())
                .parse()?,
            lavalink_password: std::env::var("LAVALINK_PASSWORD")
                .unwrap_or_else(|_| "youshallnotpass".to_string()),

            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
        };

        std::fs::create_dir_all(&config.data_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// - The cache age must be at least one day
    /// - The HTTP timeout must be between 1 and 120 seconds
    /// - Spotify credentials come in pairs
    pub fn validate(&self) -> Result<()> {
        if self.cache_age_days == 0 {
            anyhow::bail!("Cache age must be at least 1 day");
        }

        if self.http_timeout_secs == 0 || self.http_timeout_secs > 120 {
            anyhow::bail!("HTTP timeout must be between 1 and 120 seconds, got: {}", self.http_timeout_secs);
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn guilds_dir(&self) -> PathBuf {
        self.data_dir.join("guilds")
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            cache_level: self.cache_level,
            cache_age_days: self.cache_age_days,
            revalidate: self.cache_revalidate,
            local_root: self.local_tracks_path.clone(),
        }
    }

    /// Returns a summary of the current configuration for logging, without secrets.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Cache: level {} ({} days, revalidate {})\n  \
            Paths: data {}, local tracks {}\n  \
            APIs: Spotify={}, YouTube={}\n  \
            Lavalink: {}:{} ({}s timeout)",
            self.cache_level,
            self.cache_age_days,
            self.cache_revalidate,
            self.data_dir.display(),
            self.local_tracks_path.display(),
            self.spotify_client_id.is_some(),
            self.youtube_api_key.is_some(),
            self.lavalink_host,
            self.lavalink_port,
            self.http_timeout_secs,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_level: CacheScope::ALL,
            cache_age_days: 365,
            cache_revalidate: CacheScope::LAVALINK,
            data_dir: "/app/data".into(),
            local_tracks_path: "/app/localtracks".into(),
            spotify_client_id: None,
            spotify_client_secret: None,
            youtube_api_key: None,
            lavalink_host: "localhost".to_string(),
            lavalink_port: 2333,
            lavalink_password: "youshallnotpass".to_string(),
            http_timeout_secs: 10,
        }
    }
}

fn parse_tables(list: &str) -> Result<CacheScope> {
    let mut scope = CacheScope::NONE;
    for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
        match CacheTable::from_name(name) {
            Some(table) => scope |= table.scope(),
            None => anyhow::bail!("Unknown cache table in CACHE_REVALIDATE: {}", name),
        }
    }
    Ok(scope)
}

/// Instantánea de configuración que recibe cada operación.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverSettings {
    pub cache_level: CacheScope,
    pub cache_age_days: u32,
    pub revalidate: CacheScope,
    pub local_root: PathBuf,
}

impl ResolverSettings {
    pub fn cache_enabled(&self, table: CacheTable) -> bool {
        crate::cache::enabled(table.scope(), self.cache_level)
    }

    /// Si una entrada vencida de `table` debe revalidarse antes de usarse.
    pub fn revalidates(&self, table: CacheTable) -> bool {
        self.revalidate.contains(table.scope())
    }
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Config::default().resolver_settings()
    }
}

/// Fuente de configuración global y por servidor.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    /// Configuración global actual. Se relee en cada punto de entrada.
    async fn snapshot(&self) -> ResolverSettings;

    async fn guild(&self, guild_id: GuildId) -> GuildSettings;
}

/// Configuración viva: la global en memoria, la de servidores en disco.
pub struct SharedSettings {
    global: RwLock<ResolverSettings>,
    guilds: GuildSettingsStore,
}

impl SharedSettings {
    pub fn new(global: ResolverSettings, guilds: GuildSettingsStore) -> Self {
        Self {
            global: RwLock::new(global),
            guilds,
        }
    }

    pub fn guilds(&self) -> &GuildSettingsStore {
        &self.guilds
    }

    pub fn set_cache_level(&self, level: CacheScope) {
        self.global.write().cache_level = level;
    }

    pub fn set_cache_age_days(&self, days: u32) {
        self.global.write().cache_age_days = days.max(1);
    }

    pub fn set_revalidate(&self, tables: CacheScope) {
        self.global.write().revalidate = tables;
    }
}

#[async_trait]
impl SettingsProvider for SharedSettings {
    async fn snapshot(&self) -> ResolverSettings {
        self.global.read().clone()
    }

    async fn guild(&self, guild_id: GuildId) -> GuildSettings {
        self.guilds.get(guild_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revalidate_list_parses_table_names() {
        assert_eq!(parse_tables("lavalink, youtube").unwrap(), CacheScope::LAVALINK | CacheScope::YOUTUBE);
        assert_eq!(parse_tables("").unwrap(), CacheScope::NONE);
        assert!(parse_tables("global").is_err());
    }

    #[test]
    fn validation_rejects_half_credentials() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());
        config.spotify_client_id = Some("id".into());
        assert!(config.validate().is_err());
        config.spotify_client_secret = Some("secret".into());
        assert!(config.validate().is_ok());
        config.cache_age_days = 0;
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn latest_config_wins_at_each_snapshot() {
        let settings = SharedSettings::new(ResolverSettings::default(), GuildSettingsStore::in_memory());
        let before = settings.snapshot().await;
        assert!(before.cache_enabled(CacheTable::Spotify));

        settings.set_cache_level(CacheScope::YOUTUBE);
        let after = settings.snapshot().await;
        assert!(!after.cache_enabled(CacheTable::Spotify));
        assert!(after.cache_enabled(CacheTable::YouTube));
        // las instantáneas anteriores no cambian
        assert!(before.cache_enabled(CacheTable::Spotify));
    }

    #[test]
    fn default_policy_only_revalidates_lavalink() {
        let settings = ResolverSettings::default();
        assert!(settings.revalidates(CacheTable::Lavalink));
        assert!(!settings.revalidates(CacheTable::Spotify));
        assert!(!settings.revalidates(CacheTable::YouTube));
    }
}
