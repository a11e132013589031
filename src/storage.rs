use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::context::GuildId;
use crate::error::StorageFault;

/// Configuración de servidor almacenada en JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildSettings {
    pub guild_id: GuildId,
    /// Duración máxima en segundos para encolar. 0 es sin límite.
    #[serde(default)]
    pub max_track_length: u64,
    /// Playlist de la que se alimenta el autoplay.
    #[serde(default)]
    pub autoplaylist: Option<String>,
    #[serde(default)]
    pub whitelist: Vec<String>,
    #[serde(default)]
    pub blacklist: Vec<String>,
    #[serde(default)]
    pub shuffle: bool,
}

impl GuildSettings {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            max_track_length: 0,
            autoplaylist: None,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
            shuffle: false,
        }
    }
}

/// Almacén de configuraciones de servidor: un archivo JSON por servidor.
pub struct GuildSettingsStore {
    dir: Option<PathBuf>,
    guilds: DashMap<GuildId, GuildSettings>,
}

impl GuildSettingsStore {
    /// Configuración solo en memoria.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            guilds: DashMap::new(),
        }
    }

    pub async fn open(dir: PathBuf) -> Result<Self, StorageFault> {
        fs::create_dir_all(&dir).await?;
        let store = Self {
            dir: Some(dir),
            guilds: DashMap::new(),
        };
        store.load_all().await?;
        Ok(store)
    }

    /// Configuración del servidor, o la de defecto si no hay nada guardado.
    /// El resultado queda en memoria: el disco se lee una vez por servidor.
    pub async fn get(&self, guild_id: GuildId) -> GuildSettings {
        if let Some(settings) = self.guilds.get(&guild_id) {
            return settings.clone();
        }

        let settings = match self.load(guild_id).await {
            Ok(Some(settings)) => settings,
            Ok(None) => GuildSettings::new(guild_id),
            Err(e) => {
                warn!("Error cargando configuración para guild {}: {}", guild_id, e);
                return GuildSettings::new(guild_id);
            }
        };
        self.guilds.entry(guild_id).or_insert(settings).clone()
    }

    pub async fn update(&self, settings: GuildSettings) -> Result<(), StorageFault> {
        let guild_id = settings.guild_id;
        self.guilds.insert(guild_id, settings.clone());
        self.save(&settings).await?;
        info!("💾 Configuración actualizada para guild {}", guild_id);
        Ok(())
    }

    /// Servidores con configuración en memoria.
    pub fn list_guilds(&self) -> Vec<GuildId> {
        self.guilds.iter().map(|entry| *entry.key()).collect()
    }

    fn path(&self, guild_id: GuildId) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("guild_{}.json", guild_id)))
    }

    async fn load(&self, guild_id: GuildId) -> Result<Option<GuildSettings>, StorageFault> {
        let Some(path) = self.path(guild_id) else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save(&self, settings: &GuildSettings) -> Result<(), StorageFault> {
        let Some(path) = self.path(settings.guild_id) else {
            return Ok(());
        };
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&path, content).await?;
        Ok(())
    }

    async fn load_all(&self) -> Result<(), StorageFault> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let mut files = fs::read_dir(dir).await?;
        let mut loaded_count = 0;

        while let Some(entry) = files.next_entry().await? {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }
            let Some(guild_id) = path
                .file_stem()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("guild_"))
                .and_then(|id| id.parse::<u64>().ok())
            else {
                continue;
            };
            match self.load(GuildId(guild_id)).await {
                Ok(Some(settings)) => {
                    self.guilds.insert(GuildId(guild_id), settings);
                    loaded_count += 1;
                }
                Ok(None) => {}
                Err(e) => warn!("Error cargando configuración para guild {}: {}", guild_id, e),
            }
        }

        if loaded_count > 0 {
            info!("📂 Cargadas {} configuraciones de servidor", loaded_count);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn unknown_guilds_get_defaults() {
        let store = GuildSettingsStore::in_memory();
        assert!(store.list_guilds().is_empty());
        assert_eq!(store.get(GuildId(5)).await, GuildSettings::new(GuildId(5)));
        assert_eq!(store.list_guilds(), vec![GuildId(5)]);
    }

    #[tokio::test]
    async fn defaults_are_kept_in_memory_after_the_first_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = GuildSettingsStore::open(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(store.get(GuildId(7)).await, GuildSettings::new(GuildId(7)));

        let mut on_disk = GuildSettings::new(GuildId(7));
        on_disk.shuffle = true;
        std::fs::write(
            dir.path().join("guild_7.json"),
            serde_json::to_string(&on_disk).unwrap(),
        )
        .unwrap();

        assert!(!store.get(GuildId(7)).await.shuffle);
    }

    #[tokio::test]
    async fn settings_persist_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = GuildSettings::new(GuildId(42));
        settings.max_track_length = 600;
        settings.blacklist = vec!["nightcore".into()];
        {
            let store = GuildSettingsStore::open(dir.path().to_path_buf()).await.unwrap();
            store.update(settings.clone()).await.unwrap();
        }

        let reopened = GuildSettingsStore::open(dir.path().to_path_buf()).await.unwrap();
        assert_eq!(reopened.list_guilds(), vec![GuildId(42)]);
        assert_eq!(reopened.get(GuildId(42)).await, settings);
    }
}
