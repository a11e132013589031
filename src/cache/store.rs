use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::{unix_now, CacheScope};
use crate::error::StorageFault;

const SECONDS_PER_DAY: i64 = 86_400;

/// Tabla de caché local, una por proveedor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheTable {
    Spotify,
    YouTube,
    Lavalink,
}

impl CacheTable {
    pub const ALL: [CacheTable; 3] = [CacheTable::Spotify, CacheTable::YouTube, CacheTable::Lavalink];

    /// Nivel de caché que habilita lecturas y escrituras en esta tabla.
    pub fn scope(self) -> CacheScope {
        match self {
            CacheTable::Spotify => CacheScope::SPOTIFY,
            CacheTable::YouTube => CacheScope::YOUTUBE,
            CacheTable::Lavalink => CacheScope::LAVALINK,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CacheTable::Spotify => "spotify",
            CacheTable::YouTube => "youtube",
            CacheTable::Lavalink => "lavalink",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|table| table.name() == name.trim())
    }
}

impl fmt::Display for CacheTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Una fila de caché: clave natural, respuesta serializada y marcas de tiempo.
///
/// La clave es la URI del track de Spotify, el texto de búsqueda de YouTube
/// o la consulta normalizada, según la tabla.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Value,
    pub last_updated: i64,
    pub last_fetched: i64,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, payload: Value) -> Self {
        let now = unix_now();
        Self {
            key: key.into(),
            payload,
            last_updated: now,
            last_fetched: now,
        }
    }

    /// Reemplazar una fila nunca retrocede sus marcas de tiempo.
    pub fn merged_over(mut self, previous: &CacheEntry) -> Self {
        self.last_updated = self.last_updated.max(previous.last_updated);
        self.last_fetched = self.last_fetched.max(previous.last_fetched);
        self
    }

    /// Renueva las dos marcas de tiempo tras revalidar un acierto.
    pub fn touch(&mut self, now: i64) {
        self.last_updated = self.last_updated.max(now);
        self.last_fetched = self.last_fetched.max(now);
    }

    pub fn is_stale(&self, max_age_days: u32, now: i64) -> bool {
        now - self.last_updated > i64::from(max_age_days) * SECONDS_PER_DAY
    }
}

/// Resultado de una lectura con su estado de frescura.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub payload: Value,
    pub needs_revalidation: bool,
    pub last_updated: i64,
}

/// Motor de almacenamiento detrás de la caché local.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, table: CacheTable, key: &str) -> Result<Option<CacheEntry>, StorageFault>;

    /// Inserta o reemplaza filas por clave.
    async fn upsert_many(&self, table: CacheTable, entries: Vec<CacheEntry>) -> Result<(), StorageFault>;

    /// Pone las dos marcas de `key` en `now`. Devuelve si la fila existía.
    async fn touch(&self, table: CacheTable, key: &str, now: i64) -> Result<bool, StorageFault>;

    /// Una fila al azar actualizada desde `not_before`.
    async fn random_fresh(&self, table: CacheTable, not_before: i64) -> Result<Option<CacheEntry>, StorageFault>;
}

/// Caché local por proveedor, compartida por todas las instancias del pipeline.
#[derive(Clone)]
pub struct LocalCacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl LocalCacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Busca `key`. Sin fila es `Ok(None)`; solo los fallos de almacenamiento son error.
    pub async fn fetch_one(
        &self,
        table: CacheTable,
        key: &str,
        max_age_days: u32,
    ) -> Result<Option<CacheHit>, StorageFault> {
        let Some(entry) = self.backend.get(table, key).await? else {
            return Ok(None);
        };
        let needs_revalidation = entry.is_stale(max_age_days, unix_now());
        if needs_revalidation {
            debug!("⏰ Entrada {} vencida en tabla {}", key, table);
        }
        Ok(Some(CacheHit {
            payload: entry.payload,
            needs_revalidation,
            last_updated: entry.last_updated,
        }))
    }

    pub async fn insert_many(&self, table: CacheTable, entries: Vec<CacheEntry>) -> Result<(), StorageFault> {
        if entries.is_empty() {
            return Ok(());
        }
        let count = entries.len();
        self.backend.upsert_many(table, entries).await?;
        debug!("💾 {} entradas guardadas en tabla {}", count, table);
        Ok(())
    }

    pub async fn update_timestamps(&self, table: CacheTable, key: &str) -> Result<(), StorageFault> {
        if !self.backend.touch(table, key, unix_now()).await? {
            debug!("Entrada {} ya no existe en tabla {}", key, table);
        }
        Ok(())
    }

    /// Una entrada al azar con menos de `max_age_days` días.
    pub async fn fetch_random(&self, table: CacheTable, max_age_days: u32) -> Result<Option<Value>, StorageFault> {
        let not_before = unix_now() - i64::from(max_age_days) * SECONDS_PER_DAY;
        Ok(self
            .backend
            .random_fresh(table, not_before)
            .await?
            .map(|entry| entry.payload))
    }
}
