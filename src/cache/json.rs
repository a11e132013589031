use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};
use tracing::{info, warn};

use super::memory::MemoryBackend;
use super::store::{CacheBackend, CacheEntry, CacheTable};
use crate::error::StorageFault;

/// Backend persistente: un archivo JSON por tabla.
///
/// Las filas viven en memoria y cada escritura reescribe el archivo de su tabla.
/// Las escrituras de una misma tabla van en serie.
pub struct JsonFileBackend {
    dir: PathBuf,
    rows: MemoryBackend,
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageFault> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;

        let rows = MemoryBackend::new();
        let mut loaded = 0;
        for table in CacheTable::ALL {
            let path = Self::table_path(&dir, table);
            if !path.exists() {
                continue;
            }
            match Self::load_table(&path).await {
                Ok(entries) => {
                    loaded += entries.len();
                    rows.upsert(table, entries);
                }
                Err(e) => {
                    warn!("Error cargando tabla {} desde {}: {}", table, path.display(), e);
                }
            }
        }

        info!("📁 Caché local abierta en {} ({} entradas)", dir.display(), loaded);
        Ok(Self {
            dir,
            rows,
            write_lock: Mutex::new(()),
        })
    }

    fn table_path(dir: &Path, table: CacheTable) -> PathBuf {
        dir.join(format!("{}.json", table.name()))
    }

    async fn load_table(path: &Path) -> Result<Vec<CacheEntry>, StorageFault> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn persist(&self, table: CacheTable) -> Result<(), StorageFault> {
        let _guard = self.write_lock.lock().await;
        let mut entries: Vec<CacheEntry> = self
            .rows
            .table(table)
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let content = serde_json::to_string_pretty(&entries)?;
        let path = Self::table_path(&self.dir, table);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for JsonFileBackend {
    async fn get(&self, table: CacheTable, key: &str) -> Result<Option<CacheEntry>, StorageFault> {
        Ok(self.rows.snapshot(table, key))
    }

    async fn upsert_many(&self, table: CacheTable, entries: Vec<CacheEntry>) -> Result<(), StorageFault> {
        self.rows.upsert(table, entries);
        self.persist(table).await
    }

    async fn touch(&self, table: CacheTable, key: &str, now: i64) -> Result<bool, StorageFault> {
        if !self.rows.touch_row(table, key, now) {
            return Ok(false);
        }
        self.persist(table).await?;
        Ok(true)
    }

    async fn random_fresh(&self, table: CacheTable, not_before: i64) -> Result<Option<CacheEntry>, StorageFault> {
        Ok(self.rows.pick_fresh(table, not_before))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = JsonFileBackend::open(dir.path()).await.unwrap();
            backend
                .upsert_many(
                    CacheTable::YouTube,
                    vec![CacheEntry::new("artist song", json!("https://www.youtube.com/watch?v=abc"))],
                )
                .await
                .unwrap();
        }

        let reopened = JsonFileBackend::open(dir.path()).await.unwrap();
        let entry = reopened.get(CacheTable::YouTube, "artist song").await.unwrap().unwrap();
        assert_eq!(entry.payload, json!("https://www.youtube.com/watch?v=abc"));
        assert!(reopened.get(CacheTable::Lavalink, "artist song").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_table_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("spotify.json"), "{not json").unwrap();
        let backend = JsonFileBackend::open(dir.path()).await.unwrap();
        assert!(backend.get(CacheTable::Spotify, "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn touch_on_missing_row_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonFileBackend::open(dir.path()).await.unwrap();
        assert!(!backend.touch(CacheTable::Lavalink, "missing", 1).await.unwrap());
        assert!(!dir.path().join("lavalink.json").exists());
    }
}
