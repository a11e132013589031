use async_trait::async_trait;
use dashmap::DashMap;
use rand::seq::SliceRandom;

use super::store::{CacheBackend, CacheEntry, CacheTable};
use crate::error::StorageFault;

/// Backend en memoria, una tabla `DashMap` por proveedor.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    spotify: DashMap<String, CacheEntry>,
    youtube: DashMap<String, CacheEntry>,
    lavalink: DashMap<String, CacheEntry>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn table(&self, table: CacheTable) -> &DashMap<String, CacheEntry> {
        match table {
            CacheTable::Spotify => &self.spotify,
            CacheTable::YouTube => &self.youtube,
            CacheTable::Lavalink => &self.lavalink,
        }
    }

    /// Copia de una fila, sin pasar por el store.
    pub fn snapshot(&self, table: CacheTable, key: &str) -> Option<CacheEntry> {
        self.table(table).get(key).map(|entry| entry.value().clone())
    }

    pub fn len(&self, table: CacheTable) -> usize {
        self.table(table).len()
    }

    pub fn is_empty(&self) -> bool {
        CacheTable::ALL.iter().all(|table| self.table(*table).is_empty())
    }

    pub(crate) fn upsert(&self, table: CacheTable, entries: Vec<CacheEntry>) {
        let rows = self.table(table);
        for entry in entries {
            let entry = match rows.get(&entry.key) {
                Some(previous) => entry.merged_over(previous.value()),
                None => entry,
            };
            rows.insert(entry.key.clone(), entry);
        }
    }

    pub(crate) fn touch_row(&self, table: CacheTable, key: &str, now: i64) -> bool {
        match self.table(table).get_mut(key) {
            Some(mut entry) => {
                entry.touch(now);
                true
            }
            None => false,
        }
    }

    pub(crate) fn pick_fresh(&self, table: CacheTable, not_before: i64) -> Option<CacheEntry> {
        let fresh: Vec<CacheEntry> = self
            .table(table)
            .iter()
            .filter(|entry| entry.value().last_updated >= not_before)
            .map(|entry| entry.value().clone())
            .collect();
        fresh.choose(&mut rand::thread_rng()).cloned()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, table: CacheTable, key: &str) -> Result<Option<CacheEntry>, StorageFault> {
        Ok(self.snapshot(table, key))
    }

    async fn upsert_many(&self, table: CacheTable, entries: Vec<CacheEntry>) -> Result<(), StorageFault> {
        self.upsert(table, entries);
        Ok(())
    }

    async fn touch(&self, table: CacheTable, key: &str, now: i64) -> Result<bool, StorageFault> {
        Ok(self.touch_row(table, key, now))
    }

    async fn random_fresh(&self, table: CacheTable, not_before: i64) -> Result<Option<CacheEntry>, StorageFault> {
        Ok(self.pick_fresh(table, not_before))
    }
}
