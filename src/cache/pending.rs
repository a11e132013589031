use dashmap::DashMap;
use futures::future::join_all;
use tracing::{debug, warn};

use super::store::{CacheEntry, CacheTable, LocalCacheStore};
use crate::context::RequestId;

/// Categoría de una escritura diferida.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteCategory {
    Update,
    Insert,
}

/// Una escritura registrada pero todavía no ejecutada.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedWrite {
    /// Renueva las dos marcas de tiempo de una fila existente.
    Update { table: CacheTable, key: String },
    Insert { table: CacheTable, entries: Vec<CacheEntry> },
}

impl StagedWrite {
    pub fn update(table: CacheTable, key: impl Into<String>) -> Self {
        StagedWrite::Update { table, key: key.into() }
    }

    pub fn insert(table: CacheTable, entries: Vec<CacheEntry>) -> Self {
        StagedWrite::Insert { table, entries }
    }

    pub fn category(&self) -> WriteCategory {
        match self {
            StagedWrite::Update { .. } => WriteCategory::Update,
            StagedWrite::Insert { .. } => WriteCategory::Insert,
        }
    }

    pub fn table(&self) -> CacheTable {
        match self {
            StagedWrite::Update { table, .. } | StagedWrite::Insert { table, .. } => *table,
        }
    }
}

/// Escrituras pendientes de una petición.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingWrites {
    pub updates: Vec<StagedWrite>,
    pub inserts: Vec<StagedWrite>,
    /// Escrituras del nivel compartido. Ese nivel es de solo lectura:
    /// aquí nunca se registra nada y el flush descarta lo que haya.
    pub global: Vec<StagedWrite>,
}

impl PendingWrites {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.inserts.is_empty() && self.global.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len() + self.inserts.len() + self.global.len()
    }

    fn push(&mut self, write: StagedWrite) {
        match write.category() {
            WriteCategory::Update => self.updates.push(write),
            WriteCategory::Insert => self.inserts.push(write),
        }
    }

    fn absorb(&mut self, other: PendingWrites) {
        self.updates.extend(other.updates);
        self.inserts.extend(other.inserts);
        self.global.extend(other.global);
    }

    /// Filas registradas para `table` en todos los inserts, en orden.
    pub fn inserted_entries(&self, table: CacheTable) -> Vec<&CacheEntry> {
        self.inserts
            .iter()
            .filter_map(|write| match write {
                StagedWrite::Insert { table: t, entries } if *t == table => Some(entries.iter()),
                _ => None,
            })
            .flatten()
            .collect()
    }
}

/// Cola de escrituras diferidas, agrupadas por petición.
///
/// Registrar nunca hace I/O. El conjunto de una petición sale del mapa antes
/// de ejecutarse, así que llega a un solo flush; lo que se registre después
/// con el mismo id empieza un conjunto nuevo.
pub struct DeferredWrites {
    pending: DashMap<RequestId, PendingWrites>,
    store: LocalCacheStore,
}

impl DeferredWrites {
    pub fn new(store: LocalCacheStore) -> Self {
        Self {
            pending: DashMap::new(),
            store,
        }
    }

    pub fn append(&self, request: RequestId, write: StagedWrite) {
        if let StagedWrite::Insert { entries, .. } = &write {
            if entries.is_empty() {
                return;
            }
        }
        self.pending.entry(request).or_default().push(write);
    }

    /// Conjunto pendiente de `request`, sin consumirlo.
    pub fn peek(&self, request: RequestId) -> PendingWrites {
        self.pending
            .get(&request)
            .map(|set| set.value().clone())
            .unwrap_or_default()
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Ejecuta las escrituras pendientes de `request` y devuelve lo registrado.
    ///
    /// Los fallos individuales se registran en el log y se descartan.
    pub async fn flush(&self, request: RequestId) -> PendingWrites {
        let Some((_, staged)) = self.pending.remove(&request) else {
            return PendingWrites::default();
        };
        debug!("Ejecutando {} escrituras para la petición {}", staged.len(), request);
        self.execute(staged.clone()).await;
        staged
    }

    /// Vacía todas las peticiones pendientes. Devuelve cuántas escrituras corrieron.
    pub async fn flush_all(&self) -> usize {
        let ids: Vec<RequestId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut merged = PendingWrites::default();
        for id in ids {
            if let Some((_, staged)) = self.pending.remove(&id) {
                merged.absorb(staged);
            }
        }
        let total = merged.len();
        if total > 0 {
            debug!("Ejecutando {} escrituras pendientes en la caché", total);
            self.execute(merged).await;
        }
        total
    }

    async fn execute(&self, staged: PendingWrites) {
        if !staged.global.is_empty() {
            debug!(
                "Descartando {} escrituras globales: la caché compartida es de solo lectura",
                staged.global.len()
            );
        }

        let writes = staged.updates.into_iter().chain(staged.inserts);
        join_all(writes.map(|write| self.run(write))).await;
    }

    async fn run(&self, write: StagedWrite) {
        let table = write.table();
        let result = match write {
            StagedWrite::Update { table, key } => self.store.update_timestamps(table, &key).await,
            StagedWrite::Insert { table, entries } => self.store.insert_many(table, entries).await,
        };
        if let Err(e) = result {
            warn!("Error escribiendo en la tabla {}: {}", table, e);
        }
    }
}
