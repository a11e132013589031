//! # Cache Module
//!
//! Multi-tier cache used by the resolver.
//!
//! - [`scope`]: which provider tables are enabled for an operation
//! - [`store`]: the per-provider local cache and its storage backend trait
//! - [`pending`]: writes staged per request and flushed together
//! - [`memory`] / [`json`]: the bundled storage backends
//!
//! ## Example
//!
//! ```rust,no_run
//! use open_music_resolver::cache::{CacheEntry, CacheTable, LocalCacheStore, MemoryBackend};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), open_music_resolver::error::StorageFault> {
//! let store = LocalCacheStore::new(Arc::new(MemoryBackend::new()));
//! store
//!     .insert_many(
//!         CacheTable::YouTube,
//!         vec![CacheEntry::new("Song Artist", serde_json::json!("https://youtu.be/x"))],
//!     )
//!     .await?;
//!
//! if let Some(hit) = store.fetch_one(CacheTable::YouTube, "Song Artist", 365).await? {
//!     println!("cached: {}", hit.payload);
//! }
//! # Ok(())
//! # }
//! ```

pub mod json;
pub mod memory;
pub mod pending;
pub mod scope;
pub mod store;

pub use json::JsonFileBackend;
pub use memory::MemoryBackend;
pub use pending::{DeferredWrites, PendingWrites, StagedWrite, WriteCategory};
pub use scope::{enabled, CacheScope};
pub use store::{CacheBackend, CacheEntry, CacheHit, CacheTable, LocalCacheStore};

/// Timestamp actual en segundos Unix.
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
