//! Cache of fetched pages, namespaced by company.
//!
//! Backends:
//! - [`MemoryCache`] - per process, for tests and one-off runs
//! - [`FileCache`] - JSON documents on disk, survives restarts
//! - `SqliteCache` - single SQLite file (feature `sqlite`)

mod file;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::cache::{CacheEntry, CacheKey};

pub use file::FileCache;
pub use memory::MemoryCache;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCache;

/// Store of previously fetched pages.
///
/// Implementations synchronize internally. Writes are last-writer-wins per
/// key and writers for distinct keys do not block each other for long.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up an entry. Stale entries are returned; callers decide.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Insert or overwrite the entry under `entry.key`.
    async fn put(&self, entry: &CacheEntry) -> Result<()>;

    /// Whether an entry is past its TTL.
    fn is_stale(&self, entry: &CacheEntry) -> bool {
        entry.is_stale()
    }

    /// Number of entries for a company namespace.
    async fn count(&self, company: &str) -> Result<usize>;
}
