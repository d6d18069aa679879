//! In-memory cache for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::CacheStore;
use crate::error::{AcquisitionError, Result};
use crate::types::cache::{CacheEntry, CacheKey};

/// In-memory page cache.
///
/// Contents are lost on restart.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total entries across all companies.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> AcquisitionError {
    AcquisitionError::Storage("memory cache lock poisoned".into())
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn count(&self, company: &str) -> Result<usize> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.keys().filter(|k| k.company == company).count())
    }
}
