//! On-disk JSON cache.
//!
//! Layout: `<root>/<company>/<sha256(url)>.json`. Each write goes to a
//! temporary file in the same directory and is renamed into place, so
//! readers never observe a partial entry.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use super::CacheStore;
use crate::error::{AcquisitionError, Result};
use crate::types::cache::{CacheEntry, CacheKey};
use crate::types::fetch::hash_content;
use crate::types::site::company_slug;

/// File-backed page cache.
pub struct FileCache {
    root: PathBuf,
}

impl FileCache {
    /// Use `root` as the cache directory. It is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn company_dir(&self, company: &str) -> PathBuf {
        self.root.join(company_slug(company))
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.company_dir(&key.company)
            .join(format!("{}.json", hash_content(&key.url)))
    }
}

fn storage<E: std::error::Error + Send + Sync + 'static>(e: E) -> AcquisitionError {
    AcquisitionError::Storage(Box::new(e))
}

#[async_trait]
impl CacheStore for FileCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage(e)),
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.key == *key => Ok(Some(entry)),
            Ok(_) => {
                warn!(path = %path.display(), "cache entry key mismatch, ignoring");
                Ok(None)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry, ignoring");
                Ok(None)
            }
        }
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let dir = self.company_dir(&entry.key.company);
        tokio::fs::create_dir_all(&dir).await.map_err(storage)?;

        let path = self.entry_path(&entry.key);
        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4()));
        let json = serde_json::to_vec_pretty(entry)?;

        tokio::fs::write(&tmp, json).await.map_err(storage)?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage(e));
        }

        debug!(url = %entry.key.url, path = %path.display(), "cache entry written");
        Ok(())
    }

    async fn count(&self, company: &str) -> Result<usize> {
        let mut dir = match tokio::fs::read_dir(self.company_dir(company)).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(storage(e)),
        };

        let mut count = 0;
        while let Some(item) = dir.next_entry().await.map_err(storage)? {
            if item.path().extension().is_some_and(|ext| ext == "json") {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::fetch::{PageContent, Strategy};
    use chrono::{Duration as ChronoDuration, Utc};
    use std::time::Duration;

    fn entry(url: &str, text: &str) -> CacheEntry {
        CacheEntry::new(
            CacheKey::new("Acme Corp", url),
            PageContent::new(url, text).with_title("About"),
            Strategy::Rendered,
            Duration::from_secs(3600),
        )
    }

    #[tokio::test]
    async fn test_round_trip_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let written = entry("https://acme.com/about", "We build anvils")
            .with_fetched_at(Utc::now() - ChronoDuration::minutes(5));

        FileCache::new(dir.path()).put(&written).await.unwrap();

        let reopened = FileCache::new(dir.path());
        let read = reopened.get(&written.key).await.unwrap().unwrap();
        assert_eq!(read, written);
        assert!(!reopened.is_stale(&read));
        assert_eq!(reopened.count("Acme Corp").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_entries_are_misses() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());
        let key = CacheKey::new("Acme Corp", "https://acme.com/team");

        assert!(cache.get(&key).await.unwrap().is_none());

        let path = cache.entry_path(&key);
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        cache.put(&entry("https://acme.com/about", "old")).await.unwrap();
        cache.put(&entry("https://acme.com/about", "new")).await.unwrap();

        let key = CacheKey::new("Acme Corp", "https://acme.com/about");
        assert_eq!(cache.get(&key).await.unwrap().unwrap().content.text, "new");
        assert_eq!(cache.count("Acme Corp").await.unwrap(), 1);
    }
}
