//! SQLite cache implementation.
//!
//! One table keyed by `(company, url)`. Page content is stored as JSON.

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::time::Duration;

use super::CacheStore;
use crate::error::{AcquisitionError, Result};
use crate::types::cache::{CacheEntry, CacheKey};
use crate::types::fetch::{PageContent, Strategy};

/// SQLite-based page cache.
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    /// Open a cache at the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite::memory:` - In-memory database (ephemeral)
    /// - `sqlite://./acquisition.db?mode=rwc` - Create if not exists
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| AcquisitionError::Storage(e.to_string().into()))?;

        let cache = Self { pool };
        cache.run_migrations().await?;
        Ok(cache)
    }

    /// Create an in-memory cache (for testing).
    pub async fn in_memory() -> Result<Self> {
        // A single connection, otherwise each pooled connection gets its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| AcquisitionError::Storage(e.to_string().into()))?;

        let cache = Self { pool };
        cache.run_migrations().await?;
        Ok(cache)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                company TEXT NOT NULL,
                url TEXT NOT NULL,
                content TEXT NOT NULL,
                strategy TEXT NOT NULL,
                fetched_at TEXT NOT NULL,
                ttl_secs INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                PRIMARY KEY (company, url)
            );

            CREATE INDEX IF NOT EXISTS idx_cache_entries_company ON cache_entries(company);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AcquisitionError::Storage(e.to_string().into()))?;

        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct EntryRow {
    company: String,
    url: String,
    content: String,
    strategy: String,
    fetched_at: String,
    ttl_secs: i64,
    content_hash: String,
}

impl EntryRow {
    fn into_cache_entry(self) -> Result<CacheEntry> {
        let fetched_at = chrono::DateTime::parse_from_rfc3339(&self.fetched_at)
            .map_err(|e| AcquisitionError::Storage(format!("Invalid date: {}", e).into()))?
            .with_timezone(&chrono::Utc);

        let content: PageContent = serde_json::from_str(&self.content).map_err(|e| {
            AcquisitionError::Storage(format!("Invalid content JSON: {}", e).into())
        })?;

        let strategy = match self.strategy.as_str() {
            "rendered" => Strategy::Rendered,
            _ => Strategy::Static,
        };

        Ok(CacheEntry {
            key: CacheKey::new(self.company, self.url),
            content,
            strategy,
            fetched_at,
            ttl: Duration::from_secs(self.ttl_secs.max(0) as u64),
            content_hash: self.content_hash,
        })
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        let row: Option<EntryRow> =
            sqlx::query_as("SELECT * FROM cache_entries WHERE company = ? AND url = ?")
                .bind(&key.company)
                .bind(&key.url)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AcquisitionError::Storage(e.to_string().into()))?;

        row.map(|r| r.into_cache_entry()).transpose()
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let content = serde_json::to_string(&entry.content)?;
        let ttl_secs = i64::try_from(entry.ttl.as_secs()).unwrap_or(i64::MAX);

        sqlx::query(
            r#"
            INSERT INTO cache_entries (company, url, content, strategy, fetched_at, ttl_secs, content_hash)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(company, url) DO UPDATE SET
                content = excluded.content,
                strategy = excluded.strategy,
                fetched_at = excluded.fetched_at,
                ttl_secs = excluded.ttl_secs,
                content_hash = excluded.content_hash
            "#,
        )
        .bind(&entry.key.company)
        .bind(&entry.key.url)
        .bind(&content)
        .bind(entry.strategy.to_string())
        .bind(entry.fetched_at.to_rfc3339())
        .bind(ttl_secs)
        .bind(&entry.content_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| AcquisitionError::Storage(e.to_string().into()))?;

        Ok(())
    }

    async fn count(&self, company: &str) -> Result<usize> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM cache_entries WHERE company = ?")
                .bind(company)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| AcquisitionError::Storage(e.to_string().into()))?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_get() {
        let cache = SqliteCache::in_memory().await.unwrap();
        let key = CacheKey::new("acme", "https://acme.com/about");

        assert!(cache.get(&key).await.unwrap().is_none());

        for text in ["first", "second"] {
            let entry = CacheEntry::new(
                key.clone(),
                PageContent::new(&key.url, text),
                Strategy::Rendered,
                Duration::from_secs(600),
            );
            cache.put(&entry).await.unwrap();
        }

        let got = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(got.content.text, "second");
        assert_eq!(got.strategy, Strategy::Rendered);
        assert_eq!(got.ttl, Duration::from_secs(600));
        assert_eq!(cache.count("acme").await.unwrap(), 1);
        assert_eq!(cache.count("globex").await.unwrap(), 0);
    }
}
