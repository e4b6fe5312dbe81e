//! SQLite cache for fetched filing packages.
//!
//! Packages are immutable once published, so the cache never needs
//! invalidation beyond explicit eviction; a hit skips the network
//! entirely during batch reruns.

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::error::Result;

/// SQLite-backed store of raw filing-package bytes keyed by document id.
#[derive(Debug)]
pub struct FilingCache {
    conn: Connection,
}

impl FilingCache {
    /// Open (or create) a cache database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory cache (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS filings (
                doc_id TEXT PRIMARY KEY,
                company_id TEXT NOT NULL,
                fiscal_year INTEGER NOT NULL,
                bytes BLOB NOT NULL,
                cached_at TEXT NOT NULL
            )",
            [],
        )?;
        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_filings_company_year
             ON filings(company_id, fiscal_year)",
            [],
        )?;
        Ok(())
    }

    /// Store a package, replacing any previous bytes for the same id.
    pub fn store(
        &self,
        doc_id: &str,
        company_id: &str,
        fiscal_year: i32,
        bytes: &[u8],
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO filings (doc_id, company_id, fiscal_year, bytes, cached_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                doc_id,
                company_id,
                fiscal_year,
                bytes,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// Package bytes for a document id, if cached.
    pub fn load(&self, doc_id: &str) -> Result<Option<Vec<u8>>> {
        let bytes = self
            .conn
            .query_row(
                "SELECT bytes FROM filings WHERE doc_id = ?1",
                params![doc_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(bytes)
    }

    /// Most recently cached package for a company and fiscal year.
    pub fn find(&self, company_id: &str, fiscal_year: i32) -> Result<Option<(String, Vec<u8>)>> {
        let row = self
            .conn
            .query_row(
                "SELECT doc_id, bytes FROM filings
                 WHERE company_id = ?1 AND fiscal_year = ?2
                 ORDER BY cached_at DESC LIMIT 1",
                params![company_id, fiscal_year],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?)),
            )
            .optional()?;
        Ok(row)
    }

    /// Number of cached packages.
    pub fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM filings", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Whether the cache holds no packages.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop entries cached before the RFC 3339 timestamp. Returns the
    /// number evicted.
    pub fn evict_before(&self, cutoff: &str) -> Result<usize> {
        let evicted = self.conn.execute(
            "DELETE FROM filings WHERE cached_at < ?1",
            params![cutoff],
        )?;
        Ok(evicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_load() {
        let cache = FilingCache::in_memory().unwrap();
        assert!(cache.is_empty().unwrap());

        cache.store("S100A", "E00001", 2024, b"package-bytes").unwrap();
        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(
            cache.load("S100A").unwrap().as_deref(),
            Some(b"package-bytes".as_slice())
        );
        assert!(cache.load("S100B").unwrap().is_none());
    }

    #[test]
    fn test_store_replaces() {
        let cache = FilingCache::in_memory().unwrap();
        cache.store("S100A", "E00001", 2024, b"v1").unwrap();
        cache.store("S100A", "E00001", 2024, b"v2").unwrap();
        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.load("S100A").unwrap().as_deref(), Some(b"v2".as_slice()));
    }

    #[test]
    fn test_find_by_company_year() {
        let cache = FilingCache::in_memory().unwrap();
        cache.store("S100A", "E00001", 2023, b"old").unwrap();
        cache.store("S100B", "E00001", 2024, b"new").unwrap();

        let (doc_id, bytes) = cache.find("E00001", 2024).unwrap().unwrap();
        assert_eq!(doc_id, "S100B");
        assert_eq!(bytes, b"new");
        assert!(cache.find("E99999", 2024).unwrap().is_none());
    }

    #[test]
    fn test_evict_before() {
        let cache = FilingCache::in_memory().unwrap();
        cache.store("S100A", "E00001", 2024, b"x").unwrap();
        let evicted = cache.evict_before("1970-01-01T00:00:00Z").unwrap();
        assert_eq!(evicted, 0);
        let evicted = cache.evict_before("9999-01-01T00:00:00Z").unwrap();
        assert_eq!(evicted, 1);
        assert!(cache.is_empty().unwrap());
    }
}
