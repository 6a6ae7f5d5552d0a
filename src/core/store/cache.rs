use anyhow::Result;
use rusqlite::params;

use super::KernelStore;
use super::types::CacheRecord;

impl KernelStore {
    pub async fn cache_get(&self, hash: &str) -> Result<Option<CacheRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(
            "SELECT hash, result_json, created_at, expires_at, hit_count
             FROM query_cache WHERE hash = ?1 LIMIT 1",
        )?;
        let mut rows = stmt.query(params![hash])?;
        match rows.next()? {
            Some(row) => Ok(Some(CacheRecord {
                hash: row.get(0)?,
                result_json: row.get(1)?,
                created_at: row.get(2)?,
                expires_at: row.get(3)?,
                hit_count: row.get(4)?,
            })),
            None => Ok(None),
        }
    }

    /// Insert or overwrite an entry. Overwriting resets the hit count.
    pub async fn cache_put(
        &self,
        hash: &str,
        result_json: &str,
        created_at: i64,
        expires_at: i64,
    ) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "INSERT OR REPLACE INTO query_cache (hash, result_json, created_at, expires_at, hit_count)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![hash, result_json, created_at, expires_at],
        )?;
        Ok(())
    }

    pub async fn cache_delete(&self, hash: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM query_cache WHERE hash = ?1", params![hash])?;
        Ok(rows > 0)
    }

    pub async fn cache_bump_hits(&self, hash: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute(
            "UPDATE query_cache SET hit_count = hit_count + 1 WHERE hash = ?1",
            params![hash],
        )?;
        Ok(())
    }

    pub async fn cache_clear(&self) -> Result<usize> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM query_cache", [])?;
        Ok(rows)
    }
}
