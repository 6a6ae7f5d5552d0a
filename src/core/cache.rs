//! Request cache with lazy expiry.
//!
//! Entries are keyed by a content-derived hash and live in the durable
//! store, so cached results survive restarts. Expiry is read-side: an entry
//! past its deadline is deleted on the `get` that finds it, not by a
//! background sweep.

use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, warn};

use crate::core::now_ms;
use crate::core::store::KernelStore;

pub const DEFAULT_TTL_MS: i64 = 60 * 60 * 1000;

pub struct QueryCache {
    store: Arc<KernelStore>,
    default_ttl_ms: i64,
}

impl QueryCache {
    pub fn new(store: Arc<KernelStore>, default_ttl_ms: i64) -> Self {
        Self {
            store,
            default_ttl_ms,
        }
    }

    /// Look up `hash`. An expired entry is evicted and reported as a miss.
    /// The hit counter update is best-effort: a failure there must not fail
    /// the read.
    pub async fn get(&self, hash: &str) -> Result<Option<Value>> {
        let Some(entry) = self.store.cache_get(hash).await? else {
            return Ok(None);
        };

        if entry.expires_at < now_ms() {
            debug!("Cache entry {hash} expired, evicting");
            self.store.cache_delete(hash).await?;
            return Ok(None);
        }

        if let Err(e) = self.store.cache_bump_hits(hash).await {
            warn!("Failed to bump hit count for {hash}: {e}");
        }

        Ok(Some(serde_json::from_str(&entry.result_json)?))
    }

    pub async fn set(&self, hash: &str, value: &Value, ttl_ms: Option<i64>) -> Result<()> {
        let now = now_ms();
        let expires_at = now + ttl_ms.unwrap_or(self.default_ttl_ms);
        self.store
            .cache_put(hash, &serde_json::to_string(value)?, now, expires_at)
            .await
    }

    pub async fn clear(&self) -> Result<usize> {
        self.store.cache_clear().await
    }
}
