//! Query router: decides whether a SQL computation is served from the cache
//! or sent to the compute engine, and records fresh results back into the
//! cache.
//!
//! Write-shaped statements (anything containing "create"/"insert") bypass
//! the cache in both directions: their row sets are not meaningful results,
//! only side effects. They still get the higher cost class for telemetry.

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::core::cache::QueryCache;
use crate::core::engine::{ComputeEngine, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Cache,
    Compute,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    pub source: PlanSource,
    pub estimated_cost: u32,
    pub query: String,
}

/// Stable key for a SQL text: the classic 32-bit rolling hash
/// (`h = h * 31 + ch`, wrapping). Collisions are a theoretical risk accepted
/// by the contract; byte-identical texts always agree.
pub fn hash_query(query: &str) -> String {
    let mut hash: i32 = 0;
    for ch in query.chars() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(ch as i32);
    }
    format!("q_{hash}")
}

fn is_write_shaped(query: &str) -> bool {
    let lower = query.to_lowercase();
    lower.contains("create") || lower.contains("insert")
}

pub struct QueryRouter {
    engine: Arc<dyn ComputeEngine>,
    cache: Arc<QueryCache>,
}

impl QueryRouter {
    pub fn new(engine: Arc<dyn ComputeEngine>, cache: Arc<QueryCache>) -> Self {
        Self { engine, cache }
    }

    /// Classify a query without executing it.
    pub async fn optimize(&self, query: &str) -> Result<QueryPlan> {
        let write = is_write_shaped(query);
        if !write && self.cache.get(&hash_query(query)).await?.is_some() {
            return Ok(QueryPlan {
                source: PlanSource::Cache,
                estimated_cost: 0,
                query: query.to_string(),
            });
        }
        Ok(QueryPlan {
            source: PlanSource::Compute,
            estimated_cost: if write { 500 } else { 50 },
            query: query.to_string(),
        })
    }

    pub async fn execute(&self, query: &str) -> Result<Vec<Row>> {
        let hash = hash_query(query);

        if !is_write_shaped(query) {
            if let Some(cached) = self.cache.get(&hash).await? {
                info!("Serving query from cache [{hash}]");
                return Ok(serde_json::from_value(cached)?);
            }
        }

        debug!("Routing query to compute engine [{hash}]");
        let rows = self.engine.query(query).await?;

        if !is_write_shaped(query) {
            let value: Value = serde_json::to_value(&rows)?;
            self.cache.set(&hash, &value, None).await?;
        }

        Ok(rows)
    }

    /// Explain via the engine's plan facility. Never cached; failures are
    /// folded into the returned text since an explanation is advisory.
    pub async fn explain(&self, query: &str) -> String {
        match self.engine.query(&format!("EXPLAIN {query}")).await {
            Ok(rows) => rows
                .first()
                .and_then(|row| row.values().next())
                .and_then(|v| v.as_str().map(String::from))
                .unwrap_or_else(|| "No explanation available.".to_string()),
            Err(e) => format!("Failed to explain query: {e}"),
        }
    }
}
