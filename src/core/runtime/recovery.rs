//! Failure recovery: rewrite recognizable engine failures into guidance the
//! caller can act on. Anything unrecognized propagates unchanged.

use anyhow::anyhow;
use serde_json::Value;
use tracing::warn;

use crate::core::planner::Intent;

pub(super) fn rewrite_failure(intent: &Intent, error: anyhow::Error) -> anyhow::Error {
    let message = error.to_string();

    // Engine phrasing for a query against a table that was never created.
    if message.contains("Table with name") && message.contains("does not exist") {
        let table = intent
            .params
            .get("table")
            .or_else(|| intent.params.get("tableName"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        warn!(
            "Agent [{}] hit a missing-table failure, rewriting",
            intent.agent_id
        );
        return anyhow!("The table '{table}' doesn't exist. Try ingesting a file first?");
    }

    error
}
