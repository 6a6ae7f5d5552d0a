//! Data engineering agent: SQL execution, ingestion, cleaning, schema reads.

use anyhow::{Result, anyhow, bail};
use regex::Regex;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::{AgentRuntime, str_param};
use crate::core::planner::Intent;

enum Op {
    RunSql,
    GetSchema,
    IngestFile,
    CleanData,
}

fn op_of(intent: &str) -> Option<Op> {
    match intent {
        "run_sql" => Some(Op::RunSql),
        "get_schema" => Some(Op::GetSchema),
        "ingest_file" => Some(Op::IngestFile),
        "clean_data" => Some(Op::CleanData),
        _ => None,
    }
}

pub(super) async fn execute(rt: &AgentRuntime, intent: &Intent) -> Result<Value> {
    let Some(op) = op_of(&intent.intent) else {
        bail!("Unknown intent '{}' for agent 'data_engineer'", intent.intent);
    };

    match op {
        Op::RunSql => {
            let query = str_param(intent, "query")?;
            let rows = rt.router.execute(query).await?;
            Ok(serde_json::to_value(rows)?)
        }
        Op::GetSchema => {
            let table = intent
                .params
                .get("table")
                .and_then(Value::as_str)
                .unwrap_or("main");
            let columns = rt.engine.describe(table).await?;
            Ok(serde_json::to_value(columns)?)
        }
        Op::IngestFile => ingest_file(rt, intent).await,
        Op::CleanData => clean_data(rt, intent).await,
    }
}

/// Collapse anything identifier-hostile into underscores.
fn sanitize_identifier(name: &str) -> String {
    Regex::new(r"[^A-Za-z0-9_]")
        .unwrap()
        .replace_all(name, "_")
        .into_owned()
}

/// Load a file from the VFS into an engine table, replacing any previous
/// table of the same name. Returns the table name and the verified row
/// count.
async fn ingest_file(rt: &AgentRuntime, intent: &Intent) -> Result<Value> {
    let path = str_param(intent, "path")?;
    let table = intent
        .params
        .get("tableName")
        .and_then(Value::as_str)
        .unwrap_or("uploaded_data");
    let table = sanitize_identifier(table);

    info!("Ingesting {path} into {table}");

    let bytes = rt.vfs.read_file(path).await?;
    let content = String::from_utf8(bytes)
        .map_err(|_| anyhow!("File {path} is not text; binary ingestion is not supported"))?;

    rt.engine.register_tabular_source(path, &content).await?;

    // Replace semantics: a leftover table of this name goes away first.
    if let Err(e) = rt
        .engine
        .query(&format!("DROP TABLE IF EXISTS {table}"))
        .await
    {
        debug!("Pre-ingest drop of {table}: {e}");
    }

    rt.engine
        .query(&format!(
            "CREATE TABLE {table} AS SELECT * FROM read_csv_auto('{path}')"
        ))
        .await
        .map_err(|e| anyhow!("Failed to ingest CSV: {e}"))?;

    let rows = rt
        .engine
        .query(&format!("SELECT COUNT(*) AS c FROM {table}"))
        .await?;
    let count = rows
        .first()
        .and_then(|row| row.values().next())
        .and_then(Value::as_i64)
        .unwrap_or(0);

    Ok(json!({ "table": table, "rows": count }))
}

/// Deduplicate a table via a distinct copy and a rename swap. Not atomic
/// without engine transactions; the window is accepted.
async fn clean_data(rt: &AgentRuntime, intent: &Intent) -> Result<Value> {
    let table = sanitize_identifier(str_param(intent, "tableName")?);

    rt.engine
        .query(&format!(
            "CREATE TABLE {table}_clean AS SELECT DISTINCT * FROM {table}"
        ))
        .await?;
    rt.engine.query(&format!("DROP TABLE {table}")).await?;
    rt.engine
        .query(&format!("ALTER TABLE {table}_clean RENAME TO {table}"))
        .await?;

    Ok(json!({ "table": table, "action": "deduplicated" }))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{intent, test_kernel};
    use super::*;
    use crate::core::engine::ComputeEngine;

    const CSV: &str = "region,sales,units\neast,100,5\nwest,200,7\neast,100,5\n";

    #[test]
    fn identifier_sanitization() {
        assert_eq!(sanitize_identifier("sales-2024 q1"), "sales_2024_q1");
        assert_eq!(sanitize_identifier("clean_name"), "clean_name");
        assert_eq!(sanitize_identifier("drop table;--"), "drop_table___");
    }

    #[tokio::test]
    async fn ingest_loads_and_verifies() {
        let k = test_kernel();
        k.vfs.mkdir("/home").await.unwrap();
        k.vfs
            .write_file("/home/sales.csv", CSV.as_bytes())
            .await
            .unwrap();

        let result = k
            .runtime
            .execute_intent(&intent(
                "data_engineer",
                "ingest_file",
                serde_json::json!({"path": "/home/sales.csv", "tableName": "sales"}),
            ))
            .await;
        assert!(result.success, "{}", result.message);
        let data = result.data.unwrap();
        assert_eq!(data["table"], "sales");
        assert_eq!(data["rows"], 3);
    }

    #[tokio::test]
    async fn ingest_missing_file_fails() {
        let k = test_kernel();
        let result = k
            .runtime
            .execute_intent(&intent(
                "data_engineer",
                "ingest_file",
                serde_json::json!({"path": "/home/ghost.csv", "tableName": "t"}),
            ))
            .await;
        assert!(!result.success);
        assert!(result.message.contains("not found"));
    }

    #[tokio::test]
    async fn ingest_twice_replaces_not_accumulates() {
        let k = test_kernel();
        k.vfs.mkdir("/home").await.unwrap();
        k.vfs
            .write_file("/home/sales.csv", CSV.as_bytes())
            .await
            .unwrap();

        let ingest = intent(
            "data_engineer",
            "ingest_file",
            serde_json::json!({"path": "/home/sales.csv", "tableName": "sales"}),
        );
        k.runtime.execute_intent(&ingest).await;
        let result = k.runtime.execute_intent(&ingest).await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["rows"], 3);
    }

    #[tokio::test]
    async fn clean_data_deduplicates_in_place() {
        let k = test_kernel();
        k.vfs.mkdir("/home").await.unwrap();
        k.vfs
            .write_file("/home/sales.csv", CSV.as_bytes())
            .await
            .unwrap();
        k.runtime
            .execute_intent(&intent(
                "data_engineer",
                "ingest_file",
                serde_json::json!({"path": "/home/sales.csv", "tableName": "sales"}),
            ))
            .await;

        let result = k
            .runtime
            .execute_intent(&intent(
                "data_engineer",
                "clean_data",
                serde_json::json!({"tableName": "sales"}),
            ))
            .await;
        assert!(result.success, "{}", result.message);
        assert_eq!(result.data.unwrap()["action"], "deduplicated");

        let rows = k
            .engine
            .query("SELECT COUNT(*) AS c FROM sales")
            .await
            .unwrap();
        assert_eq!(rows[0]["c"], Value::from(2));
    }

    #[tokio::test]
    async fn clean_missing_table_gets_recovery_guidance() {
        let k = test_kernel();
        let result = k
            .runtime
            .execute_intent(&intent(
                "data_engineer",
                "clean_data",
                serde_json::json!({"tableName": "nothere"}),
            ))
            .await;
        assert!(!result.success);
        assert_eq!(
            result.message,
            "The table 'nothere' doesn't exist. Try ingesting a file first?"
        );
    }

    #[tokio::test]
    async fn run_sql_returns_rows() {
        let k = test_kernel();
        k.vfs.mkdir("/home").await.unwrap();
        k.vfs
            .write_file("/home/sales.csv", CSV.as_bytes())
            .await
            .unwrap();
        k.runtime
            .execute_intent(&intent(
                "data_engineer",
                "ingest_file",
                serde_json::json!({"path": "/home/sales.csv", "tableName": "main"}),
            ))
            .await;

        let result = k
            .runtime
            .execute_intent(&intent(
                "data_engineer",
                "run_sql",
                serde_json::json!({"query": "SELECT COUNT(*) AS c FROM main"}),
            ))
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()[0]["c"], 3);
    }

    #[tokio::test]
    async fn get_schema_describes_table() {
        let k = test_kernel();
        k.vfs.mkdir("/home").await.unwrap();
        k.vfs
            .write_file("/home/sales.csv", CSV.as_bytes())
            .await
            .unwrap();
        k.runtime
            .execute_intent(&intent(
                "data_engineer",
                "ingest_file",
                serde_json::json!({"path": "/home/sales.csv", "tableName": "sales"}),
            ))
            .await;

        let result = k
            .runtime
            .execute_intent(&intent(
                "data_engineer",
                "get_schema",
                serde_json::json!({"table": "sales"}),
            ))
            .await;
        assert!(result.success);
        let columns = result.data.unwrap();
        assert_eq!(columns.as_array().unwrap().len(), 3);
        assert_eq!(columns[0]["column_name"], "region");
    }
}
