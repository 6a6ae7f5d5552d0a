//! Schema detection agent: header-based column discovery over raw files.

use anyhow::{Result, anyhow, bail};
use serde_json::{Value, json};

use super::{AgentRuntime, str_param};
use crate::core::planner::Intent;

pub(super) async fn execute(rt: &AgentRuntime, intent: &Intent) -> Result<Value> {
    match intent.intent.as_str() {
        "detect_schema" => detect_schema(rt, intent).await,
        other => bail!("Unknown intent '{other}' for agent 'schema_agent'"),
    }
}

async fn detect_schema(rt: &AgentRuntime, intent: &Intent) -> Result<Value> {
    let path = str_param(intent, "path")?;

    let bytes = rt.vfs.read_file(path).await?;
    let content = String::from_utf8(bytes)
        .map_err(|_| anyhow!("Binary content analysis is not supported"))?;

    let lines: Vec<&str> = content.lines().collect();
    if lines.is_empty() {
        return Ok(json!({ "file": path, "columns": [], "schema": [], "rowCount": 0 }));
    }

    let columns: Vec<String> = lines[0].split(',').map(|h| h.trim().to_string()).collect();

    // Types are sampled from the first data row only; a column that changes
    // type further down is mis-classified.
    let types: Vec<&'static str> = if lines.len() > 1 {
        lines[1].split(',').map(|v| infer_type(v.trim())).collect()
    } else {
        columns.iter().map(|_| "STRING").collect()
    };

    let schema: Vec<Value> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            json!({
                "name": name,
                "type": types.get(i).copied().unwrap_or("STRING"),
            })
        })
        .collect();

    Ok(json!({
        "file": path,
        "columns": columns,
        "schema": schema,
        "rowCount": lines.len().saturating_sub(1),
    }))
}

fn infer_type(value: &str) -> &'static str {
    if value.parse::<f64>().is_ok() {
        "NUMBER"
    } else if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        "BOOLEAN"
    } else {
        "STRING"
    }
}
