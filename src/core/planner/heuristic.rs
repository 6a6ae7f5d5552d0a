//! Deterministic keyword planning, used whenever the oracle is unreachable.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{Intent, Plan, PlanStatus, Planner};

pub struct HeuristicPlanner;

fn metric_step(metric_id: &str, keyword: &str) -> Intent {
    let mut params = Map::new();
    params.insert("metricId".to_string(), json!(metric_id));
    Intent {
        agent_id: "analyst".to_string(),
        intent: "calculate_metric".to_string(),
        params,
        reasoning: format!("Keyword match: {keyword}"),
        confidence: 0.9,
    }
}

#[async_trait]
impl Planner for HeuristicPlanner {
    async fn plan(&self, request: &str) -> Result<Plan> {
        let lower = request.to_lowercase();
        let mut steps = Vec::new();

        if lower.contains("revenue") {
            steps.push(metric_step("total_revenue", "revenue"));
        } else if lower.contains("satisfaction") {
            steps.push(metric_step("avg_satisfaction", "satisfaction"));
        } else if lower.contains("volume") || lower.contains("units") {
            steps.push(metric_step("sales_volume", "volume"));
        }

        if !steps.is_empty() {
            return Ok(Plan {
                id: format!("heuristic_{}", uuid::Uuid::new_v4()),
                goal: "Heuristic execution plan".to_string(),
                steps,
                status: PlanStatus::Pending,
            });
        }

        Ok(Plan {
            id: "fallback_plan".to_string(),
            goal: "Fallback execution: no matching keywords found".to_string(),
            steps: Vec::new(),
            status: PlanStatus::Failed,
        })
    }
}

/// Single-intent classifier for simpler routing needs: maps one message to
/// one intent instead of a full plan.
pub fn parse_intent(message: &str) -> Intent {
    let msg = message.to_lowercase();

    // SQL-looking input goes straight to the engine.
    if msg.starts_with("/sql") || msg.contains("select ") || msg.contains("create table") {
        let mut params = Map::new();
        let query = message.strip_prefix("/sql").unwrap_or(message).trim();
        params.insert("query".to_string(), json!(query));
        return Intent {
            agent_id: "data_engineer".to_string(),
            intent: "run_sql".to_string(),
            params,
            reasoning: "Detected SQL keywords".to_string(),
            confidence: 0.9,
        };
    }

    if msg.contains("ingest") || msg.contains("load file") {
        let parts: Vec<&str> = message.split_whitespace().collect();
        let path = parts
            .iter()
            .find(|p| p.contains('/') || p.contains(".csv"))
            .copied()
            .unwrap_or("");
        let table_name = parts.last().copied().unwrap_or("");
        let mut params = Map::new();
        params.insert("path".to_string(), json!(path));
        params.insert("tableName".to_string(), json!(table_name));
        return Intent {
            agent_id: "data_engineer".to_string(),
            intent: "ingest_file".to_string(),
            params,
            reasoning: "Detected ingestion intent".to_string(),
            confidence: 0.8,
        };
    }

    if msg.contains("schema") || msg.contains("structure") || msg.contains("columns") {
        if let Some(path) = message.split_whitespace().find(|p| p.contains(".csv")) {
            let mut params = Map::new();
            params.insert("path".to_string(), json!(path));
            return Intent {
                agent_id: "schema_agent".to_string(),
                intent: "detect_schema".to_string(),
                params,
                reasoning: "Detected schema request for file".to_string(),
                confidence: 0.9,
            };
        }
        let table = message
            .split_whitespace()
            .find(|p| !p.to_lowercase().contains("schema"))
            .unwrap_or("main");
        let mut params = Map::new();
        params.insert("table".to_string(), json!(table));
        return Intent {
            agent_id: "data_engineer".to_string(),
            intent: "get_schema".to_string(),
            params,
            reasoning: "Detected schema request for table".to_string(),
            confidence: 0.8,
        };
    }

    if msg.contains("trend") || msg.contains("analyze") || msg.contains("chart") {
        let metric_id = msg
            .split_whitespace()
            .find(|w| !["analyze", "trend", "show", "me", "the"].contains(w))
            .unwrap_or("data");
        let mut params = Map::new();
        params.insert("metricId".to_string(), json!(metric_id));
        return Intent {
            agent_id: "analyst".to_string(),
            intent: "analyze_trend".to_string(),
            params,
            reasoning: "Detected analysis request".to_string(),
            confidence: 0.85,
        };
    }

    // Default: treat the whole message as a metric lookup.
    let mut params = Map::new();
    params.insert("metricId".to_string(), json!(message));
    Intent {
        agent_id: "analyst".to_string(),
        intent: "calculate_metric".to_string(),
        params,
        reasoning: "Fallback to general chat".to_string(),
        confidence: 0.5,
    }
}
