//! Oracle-backed planning: the external language-model scheduler.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Plan, PlanStatus, Planner};
use crate::config::OracleConfig;
use crate::core::metrics::MetricCatalog;
use crate::core::registry::AgentRegistry;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

pub struct OraclePlanner {
    client: Client,
    endpoint: String,
    model: String,
    registry: Arc<AgentRegistry>,
    metrics: Arc<MetricCatalog>,
}

impl OraclePlanner {
    pub fn new(
        config: &OracleConfig,
        registry: Arc<AgentRegistry>,
        metrics: Arc<MetricCatalog>,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            registry,
            metrics,
        })
    }

    fn build_prompt(&self, question: &str) -> String {
        let agents = self
            .registry
            .list()
            .iter()
            .enumerate()
            .map(|(i, agent)| {
                let intents = agent
                    .capabilities
                    .iter()
                    .map(|c| format!("'{}'", c.intent))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}. \"{}\": can {}.", i + 1, agent.id, intents)
            })
            .collect::<Vec<_>>()
            .join("\n");
        let metric_ids = self
            .metrics
            .list()
            .iter()
            .map(|m| m.id.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            "Act as the kernel scheduler.\n\
             User input: \"{question}\"\n\n\
             Available agents:\n{agents}\n\
             Available metrics: [{metric_ids}]\n\n\
             Goal: convert the user input into a deterministic execution plan.\n\n\
             Rules:\n\
             - If the user asks for a known metric, use 'analyst' with 'calculate_metric'.\n\
             - If the user asks for raw data or custom grouping, use 'data_engineer' with SQL.\n\
             - SQL must be safe (SELECT only).\n\n\
             Return JSON:\n\
             {{\n\
               \"goal\": \"Explain the goal\",\n\
               \"steps\": [\n\
                 {{ \"agentId\": \"analyst\", \"intent\": \"calculate_metric\", \
             \"params\": {{ \"metricId\": \"total_revenue\" }}, \
             \"reasoning\": \"User asked for revenue\" }}\n\
               ],\n\
               \"status\": \"pending\"\n\
             }}"
        )
    }
}

#[async_trait]
impl Planner for OraclePlanner {
    async fn plan(&self, request: &str) -> Result<Plan> {
        let prompt = self.build_prompt(request);
        debug!("Consulting oracle for plan ({} chars)", prompt.len());

        let url = format!("{}/api/generate", self.endpoint);
        let res = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.model,
                prompt: &prompt,
                stream: false,
                format: "json",
            })
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(anyhow!(
                "Oracle API error: {}",
                res.text().await.unwrap_or_default()
            ));
        }

        let parsed: GenerateResponse = res.json().await?;
        let json_block = extract_json_block(&parsed.response)
            .ok_or_else(|| anyhow!("Oracle returned no JSON plan"))?;
        let mut plan: Plan = serde_json::from_str(json_block)?;
        plan.status = PlanStatus::Pending;
        Ok(plan)
    }
}

/// Extract a JSON block from model output. Tries a fenced ```json ... ```
/// block first, then raw JSON starting with `{` or `[`.
pub(crate) fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let content_start = start + 7;
        if let Some(end) = trimmed[content_start..].find("```") {
            let block = trimmed[content_start..content_start + end].trim();
            if !block.is_empty() {
                return Some(block);
            }
        }
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Some(trimmed);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::planner::Intent;

    #[test]
    fn extracts_fenced_json() {
        let text = "Here is the plan:\n```json\n{\"goal\": \"g\"}\n```\nDone.";
        assert_eq!(extract_json_block(text), Some("{\"goal\": \"g\"}"));
    }

    #[test]
    fn extracts_raw_json() {
        assert_eq!(extract_json_block("  {\"a\": 1}  "), Some("{\"a\": 1}"));
        assert_eq!(extract_json_block("[1, 2]"), Some("[1, 2]"));
    }

    #[test]
    fn prose_without_json_is_none() {
        assert_eq!(extract_json_block("no plan here"), None);
    }

    #[test]
    fn oracle_plan_json_deserializes() {
        let raw = r#"{
            "goal": "Calculate revenue",
            "steps": [
                { "agentId": "analyst", "intent": "calculate_metric",
                  "params": { "metricId": "total_revenue" },
                  "reasoning": "User asked for revenue" }
            ],
            "status": "pending"
        }"#;
        let plan: Plan = serde_json::from_str(extract_json_block(raw).unwrap()).unwrap();
        assert_eq!(plan.steps.len(), 1);
        let step: &Intent = &plan.steps[0];
        assert_eq!(step.agent_id, "analyst");
        assert_eq!(step.params["metricId"], "total_revenue");
    }

    #[test]
    fn prompt_lists_agents_and_metrics() {
        let planner = OraclePlanner::new(
            &crate::config::OracleConfig::default(),
            Arc::new(AgentRegistry::with_builtins()),
            Arc::new(MetricCatalog::with_defaults()),
        )
        .unwrap();
        let prompt = planner.build_prompt("show revenue");
        assert!(prompt.contains("\"data_engineer\""));
        assert!(prompt.contains("'detect_schema'"));
        assert!(prompt.contains("total_revenue"));
        assert!(prompt.contains("show revenue"));
    }
}
