//! Planning: free-form request -> ordered sequence of typed intents.
//!
//! Two planner implementations sit behind one trait. The oracle planner
//! consults the external language-model backend; the heuristic planner is a
//! deterministic keyword router. [`PlannerStack`] selects between them:
//! oracle first when configured, heuristic whenever the oracle is absent,
//! errors, or times out, so planning never blocks indefinitely and always
//! produces *a* plan.

mod heuristic;
mod oracle;

pub use heuristic::{HeuristicPlanner, parse_intent};
pub use oracle::OraclePlanner;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One step of a plan. Created by a planner, consumed read-only by the
/// runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub agent_id: String,
    pub intent: String,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::Executing => "executing",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
        }
    }
}

fn default_plan_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_status() -> PlanStatus {
    PlanStatus::Pending
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default = "default_plan_id")]
    pub id: String,
    pub goal: String,
    #[serde(default)]
    pub steps: Vec<Intent>,
    #[serde(default = "default_status")]
    pub status: PlanStatus,
}

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, request: &str) -> Result<Plan>;
}

/// Oracle-with-fallback planner selection.
pub struct PlannerStack {
    oracle: Option<OraclePlanner>,
    heuristic: HeuristicPlanner,
}

impl PlannerStack {
    pub fn new(oracle: Option<OraclePlanner>) -> Self {
        Self {
            oracle,
            heuristic: HeuristicPlanner,
        }
    }
}

#[async_trait]
impl Planner for PlannerStack {
    async fn plan(&self, request: &str) -> Result<Plan> {
        if let Some(oracle) = &self.oracle {
            match oracle.plan(request).await {
                Ok(plan) => return Ok(plan),
                Err(e) => {
                    warn!("Oracle planner unavailable, falling back to keyword routing: {e}");
                }
            }
        }
        self.heuristic.plan(request).await
    }
}
