//! Agent runtime: executes intents against the built-in agents.
//!
//! This is the single seam where all intent-level failures are caught and
//! normalized; nothing above it needs to handle a raw engine or file-store
//! error. Dispatch is two-level: agent id resolves to a handler module, the
//! intent name resolves to a typed operation inside it. A recovery layer
//! rewrites recognizable engine failures into actionable guidance before
//! they surface.

mod analyst;
mod data_engineer;
mod recovery;
mod schema_agent;

use std::sync::{Arc, Mutex, Weak};

use anyhow::{Result, anyhow, bail};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::core::engine::ComputeEngine;
use crate::core::events::{EventBus, EventKind};
use crate::core::metrics::MetricCatalog;
use crate::core::now_ms;
use crate::core::planner::{Intent, Plan, PlanStatus};
use crate::core::registry::{AgentProfile, AgentRegistry};
use crate::core::router::QueryRouter;
use crate::core::vfs::VirtualFs;

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<String>>,
}

/// One entry of the append-only execution log, kept for replay/debugging.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub intent: Intent,
    pub result: ExecutionResult,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentKind {
    DataEngineer,
    SchemaAgent,
    Analyst,
}

impl AgentKind {
    fn from_id(id: &str) -> Option<Self> {
        match id {
            "data_engineer" => Some(AgentKind::DataEngineer),
            "schema_agent" => Some(AgentKind::SchemaAgent),
            "analyst" => Some(AgentKind::Analyst),
            _ => None,
        }
    }
}

pub struct AgentRuntime {
    registry: Arc<AgentRegistry>,
    engine: Arc<dyn ComputeEngine>,
    router: Arc<QueryRouter>,
    vfs: Arc<VirtualFs>,
    metrics: Arc<MetricCatalog>,
    bus: Arc<EventBus>,
    execution_log: Mutex<Vec<ExecutionRecord>>,
}

impl AgentRuntime {
    pub fn new(
        registry: Arc<AgentRegistry>,
        engine: Arc<dyn ComputeEngine>,
        router: Arc<QueryRouter>,
        vfs: Arc<VirtualFs>,
        metrics: Arc<MetricCatalog>,
        bus: Arc<EventBus>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            engine,
            router,
            vfs,
            metrics,
            bus,
            execution_log: Mutex::new(Vec::new()),
        })
    }

    /// Execute one intent. Never returns an error: every failure is folded
    /// into the result, and every execution is appended to the log.
    pub async fn execute_intent(&self, intent: &Intent) -> ExecutionResult {
        info!("Dispatching [{}] to [{}]", intent.intent, intent.agent_id);

        let result = match self.execute_inner(intent).await {
            Ok(data) => ExecutionResult {
                success: true,
                data: Some(data),
                message: format!("Successfully executed {}", intent.intent),
                artifacts: None,
            },
            Err(e) => {
                error!("Intent [{}] failed: {e}", intent.intent);
                ExecutionResult {
                    success: false,
                    data: None,
                    message: e.to_string(),
                    artifacts: None,
                }
            }
        };

        self.execution_log
            .lock()
            .expect("execution log")
            .push(ExecutionRecord {
                intent: intent.clone(),
                result: result.clone(),
                timestamp_ms: now_ms(),
            });

        result
    }

    async fn execute_inner(&self, intent: &Intent) -> Result<Value> {
        let agent = self
            .registry
            .get(&intent.agent_id)
            .ok_or_else(|| anyhow!("Unknown agent: {}", intent.agent_id))?;
        validate_params(&agent, intent)?;

        let kind = AgentKind::from_id(&agent.id)
            .ok_or_else(|| anyhow!("No handler implemented for agent: {}", agent.id))?;

        let outcome = match kind {
            AgentKind::DataEngineer => data_engineer::execute(self, intent).await,
            AgentKind::SchemaAgent => schema_agent::execute(self, intent).await,
            AgentKind::Analyst => analyst::execute(self, intent).await,
        };
        outcome.map_err(|e| recovery::rewrite_failure(intent, e))
    }

    /// Drive a plan to completion: strictly sequential, halting at the first
    /// failed step. The plan's status is updated in place.
    pub async fn execute_plan(&self, plan: &mut Plan) -> Vec<ExecutionResult> {
        plan.status = PlanStatus::Executing;
        let mut results = Vec::new();

        for step in &plan.steps {
            let result = self.execute_intent(step).await;
            let failed = !result.success;
            results.push(result);
            if failed {
                plan.status = PlanStatus::Failed;
                return results;
            }
        }

        plan.status = PlanStatus::Completed;
        results
    }

    pub fn execution_log(&self) -> Vec<ExecutionRecord> {
        self.execution_log.lock().expect("execution log").clone()
    }

    /// Wire the runtime's reactive hooks onto the bus. A new tabular file
    /// triggers schema detection and an agent message summarizing the
    /// columns; job failures are observed for the log.
    pub fn register_reactions(self: &Arc<Self>) {
        let weak: Weak<AgentRuntime> = Arc::downgrade(self);
        self.bus.subscribe(EventKind::FileCreated, move |event| {
            let weak = weak.clone();
            async move {
                let Some(runtime) = weak.upgrade() else {
                    return;
                };
                let Some(path) = event.payload.get("path").and_then(Value::as_str) else {
                    return;
                };
                if !path.ends_with(".csv") {
                    return;
                }
                runtime.auto_profile(path).await;
            }
        });

        self.bus.subscribe(EventKind::JobFailed, |event| async move {
            warn!("Kernel observed job failure: {}", event.payload);
            // Room for a cleanup agent; observing is enough for now.
        });
    }

    async fn auto_profile(&self, path: &str) {
        info!("Kernel detected new tabular file: {path}");

        let mut params = serde_json::Map::new();
        params.insert("path".to_string(), json!(path));
        let intent = Intent {
            agent_id: "schema_agent".to_string(),
            intent: "detect_schema".to_string(),
            params,
            reasoning: "Triggered by file-created event".to_string(),
            confidence: 1.0,
        };

        let result = self.execute_intent(&intent).await;
        if !result.success {
            debug!("Auto-profiling of {path} failed: {}", result.message);
            return;
        }

        let columns = result
            .data
            .as_ref()
            .and_then(|d| d.get("columns"))
            .and_then(Value::as_array)
            .map(|cols| {
                cols.iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();

        self.bus
            .publish(
                EventKind::AgentMessage,
                json!({
                    "agentId": "schema_agent",
                    "message": format!("I've analyzed {path}. Found columns: {columns}"),
                }),
                "kernel",
            )
            .await;
    }
}

/// Reject an intent whose declared required parameters are absent before it
/// reaches a handler. Value types are still the engine's problem.
fn validate_params(agent: &AgentProfile, intent: &Intent) -> Result<()> {
    let Some(capability) = agent.capabilities.iter().find(|c| c.intent == intent.intent) else {
        return Ok(()); // unknown intents keep their handler-level message
    };
    for param in &capability.parameters {
        if !param.required {
            continue;
        }
        match intent.params.get(&param.name) {
            None | Some(Value::Null) => bail!(
                "Missing required parameter '{}' for intent '{}'",
                param.name,
                intent.intent
            ),
            Some(_) => {}
        }
    }
    Ok(())
}

/// Fetch a required string parameter.
pub(crate) fn str_param<'a>(intent: &'a Intent, name: &str) -> Result<&'a str> {
    intent
        .params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing required parameter '{}' for intent '{}'", name, intent.intent))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::core::cache::{DEFAULT_TTL_MS, QueryCache};
    use crate::core::engine::StubEngine;
    use crate::core::store::{KernelStore, test_store};

    pub(crate) struct TestKernel {
        pub engine: Arc<StubEngine>,
        pub bus: Arc<EventBus>,
        pub vfs: Arc<VirtualFs>,
        pub runtime: Arc<AgentRuntime>,
        pub store: Arc<KernelStore>,
    }

    /// Fully wired runtime over the stub engine and a throwaway store.
    pub(crate) fn test_kernel() -> TestKernel {
        let store = Arc::new(test_store());
        let bus = Arc::new(EventBus::new(100));
        let engine = Arc::new(StubEngine::new());
        let registry = Arc::new(AgentRegistry::with_builtins());
        let metrics = Arc::new(MetricCatalog::with_defaults());
        let vfs = Arc::new(VirtualFs::new(store.clone(), bus.clone()));
        let cache = Arc::new(QueryCache::new(store.clone(), DEFAULT_TTL_MS));
        let router = Arc::new(QueryRouter::new(engine.clone(), cache));
        let runtime = AgentRuntime::new(
            registry,
            engine.clone(),
            router,
            vfs.clone(),
            metrics,
            bus.clone(),
        );
        runtime.register_reactions();
        TestKernel {
            engine,
            bus,
            vfs,
            runtime,
            store,
        }
    }

    pub(crate) fn intent(agent_id: &str, name: &str, params: Value) -> Intent {
        let params = match params {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Intent {
            agent_id: agent_id.to_string(),
            intent: name.to_string(),
            params,
            reasoning: "test".to_string(),
            confidence: 1.0,
        }
    }
}
