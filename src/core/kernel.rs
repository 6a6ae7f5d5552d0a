//! Kernel wiring: every service is constructed explicitly and handed its
//! collaborators, so tests can substitute fakes (most usefully the compute
//! engine) without touching globals.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::KernelConfig;
use crate::core::cache::QueryCache;
use crate::core::engine::ComputeEngine;
use crate::core::events::EventBus;
use crate::core::jobs::JobQueue;
use crate::core::metrics::MetricCatalog;
use crate::core::planner::{OraclePlanner, Plan, PlanStatus, Planner, PlannerStack};
use crate::core::registry::AgentRegistry;
use crate::core::router::QueryRouter;
use crate::core::runtime::{AgentRuntime, ExecutionResult};
use crate::core::store::KernelStore;
use crate::core::vfs::VirtualFs;

pub struct Kernel {
    pub store: Arc<KernelStore>,
    pub bus: Arc<EventBus>,
    pub registry: Arc<AgentRegistry>,
    pub metrics: Arc<MetricCatalog>,
    pub vfs: Arc<VirtualFs>,
    pub cache: Arc<QueryCache>,
    pub router: Arc<QueryRouter>,
    pub runtime: Arc<AgentRuntime>,
    pub jobs: Arc<JobQueue>,
    pub planner: Arc<PlannerStack>,
}

impl Kernel {
    pub async fn boot(config: KernelConfig, engine: Arc<dyn ComputeEngine>) -> Result<Arc<Self>> {
        let store = Arc::new(KernelStore::open(&config.workspace_dir)?);
        let bus = Arc::new(EventBus::new(config.events.history_limit));
        let registry = Arc::new(AgentRegistry::with_builtins());
        let metrics = Arc::new(MetricCatalog::with_defaults());

        let vfs = Arc::new(VirtualFs::new(store.clone(), bus.clone()));
        vfs.bootstrap().await?;

        let cache = Arc::new(QueryCache::new(
            store.clone(),
            (config.cache.ttl_secs as i64) * 1000,
        ));
        let router = Arc::new(QueryRouter::new(engine.clone(), cache.clone()));

        let runtime = AgentRuntime::new(
            registry.clone(),
            engine,
            router.clone(),
            vfs.clone(),
            metrics.clone(),
            bus.clone(),
        );
        runtime.register_reactions();

        let jobs = JobQueue::new(store.clone(), runtime.clone(), bus.clone()).await?;

        let oracle = if config.oracle.enabled {
            Some(OraclePlanner::new(
                &config.oracle,
                registry.clone(),
                metrics.clone(),
            )?)
        } else {
            None
        };
        let planner = Arc::new(PlannerStack::new(oracle));

        info!(
            "Kernel ready (workspace: {})",
            config.workspace_dir.display()
        );

        Ok(Arc::new(Self {
            store,
            bus,
            registry,
            metrics,
            vfs,
            cache,
            router,
            runtime,
            jobs,
            planner,
        }))
    }

    pub async fn plan(&self, request: &str) -> Result<Plan> {
        self.planner.plan(request).await
    }

    /// Plan a request and drive the plan to completion. A plan the planner
    /// already marked failed (no matching route) is returned unexecuted.
    pub async fn run_request(&self, request: &str) -> Result<(Plan, Vec<ExecutionResult>)> {
        let mut plan = self.plan(request).await?;
        if plan.status == PlanStatus::Failed {
            return Ok((plan, Vec::new()));
        }
        let results = self.runtime.execute_plan(&mut plan).await;
        Ok((plan, results))
    }
}
