//! Durable job queue.
//!
//! Submissions persist a pending job and nudge the worker; the worker loop
//! is single-flight (overlapping triggers collapse into one pass) and drains
//! pending work by priority, then submission order. Each job maps to exactly
//! one intent executed through the runtime. Jobs found `running` at startup
//! were interrupted by a crash and are failed, never resumed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, bail};
use serde_json::{Map, Value, json};
use tracing::{error, info, warn};

use crate::core::events::{EventBus, EventKind};
use crate::core::planner::Intent;
use crate::core::runtime::AgentRuntime;
use crate::core::store::KernelStore;
use crate::core::store::types::{JobRecord, JobStatus, JobType};

pub struct JobQueue {
    store: Arc<KernelStore>,
    runtime: Arc<AgentRuntime>,
    bus: Arc<EventBus>,
    processing: AtomicBool,
}

impl JobQueue {
    /// Construct the queue and run the restart sweep.
    pub async fn new(
        store: Arc<KernelStore>,
        runtime: Arc<AgentRuntime>,
        bus: Arc<EventBus>,
    ) -> Result<Arc<Self>> {
        let swept = store.fail_running_jobs("System restart detected").await?;
        if swept > 0 {
            warn!("Failed {swept} jobs left running by a previous process");
        }
        Ok(Arc::new(Self {
            store,
            runtime,
            bus,
            processing: AtomicBool::new(false),
        }))
    }

    /// Persist a pending job and trigger the worker. Returns the job id
    /// immediately; callers poll [`JobQueue::get_job`] for completion.
    pub async fn submit_job(
        self: &Arc<Self>,
        project_id: i64,
        job_type: JobType,
        payload: Value,
    ) -> Result<i64> {
        let job = self.store.create_job(project_id, job_type, &payload, 0).await?;
        self.bus
            .publish(
                EventKind::JobCreated,
                json!({ "id": job.id, "type": job_type.as_str() }),
                "job_queue",
            )
            .await;

        let queue = Arc::clone(self);
        tokio::spawn(async move {
            queue.process_queue().await;
        });

        Ok(job.id)
    }

    pub async fn get_job(&self, id: i64) -> Result<Option<JobRecord>> {
        self.store.get_job(id).await
    }

    pub async fn list_jobs(&self, limit: usize) -> Result<Vec<JobRecord>> {
        self.store.list_jobs(limit).await
    }

    /// Report progress on a running job (0-100).
    pub async fn set_progress(&self, id: i64, progress: i64) -> Result<()> {
        self.store.set_job_progress(id, progress).await?;
        self.bus
            .publish(
                EventKind::JobProgress,
                json!({ "id": id, "progress": progress.clamp(0, 100) }),
                "job_queue",
            )
            .await;
        Ok(())
    }

    /// One worker pass. The atomic guard keeps this single-flight; the loop
    /// re-fetches after draining so work submitted mid-pass still runs.
    pub async fn process_queue(&self) {
        if self.processing.swap(true, Ordering::SeqCst) {
            return;
        }

        loop {
            let pending = match self.store.list_pending_jobs().await {
                Ok(pending) => pending,
                Err(e) => {
                    error!("Job queue scan failed: {e}");
                    break;
                }
            };
            if pending.is_empty() {
                break;
            }

            let mut bookkeeping_failed = false;
            for job in pending {
                if let Err(e) = self.run_job(&job).await {
                    // Status writes are failing; bail out rather than spin
                    // on a job that can never leave pending.
                    error!("Job {} bookkeeping failed: {e}", job.id);
                    bookkeeping_failed = true;
                    break;
                }
            }
            if bookkeeping_failed {
                break;
            }
        }

        self.processing.store(false, Ordering::SeqCst);

        // A submit that landed while the guard was dropping saw the flag set
        // and walked away; pick its work up now.
        match self.store.list_pending_jobs().await {
            Ok(pending) if !pending.is_empty() => Box::pin(self.process_queue()).await,
            _ => {}
        }
    }

    async fn run_job(&self, job: &JobRecord) -> Result<()> {
        self.store
            .update_job_status(job.id, JobStatus::Running, None, None)
            .await?;
        self.bus
            .publish(EventKind::JobStarted, json!({ "id": job.id }), "job_queue")
            .await;
        info!("Executing job {} ({})", job.id, job.job_type.as_str());

        match self.execute_job_logic(job).await {
            Ok(result) => {
                self.store
                    .update_job_status(job.id, JobStatus::Completed, Some(&result), None)
                    .await?;
                self.bus
                    .publish(
                        EventKind::JobCompleted,
                        json!({ "id": job.id, "result": result }),
                        "job_queue",
                    )
                    .await;
            }
            Err(e) => {
                warn!("Job {} failed: {e}", job.id);
                self.store
                    .update_job_status(job.id, JobStatus::Failed, None, Some(&e.to_string()))
                    .await?;
                self.bus
                    .publish(
                        EventKind::JobFailed,
                        json!({ "id": job.id, "error": e.to_string() }),
                        "job_queue",
                    )
                    .await;
            }
        }
        Ok(())
    }

    /// Each job type maps to exactly one intent.
    async fn execute_job_logic(&self, job: &JobRecord) -> Result<Value> {
        let payload = &job.payload;
        let str_of = |key: &str| payload.get(key).and_then(Value::as_str);

        let intent = match job.job_type {
            JobType::Ingest => build_intent(
                "data_engineer",
                "ingest_file",
                &[
                    ("path", json!(str_of("path"))),
                    ("tableName", json!(str_of("tableName").unwrap_or("uploaded_data"))),
                ],
                "Queued ingestion task",
            ),
            JobType::Clean => build_intent(
                "data_engineer",
                "clean_data",
                &[("tableName", json!(str_of("tableName")))],
                "Queued cleaning task",
            ),
            JobType::AiProfile => build_intent(
                "schema_agent",
                "detect_schema",
                &[("path", json!(str_of("path")))],
                "Queued profiling task",
            ),
            JobType::AiChat => build_intent(
                "analyst",
                "calculate_metric",
                &[("metricId", json!(str_of("message").unwrap_or("General Query")))],
                "Queued analysis task",
            ),
        };

        let result = self.runtime.execute_intent(&intent).await;
        if !result.success {
            if result.message.is_empty() {
                bail!("Agent execution failed");
            }
            bail!("{}", result.message);
        }
        Ok(result.data.unwrap_or(Value::Null))
    }
}

fn build_intent(agent_id: &str, intent: &str, params: &[(&str, Value)], reasoning: &str) -> Intent {
    let mut map = Map::new();
    for (key, value) in params {
        map.insert(key.to_string(), value.clone());
    }
    Intent {
        agent_id: agent_id.to_string(),
        intent: intent.to_string(),
        params: map,
        reasoning: reasoning.to_string(),
        confidence: 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::runtime::testing::test_kernel;
    use std::time::Duration;

    async fn queue_for(k: &crate::core::runtime::testing::TestKernel) -> Arc<JobQueue> {
        JobQueue::new(k.store.clone(), k.runtime.clone(), k.bus.clone())
            .await
            .unwrap()
    }

    async fn wait_terminal(queue: &JobQueue, id: i64) -> JobRecord {
        for _ in 0..100 {
            let job = queue.get_job(id).await.unwrap().unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never reached a terminal state");
    }

    #[tokio::test]
    async fn profile_job_runs_to_completion() {
        let k = test_kernel();
        k.vfs.mkdir("/home").await.unwrap();
        k.vfs
            .write_file("/home/d.csv", b"a,b\n1,2\n3,4\n")
            .await
            .unwrap();
        let queue = queue_for(&k).await;

        let id = queue
            .submit_job(0, JobType::AiProfile, json!({"path": "/home/d.csv"}))
            .await
            .unwrap();
        let job = wait_terminal(&queue, id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.result.unwrap()["rowCount"], 2);
    }

    #[tokio::test]
    async fn chat_job_with_unknown_metric_fails_cleanly() {
        let k = test_kernel();
        let queue = queue_for(&k).await;

        let id = queue
            .submit_job(0, JobType::AiChat, json!({"message": "what about churn"}))
            .await
            .unwrap();
        let job = wait_terminal(&queue, id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn one_failure_does_not_halt_the_pass() {
        let k = test_kernel();
        k.vfs.mkdir("/home").await.unwrap();
        k.vfs
            .write_file("/home/d.csv", b"a,b\n1,2\n")
            .await
            .unwrap();
        let queue = queue_for(&k).await;

        let bad = queue
            .submit_job(0, JobType::Clean, json!({"tableName": "missing"}))
            .await
            .unwrap();
        let good = queue
            .submit_job(0, JobType::Ingest, json!({"path": "/home/d.csv", "tableName": "t"}))
            .await
            .unwrap();

        let bad = wait_terminal(&queue, bad).await;
        let good = wait_terminal(&queue, good).await;
        assert_eq!(bad.status, JobStatus::Failed);
        assert_eq!(good.status, JobStatus::Completed);
        assert_eq!(good.result.unwrap()["rows"], 1);
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let k = test_kernel();
        k.vfs.mkdir("/home").await.unwrap();
        k.vfs
            .write_file("/home/d.csv", b"a,b\n1,2\n")
            .await
            .unwrap();
        let queue = queue_for(&k).await;

        let id = queue
            .submit_job(0, JobType::AiProfile, json!({"path": "/home/d.csv"}))
            .await
            .unwrap();
        wait_terminal(&queue, id).await;

        let kinds: Vec<EventKind> = k
            .bus
            .history(50)
            .into_iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    EventKind::JobCreated | EventKind::JobStarted | EventKind::JobCompleted
                )
            })
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![EventKind::JobCreated, EventKind::JobStarted, EventKind::JobCompleted]
        );
    }

    #[tokio::test]
    async fn restart_sweep_runs_at_construction() {
        let k = test_kernel();
        let job = k
            .store
            .create_job(0, JobType::Ingest, &json!({}), 0)
            .await
            .unwrap();
        k.store
            .update_job_status(job.id, JobStatus::Running, None, None)
            .await
            .unwrap();

        let queue = queue_for(&k).await;
        let job = queue.get_job(job.id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("restart"));
    }
}
