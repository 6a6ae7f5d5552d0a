//! Thin CLI over the kernel. Runs against the in-process stub engine; a real
//! deployment embeds the library and supplies its own [`ComputeEngine`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use console::style;
use tracing::Level;

use crate::config::KernelConfig;
use crate::core::Kernel;
use crate::core::engine::{ComputeEngine, StubEngine};
use crate::core::store::types::JobType;
use crate::logging;

fn print_help() {
    println!("{}", style("datakernel: agent orchestration kernel").bold());
    println!();
    println!("  {}  Plan a request without executing it", style("plan <text>").green());
    println!("  {}   Plan and execute a request", style("run <text>").green());
    println!(
        "  {}  Submit an async job (ingest | clean | ai_profile | ai_chat)",
        style("submit <type> <json>").green()
    );
    println!("  {}      Show one job by id", style("job <id>").green());
    println!(
        "  {}  Write text into the virtual file store",
        style("write <path> <text>").green()
    );
    println!("  {}    List a virtual directory", style("ls <path>").green());
    println!("  {}       List registered agents", style("agents").green());
    println!("  {}       Show recent system events", style("events").green());
    println!();
    println!(
        " {} {} <command> [args]",
        style("Usage:").bold(),
        style("datakernel").green()
    );
}

async fn boot() -> Result<Arc<Kernel>> {
    let config = KernelConfig::load_or_default(Path::new("datakernel.toml"));
    let engine: Arc<dyn ComputeEngine> = Arc::new(StubEngine::new());
    Kernel::boot(config, engine).await
}

pub async fn run_main() -> Result<()> {
    logging::init(Level::INFO);
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("plan") => {
            let text = rest(&args, 2)?;
            let kernel = boot().await?;
            let plan = kernel.plan(&text).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Some("run") => {
            let text = rest(&args, 2)?;
            let kernel = boot().await?;
            let (plan, results) = kernel.run_request(&text).await?;

            println!("{} {}", style("Goal:").bold(), plan.goal);
            for (step, result) in plan.steps.iter().zip(&results) {
                let marker = if result.success {
                    style("ok").green()
                } else {
                    style("failed").red()
                };
                println!(
                    "  [{marker}] {}/{}: {}",
                    step.agent_id, step.intent, result.message
                );
                if let Some(data) = &result.data {
                    println!("       {}", serde_json::to_string(data)?);
                }
            }
            println!("{} {}", style("Status:").bold(), plan.status.as_str());
        }
        Some("submit") => {
            let type_arg = args
                .get(2)
                .ok_or_else(|| anyhow!("submit needs a job type"))?;
            let job_type = JobType::from_str(type_arg)
                .ok_or_else(|| anyhow!("Unknown job type: {type_arg}"))?;
            let payload = args
                .get(3)
                .map(|raw| serde_json::from_str(raw))
                .transpose()?
                .unwrap_or(serde_json::Value::Null);

            let kernel = boot().await?;
            let id = kernel.jobs.submit_job(0, job_type, payload).await?;
            println!("Submitted job {id}");

            // Poll until the job settles so the process doesn't exit with
            // the worker mid-flight.
            for _ in 0..300 {
                let job = kernel
                    .jobs
                    .get_job(id)
                    .await?
                    .ok_or_else(|| anyhow!("Job {id} vanished"))?;
                if job.status.is_terminal() {
                    println!("{}", serde_json::to_string_pretty(&job)?);
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            println!("Job {id} still running; check later with `datakernel job {id}`");
        }
        Some("job") => {
            let id: i64 = args
                .get(2)
                .ok_or_else(|| anyhow!("job needs an id"))?
                .parse()?;
            let kernel = boot().await?;
            match kernel.jobs.get_job(id).await? {
                Some(job) => println!("{}", serde_json::to_string_pretty(&job)?),
                None => println!("Job {id} not found"),
            }
        }
        Some("write") => {
            let path = args
                .get(2)
                .ok_or_else(|| anyhow!("write needs a path"))?
                .clone();
            let text = rest(&args, 3)?;
            let kernel = boot().await?;
            kernel.vfs.write_file(&path, text.as_bytes()).await?;
            println!("Wrote {} bytes to {path}", text.len());
        }
        Some("ls") => {
            let path = args.get(2).map(String::as_str).unwrap_or("/home");
            let kernel = boot().await?;
            for node in kernel.vfs.list(path).await? {
                println!("{:<9} {:>8}  {}", node.kind.as_str(), node.size, node.path);
            }
        }
        Some("agents") => {
            let kernel = boot().await?;
            for agent in kernel.registry.list() {
                println!(
                    "{} ({}): {}",
                    style(&agent.id).green(),
                    agent.role,
                    agent.description
                );
                for capability in &agent.capabilities {
                    println!("    {}: {}", capability.intent, capability.description);
                }
            }
        }
        Some("events") => {
            let kernel = boot().await?;
            for event in kernel.bus.history(50) {
                println!(
                    "{} [{}] {}",
                    event.timestamp_ms,
                    event.kind.as_str(),
                    event.payload
                );
            }
        }
        _ => print_help(),
    }

    Ok(())
}

fn rest(args: &[String], from: usize) -> Result<String> {
    if args.len() <= from {
        return Err(anyhow!("Missing request text"));
    }
    Ok(args[from..].join(" "))
}
