use std::sync::Arc;

use tempfile::TempDir;

use datakernel::config::KernelConfig;
use datakernel::core::Kernel;
use datakernel::core::engine::StubEngine;

/// Boot a kernel over the stub engine in a throwaway workspace. The engine
/// handle is returned separately so tests can observe statement counts, and
/// the tempdir so the workspace outlives the test body.
pub async fn boot_kernel() -> (Arc<Kernel>, Arc<StubEngine>, TempDir) {
    let workspace = TempDir::new().expect("create workspace");
    let (kernel, engine) = boot_kernel_in(&workspace).await;
    (kernel, engine, workspace)
}

/// Boot (or re-boot) a kernel over an existing workspace directory.
pub async fn boot_kernel_in(workspace: &TempDir) -> (Arc<Kernel>, Arc<StubEngine>) {
    let config = KernelConfig {
        workspace_dir: workspace.path().to_path_buf(),
        ..KernelConfig::default()
    };
    let engine = Arc::new(StubEngine::new());
    let kernel = Kernel::boot(config, engine.clone())
        .await
        .expect("boot kernel");
    (kernel, engine)
}
