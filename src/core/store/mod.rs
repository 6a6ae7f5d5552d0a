//! Durable kernel store (SQLite).
//!
//! One connection backs everything the kernel must keep across restarts:
//! the job queue, the query cache, and the virtual file store nodes. The
//! per-concern CRUD lives in sibling files ([`jobs`], [`cache`], [`vfs`]);
//! this module owns the connection and the schema.

mod cache;
mod jobs;
mod vfs;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use rusqlite::Connection;
use tokio::sync::Mutex;
use tracing::info;

pub struct KernelStore {
    db: Arc<Mutex<Connection>>,
    workspace_dir: PathBuf,
}

impl KernelStore {
    pub fn open<P: AsRef<Path>>(workspace_dir: P) -> Result<Self> {
        let workspace_dir = workspace_dir.as_ref().to_path_buf();
        if !workspace_dir.exists() {
            std::fs::create_dir_all(&workspace_dir)?;
        }

        let db_path = workspace_dir.join("kernel.db");
        let db = Connection::open(&db_path)?;
        Self::create_schema(&db)?;
        info!("Kernel store ready at {}", db_path.display());

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            workspace_dir,
        })
    }

    fn create_schema(db: &Connection) -> Result<()> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL DEFAULT 0,
                type TEXT NOT NULL,
                status TEXT NOT NULL,
                priority INTEGER NOT NULL DEFAULT 0,
                progress INTEGER NOT NULL DEFAULT 0,
                payload_json TEXT NOT NULL,
                result_json TEXT,
                error TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_jobs_status_priority
             ON jobs(status, priority DESC, created_at ASC)",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS query_cache (
                hash TEXT PRIMARY KEY,
                result_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                hit_count INTEGER NOT NULL DEFAULT 0
            )",
            [],
        )?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS fs_nodes (
                path TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                parent_path TEXT NOT NULL,
                kind TEXT NOT NULL,
                size INTEGER NOT NULL DEFAULT 0,
                content BLOB,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;
        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_fs_nodes_parent ON fs_nodes(parent_path)",
            [],
        )?;

        Ok(())
    }

    pub fn workspace_dir(&self) -> &Path {
        &self.workspace_dir
    }
}

/// Create a store in a throwaway directory. Avoids cross-test interference.
#[cfg(test)]
pub(crate) fn test_store() -> KernelStore {
    let tmpdir = std::env::temp_dir().join(format!("datakernel-test-{}", uuid::Uuid::new_v4()));
    KernelStore::open(&tmpdir).expect("open test store")
}
