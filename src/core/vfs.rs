//! Virtual file store.
//!
//! A path-addressed blob store over the durable kernel store. Writes emit
//! file-created / file-updated events on the bus, which is what lets the
//! runtime react to new tabular files without the writer knowing about it.

use std::sync::Arc;

use anyhow::{Result, bail};
use serde_json::json;
use tracing::info;

use crate::core::events::{EventBus, EventKind};
use crate::core::store::KernelStore;
use crate::core::store::types::{FsNodeRecord, NodeKind};

pub struct VirtualFs {
    store: Arc<KernelStore>,
    bus: Arc<EventBus>,
}

fn clean_path(path: &str) -> &str {
    if path == "/" {
        path
    } else {
        path.trim_end_matches('/')
    }
}

fn parent_path(path: &str) -> String {
    if path == "/" {
        return "/".to_string();
    }
    match clean_path(path).rsplit_once('/') {
        Some(("", _)) => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
        None => "/".to_string(),
    }
}

fn node_name(path: &str) -> String {
    if path == "/" {
        return "root".to_string();
    }
    clean_path(path)
        .rsplit_once('/')
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| path.to_string())
}

impl VirtualFs {
    pub fn new(store: Arc<KernelStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    /// Seed the default directory tree on first boot.
    pub async fn bootstrap(&self) -> Result<()> {
        if self.exists("/home").await? {
            return Ok(());
        }
        for dir in ["/home", "/home/documents", "/home/downloads", "/system", "/system/logs"] {
            self.mkdir(dir).await?;
        }
        info!("VFS bootstrapped");
        Ok(())
    }

    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.store.fs_get(clean_path(path)).await?.is_some())
    }

    /// Create a directory, creating missing parents on the way down.
    pub async fn mkdir(&self, path: &str) -> Result<()> {
        let path = clean_path(path);
        if self.exists(path).await? {
            return Ok(());
        }

        let parent = parent_path(path);
        if parent != "/" && !self.exists(&parent).await? {
            Box::pin(self.mkdir(&parent)).await?;
        }

        self.store
            .fs_insert(path, &node_name(path), &parent, NodeKind::Directory, None)
            .await
    }

    /// Write a file under an existing directory. Publishes file-created for
    /// new paths and file-updated for overwrites.
    pub async fn write_file(&self, path: &str, content: &[u8]) -> Result<()> {
        let path = clean_path(path);
        let parent = parent_path(path);
        if !self.exists(&parent).await? {
            bail!("Parent directory {parent} does not exist");
        }

        let payload = json!({ "path": path, "size": content.len() });
        if self.store.fs_get(path).await?.is_some() {
            self.store.fs_update_file(path, content).await?;
            self.bus.publish(EventKind::FileUpdated, payload, "vfs").await;
        } else {
            self.store
                .fs_insert(path, &node_name(path), &parent, NodeKind::File, Some(content))
                .await?;
            self.bus.publish(EventKind::FileCreated, payload, "vfs").await;
        }
        Ok(())
    }

    pub async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let path = clean_path(path);
        let Some(node) = self.store.fs_get(path).await? else {
            bail!("File {path} not found");
        };
        if node.kind != NodeKind::File {
            bail!("{path} is not a file");
        }
        match self.store.fs_read_content(path).await? {
            Some(content) => Ok(content),
            None => bail!("{path} is not a file"),
        }
    }

    pub async fn list(&self, path: &str) -> Result<Vec<FsNodeRecord>> {
        self.store.fs_list(clean_path(path)).await
    }

    /// Delete a node; directories are emptied recursively first. Missing
    /// paths are a no-op.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let path = clean_path(path);
        let Some(node) = self.store.fs_get(path).await? else {
            return Ok(());
        };

        if node.kind == NodeKind::Directory {
            for child in self.list(path).await? {
                Box::pin(self.delete(&child.path)).await?;
            }
        }

        self.store.fs_delete(path).await?;
        self.bus
            .publish(EventKind::FileDeleted, json!({ "path": path }), "vfs")
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_store;

    fn vfs() -> VirtualFs {
        VirtualFs::new(Arc::new(test_store()), Arc::new(EventBus::new(100)))
    }

    #[test]
    fn path_helpers() {
        assert_eq!(parent_path("/home/documents/a.csv"), "/home/documents");
        assert_eq!(parent_path("/home"), "/");
        assert_eq!(parent_path("/"), "/");
        assert_eq!(node_name("/home/documents/a.csv"), "a.csv");
        assert_eq!(node_name("/"), "root");
        assert_eq!(clean_path("/home/"), "/home");
    }

    #[tokio::test]
    async fn mkdir_creates_missing_parents() {
        let fs = vfs();
        fs.mkdir("/a/b/c").await.unwrap();
        assert!(fs.exists("/a").await.unwrap());
        assert!(fs.exists("/a/b").await.unwrap());
        assert!(fs.exists("/a/b/c").await.unwrap());
    }

    #[tokio::test]
    async fn write_requires_existing_parent() {
        let fs = vfs();
        let err = fs.write_file("/nowhere/f.txt", b"x").await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[tokio::test]
    async fn write_read_roundtrip_and_events() {
        let fs = vfs();
        fs.mkdir("/home").await.unwrap();
        fs.write_file("/home/a.txt", b"hello").await.unwrap();
        assert_eq!(fs.read_file("/home/a.txt").await.unwrap(), b"hello");

        fs.write_file("/home/a.txt", b"hello again").await.unwrap();
        assert_eq!(fs.read_file("/home/a.txt").await.unwrap(), b"hello again");

        let kinds: Vec<EventKind> = fs.bus.history(10).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::FileCreated, EventKind::FileUpdated]);
    }

    #[tokio::test]
    async fn read_missing_file_fails() {
        let fs = vfs();
        let err = fs.read_file("/ghost.txt").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn reading_a_directory_fails() {
        let fs = vfs();
        fs.mkdir("/home").await.unwrap();
        let err = fs.read_file("/home").await.unwrap_err();
        assert!(err.to_string().contains("not a file"));
    }

    #[tokio::test]
    async fn delete_is_recursive() {
        let fs = vfs();
        fs.mkdir("/home/docs").await.unwrap();
        fs.write_file("/home/docs/a.txt", b"1").await.unwrap();
        fs.write_file("/home/docs/b.txt", b"2").await.unwrap();

        fs.delete("/home").await.unwrap();
        assert!(!fs.exists("/home").await.unwrap());
        assert!(!fs.exists("/home/docs").await.unwrap());
        assert!(!fs.exists("/home/docs/a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn bootstrap_is_idempotent() {
        let fs = vfs();
        fs.bootstrap().await.unwrap();
        fs.bootstrap().await.unwrap();
        assert!(fs.exists("/home/documents").await.unwrap());
        assert!(fs.exists("/system/logs").await.unwrap());
    }

    #[tokio::test]
    async fn list_returns_direct_children() {
        let fs = vfs();
        fs.mkdir("/home").await.unwrap();
        fs.write_file("/home/a.txt", b"1").await.unwrap();
        fs.mkdir("/home/sub").await.unwrap();
        fs.write_file("/home/sub/deep.txt", b"2").await.unwrap();

        let names: Vec<String> = fs
            .list("/home")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "sub"]);
    }
}
