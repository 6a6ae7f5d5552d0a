use anyhow::{Result, anyhow};
use rusqlite::params;

use super::KernelStore;
use super::types::{FsNodeRecord, NodeKind};
use crate::core::now_ms;

const NODE_COLUMNS: &str = "path, name, parent_path, kind, size, created_at, updated_at";

struct RawNode {
    path: String,
    name: String,
    parent_path: String,
    kind: String,
    size: i64,
    created_at: i64,
    updated_at: i64,
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawNode> {
    Ok(RawNode {
        path: row.get(0)?,
        name: row.get(1)?,
        parent_path: row.get(2)?,
        kind: row.get(3)?,
        size: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn to_record(raw: RawNode) -> Result<FsNodeRecord> {
    let kind = NodeKind::from_str(&raw.kind)
        .ok_or_else(|| anyhow!("Unknown fs node kind in store: {}", raw.kind))?;
    Ok(FsNodeRecord {
        path: raw.path,
        name: raw.name,
        parent_path: raw.parent_path,
        kind,
        size: raw.size,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    })
}

impl KernelStore {
    pub async fn fs_get(&self, path: &str) -> Result<Option<FsNodeRecord>> {
        let db = self.db.lock().await;
        let mut stmt =
            db.prepare(&format!("SELECT {NODE_COLUMNS} FROM fs_nodes WHERE path = ?1 LIMIT 1"))?;
        let mut rows = stmt.query(params![path])?;
        match rows.next()? {
            Some(row) => Ok(Some(to_record(read_raw(row)?)?)),
            None => Ok(None),
        }
    }

    pub async fn fs_read_content(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare("SELECT content FROM fs_nodes WHERE path = ?1 LIMIT 1")?;
        let mut rows = stmt.query(params![path])?;
        match rows.next()? {
            Some(row) => Ok(row.get::<_, Option<Vec<u8>>>(0)?),
            None => Ok(None),
        }
    }

    pub async fn fs_insert(
        &self,
        path: &str,
        name: &str,
        parent_path: &str,
        kind: NodeKind,
        content: Option<&[u8]>,
    ) -> Result<()> {
        let now = now_ms();
        let size = content.map(|c| c.len() as i64).unwrap_or(0);
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO fs_nodes (path, name, parent_path, kind, size, content, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            params![path, name, parent_path, kind.as_str(), size, content, now],
        )?;
        Ok(())
    }

    pub async fn fs_update_file(&self, path: &str, content: &[u8]) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE fs_nodes SET content = ?1, size = ?2, updated_at = ?3 WHERE path = ?4",
            params![content, content.len() as i64, now_ms(), path],
        )?;
        Ok(rows > 0)
    }

    pub async fn fs_list(&self, parent_path: &str) -> Result<Vec<FsNodeRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM fs_nodes WHERE parent_path = ?1 ORDER BY path ASC"
        ))?;
        let raws = stmt.query_map(params![parent_path], read_raw)?;
        let mut out = Vec::new();
        for raw in raws {
            out.push(to_record(raw?)?);
        }
        Ok(out)
    }

    pub async fn fs_delete(&self, path: &str) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute("DELETE FROM fs_nodes WHERE path = ?1", params![path])?;
        Ok(rows > 0)
    }
}
