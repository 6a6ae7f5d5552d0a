use anyhow::{Result, anyhow};
use rusqlite::params;
use serde_json::Value;

use super::KernelStore;
use super::types::{JobRecord, JobStatus, JobType};
use crate::core::now_ms;

const JOB_COLUMNS: &str = "id, project_id, type, status, priority, progress, \
     payload_json, result_json, error, created_at, updated_at";

struct RawJob {
    id: i64,
    project_id: i64,
    job_type: String,
    status: String,
    priority: i64,
    progress: i64,
    payload_json: String,
    result_json: Option<String>,
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

fn read_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawJob> {
    Ok(RawJob {
        id: row.get(0)?,
        project_id: row.get(1)?,
        job_type: row.get(2)?,
        status: row.get(3)?,
        priority: row.get(4)?,
        progress: row.get(5)?,
        payload_json: row.get(6)?,
        result_json: row.get(7)?,
        error: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn to_record(raw: RawJob) -> Result<JobRecord> {
    let job_type = JobType::from_str(&raw.job_type)
        .ok_or_else(|| anyhow!("Unknown job type in store: {}", raw.job_type))?;
    let status = JobStatus::from_str(&raw.status)
        .ok_or_else(|| anyhow!("Unknown job status in store: {}", raw.status))?;
    let payload: Value = serde_json::from_str(&raw.payload_json)?;
    let result = raw
        .result_json
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?;
    Ok(JobRecord {
        id: raw.id,
        project_id: raw.project_id,
        job_type,
        status,
        priority: raw.priority,
        progress: raw.progress,
        payload,
        result,
        error: raw.error,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    })
}

impl KernelStore {
    pub async fn create_job(
        &self,
        project_id: i64,
        job_type: JobType,
        payload: &Value,
        priority: i64,
    ) -> Result<JobRecord> {
        let now = now_ms();
        let payload_json = serde_json::to_string(payload)?;
        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO jobs (project_id, type, status, priority, progress, payload_json, created_at, updated_at)
             VALUES (?1, ?2, 'pending', ?3, 0, ?4, ?5, ?5)",
            params![project_id, job_type.as_str(), priority, payload_json, now],
        )?;
        let id = db.last_insert_rowid();
        let raw = db.query_row(
            &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
            params![id],
            read_raw,
        )?;
        to_record(raw)
    }

    pub async fn get_job(&self, id: i64) -> Result<Option<JobRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1 LIMIT 1"))?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(to_record(read_raw(row)?)?)),
            None => Ok(None),
        }
    }

    /// Pending jobs in drain order: priority first, then submission order.
    pub async fn list_pending_jobs(&self) -> Result<Vec<JobRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status = 'pending'
             ORDER BY priority DESC, created_at ASC, id ASC"
        ))?;
        let raws = stmt.query_map([], read_raw)?;
        let mut out = Vec::new();
        for raw in raws {
            out.push(to_record(raw?)?);
        }
        Ok(out)
    }

    pub async fn list_jobs(&self, limit: usize) -> Result<Vec<JobRecord>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))?;
        let raws = stmt.query_map(params![limit as i64], read_raw)?;
        let mut out = Vec::new();
        for raw in raws {
            out.push(to_record(raw?)?);
        }
        Ok(out)
    }

    /// Move a job to `status`. Completion pins progress to 100.
    pub async fn update_job_status(
        &self,
        id: i64,
        status: JobStatus,
        result: Option<&Value>,
        error: Option<&str>,
    ) -> Result<bool> {
        let now = now_ms();
        let result_json = result.map(serde_json::to_string).transpose()?;
        let db = self.db.lock().await;
        let rows = if status == JobStatus::Completed {
            db.execute(
                "UPDATE jobs SET status = ?1, progress = 100,
                     result_json = COALESCE(?2, result_json),
                     error = COALESCE(?3, error),
                     updated_at = ?4
                 WHERE id = ?5",
                params![status.as_str(), result_json, error, now, id],
            )?
        } else {
            db.execute(
                "UPDATE jobs SET status = ?1,
                     result_json = COALESCE(?2, result_json),
                     error = COALESCE(?3, error),
                     updated_at = ?4
                 WHERE id = ?5",
                params![status.as_str(), result_json, error, now, id],
            )?
        };
        Ok(rows > 0)
    }

    pub async fn set_job_progress(&self, id: i64, progress: i64) -> Result<bool> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE jobs SET progress = ?1, updated_at = ?2 WHERE id = ?3",
            params![progress.clamp(0, 100), now_ms(), id],
        )?;
        Ok(rows > 0)
    }

    /// Restart sweep: any job still `running` was interrupted mid-flight and
    /// can never be resumed. Returns how many were swept.
    pub async fn fail_running_jobs(&self, error: &str) -> Result<usize> {
        let db = self.db.lock().await;
        let rows = db.execute(
            "UPDATE jobs SET status = 'failed', error = ?1, updated_at = ?2
             WHERE status = 'running'",
            params![error, now_ms()],
        )?;
        Ok(rows)
    }
}
