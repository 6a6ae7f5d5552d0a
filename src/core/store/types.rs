use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Ingest,
    Clean,
    AiProfile,
    AiChat,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Ingest => "ingest",
            JobType::Clean => "clean",
            JobType::AiProfile => "ai_profile",
            JobType::AiChat => "ai_chat",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "ingest" => Some(JobType::Ingest),
            "clean" => Some(JobType::Clean),
            "ai_profile" => Some(JobType::AiProfile),
            "ai_chat" => Some(JobType::AiChat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub id: i64,
    pub project_id: i64,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i64,
    pub progress: i64,
    pub payload: Value,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct CacheRecord {
    pub hash: String,
    pub result_json: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub hit_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Directory,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Directory => "directory",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "file" => Some(NodeKind::File),
            "directory" => Some(NodeKind::Directory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FsNodeRecord {
    pub path: String,
    pub name: String,
    pub parent_path: String,
    pub kind: NodeKind,
    pub size: i64,
    pub created_at: i64,
    pub updated_at: i64,
}
