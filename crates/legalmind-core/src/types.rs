use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Upload tasks ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Uploading,
    Processing,
    Complete,
    Error,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

/// One queued upload, tracked from file selection to analysis completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTask {
    pub id: String,
    pub file_name: String,
    pub file_path: String,
    pub size: u64,
    /// 0–100, mirrored from the last job-status snapshot once processing.
    pub progress: u8,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub job_id: Option<String>,
    /// Last raw snapshot from the analysis service, for display.
    pub last_job_status: Option<JobStatus>,
}

// ── Job status (analysis service) ────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub document_id: String,
}

/// Read-only snapshot pulled on each poll tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobState,
    #[serde(default)]
    pub progress: u8,
    /// Human-readable stage label (e.g. "extracting text").
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Receipt returned by the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub job_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
}

// ── Documents ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDetail {
    pub id: String,
    pub file_name: String,
    /// 0–100 risk summary produced by the analysis service.
    #[serde(default)]
    pub risk_score: i64,
    #[serde(default)]
    pub risky_chunks: i64,
    #[serde(default)]
    pub total_chunks: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentPresence {
    pub exists: bool,
    #[serde(default)]
    pub message: String,
}

// ── Chat ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One transcript entry. Never mutated after creation; display-time
/// filtering and dedup operate on clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_report: bool,
}

impl ChatMessage {
    /// Dedup key: role plus the first 100 characters of content.
    pub fn dedup_key(&self) -> String {
        let prefix: String = self.content.chars().take(100).collect();
        format!("{}:{}", self.role.as_str(), prefix)
    }
}

/// The (role, content) subset that goes over the wire and into history
/// storage. Timestamps and ids are client-local and not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
}

impl From<&ChatMessage> for StoredMessage {
    fn from(m: &ChatMessage) -> Self {
        Self {
            role: m.role,
            content: m.content.clone(),
        }
    }
}

/// Reply from the document-scoped chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub response: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Reply from the general chatbot endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotReply {
    pub response: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub suggestions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatbotHealth {
    pub status: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub ready: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveReceipt {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub count: u64,
}

// ── Orchestrator events ──────────────────────────────────────────────────

/// Broadcast event emitted by the upload orchestrator as a job advances.
#[derive(Debug, Clone)]
pub enum AnalysisEvent {
    Progress {
        job_id: String,
        stage: String,
        /// Ordinal for the 4-step visual indicator, see [`stage_ordinal`].
        step: u8,
        progress: u8,
    },
    Completed {
        job_id: String,
        document_id: String,
    },
    Failed {
        job_id: String,
        message: String,
    },
}

impl AnalysisEvent {
    pub fn kind(&self) -> &str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn job_id(&self) -> &str {
        match self {
            Self::Progress { job_id, .. }
            | Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. } => job_id,
        }
    }
}

// ── Shared derivations ───────────────────────────────────────────────────

/// Opening phrase of the synthetic contract summary. History reads filter
/// any entry containing it, so a summary persisted by an older client can
/// never resurface as a real turn.
pub const SUMMARY_MARKER: &str = "I've reviewed your contract";

/// Risk-tier label shared by the chat summary and the dashboard stats.
/// Boundaries are deliberate: exactly 70 is medium's upper edge, exactly
/// 40 its lower edge.
pub fn risk_tier(score: i64) -> &'static str {
    if score > 70 {
        "high"
    } else if score >= 40 {
        "medium"
    } else {
        "low"
    }
}

/// Map the service's free-text stage label onto the 4-step indicator.
/// The backend emits human-readable strings, so this is a fixed table
/// rather than anything inferred from the progress percentage.
/// Unrecognized labels map to 0.
pub fn stage_ordinal(stage: &str) -> u8 {
    match stage.trim().to_lowercase().as_str() {
        "uploading" => 0,
        "extracting" => 1,
        "analyzing" => 2,
        "generating" => 3,
        "complete" => 4,
        _ => 0,
    }
}
