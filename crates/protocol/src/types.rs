use serde::{Deserialize, Serialize};

/// Lifecycle state of an upload session.
///
/// Transitions are monotonic: a session only moves forward, with `Failed`
/// reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    #[serde(rename = "created")]
    Created,
    #[serde(rename = "splitting")]
    Splitting,
    #[serde(rename = "uploading")]
    Uploading,
    #[serde(rename = "completing")]
    Completing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl SessionState {
    /// Ordinal used to enforce forward-only transitions.
    pub fn rank(self) -> u8 {
        match self {
            SessionState::Created => 0,
            SessionState::Splitting => 1,
            SessionState::Uploading => 2,
            SessionState::Completing => 3,
            SessionState::Completed => 4,
            SessionState::Failed => 5,
        }
    }

    /// Returns `true` once the session can no longer make progress.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

/// Per-chunk transfer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "in_flight")]
    InFlight,
    #[serde(rename = "acked")]
    Acked,
    #[serde(rename = "failed")]
    Failed,
}

/// Status of a remote post-processing job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "queued")]
    Queued,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A remote post-processing job, read-only to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingJob {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What the completion handshake produced: either a durable artifact
/// reference, or a job id to poll while the store assembles asynchronously.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Artifact(String),
    Job(String),
}

/// Snapshot of an upload session's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub session_id: String,
    pub state: SessionState,
    pub total_chunks: u32,
    pub acked_chunks: u32,
    /// Fraction of chunks acked, in `[0.0, 1.0]`. A session with zero
    /// chunks reports 1.0.
    pub percent: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}
