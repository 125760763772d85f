//! Upload pipeline error types.

/// Errors surfaced to callers of the upload pipeline.
///
/// Per-chunk transient failures are retried internally and never appear
/// here; what does appear carries enough context (session id, failing
/// index) to drive a resume.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] uplift_transfer::TransferError),

    /// A chunk exhausted its retry budget (or failed non-retryably). The
    /// session is left resumable; already-acked chunks remain valid
    /// remotely.
    #[error("session {session_id}: chunk {index} failed after {attempts} attempt(s): {reason}")]
    ChunkUploadFailed {
        session_id: String,
        index: u32,
        attempts: u32,
        reason: String,
    },

    /// The store's received-chunk count disagreed with the session's
    /// expected total at completion.
    #[error("session {session_id} incomplete: {acked} of {expected} chunks received")]
    IncompleteSession {
        session_id: String,
        acked: u32,
        expected: u32,
    },

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("job {job_id} did not finish within {waited_ms} ms")]
    PollTimeout { job_id: String, waited_ms: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}
