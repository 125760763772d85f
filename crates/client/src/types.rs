use std::time::Duration;

use uplift_media::CompressorConfig;
use uplift_protocol::{CompletionOutcome, JobStatus, SessionState};
use uplift_transfer::RetryPolicy;

/// Tuning for the upload pipeline.
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Fixed chunk size in bytes.
    pub chunk_size: usize,
    /// Cap on concurrent in-flight chunk sends per session.
    pub max_parallel: usize,
    /// Retry policy for chunk transport and the completion handshake.
    pub retry: RetryPolicy,
    /// Per-attempt bound on one chunk send.
    pub chunk_timeout: Duration,
    /// Interval between job status polls.
    pub poll_interval: Duration,
    /// Total wait budget for a post-processing job.
    pub poll_max_wait: Duration,
    /// Pre-compression tuning.
    pub compressor: CompressorConfig,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: uplift_transfer::DEFAULT_CHUNK_SIZE,
            max_parallel: uplift_transfer::DEFAULT_MAX_PARALLEL,
            retry: RetryPolicy::default(),
            chunk_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            poll_max_wait: Duration::from_secs(120),
            compressor: CompressorConfig::default(),
        }
    }
}

/// Progress and lifecycle events emitted by the pipeline.
///
/// Delivery is best-effort: events are dropped rather than ever blocking
/// a transfer on a slow consumer. Progress percentages are emitted in
/// monotonically non-decreasing order.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Progress {
        session_id: String,
        state: SessionState,
        /// Fraction of chunks acked, `[0.0, 1.0]`, monotonic.
        percent: f64,
        acked_chunks: u32,
        total_chunks: u32,
        /// Sliding-window transfer speed estimate; 0.0 while unknown.
        bytes_per_second: f64,
        status: String,
    },
    /// Status observed for a post-processing job while polling.
    JobUpdate { job_id: String, status: JobStatus },
    Completed {
        session_id: String,
        outcome: CompletionOutcome,
    },
    /// Terminal failure. The session id is preserved so the caller can
    /// resume.
    Failed { session_id: String, error: String },
}

/// What a finished upload hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    /// Keep this to resume an interrupted follow-up or re-query the store;
    /// the client retains no other state.
    pub session_id: String,
    pub outcome: CompletionOutcome,
}
