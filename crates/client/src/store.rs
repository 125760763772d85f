//! Abstract connection to the remote chunk store.
//!
//! The store's internals (durability, replication, assembly) are not part
//! of this repository. The embedding application implements [`ChunkStore`]
//! on top of its actual transport; using a trait keeps the pipeline
//! decoupled from that transport and testable with mocks.

use std::future::Future;
use std::pin::Pin;

use uplift_protocol::{
    CompleteUploadRequest, CompleteUploadResponse, JobStatusResponse, PutChunkRequest,
    PutChunkResponse, SessionStatusResponse,
};

/// Failures reported by a [`ChunkStore`] implementation.
///
/// The split matters: only `Transient` is worth retrying — everything else
/// states a decision the store will keep making for the same request.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Network hiccup, 5xx, timeout inside the implementation — retryable.
    #[error("transient store error: {0}")]
    Transient(String),

    /// The referenced session or job does not exist remotely.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store refused the request (quota, validation, ...).
    #[error("rejected: {0}")]
    Rejected(String),

    /// Completion was attempted before every chunk arrived.
    #[error("session incomplete: {acked} of {expected} chunks received")]
    Incomplete { acked: u32, expected: u32 },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Remote chunk store contract.
///
/// Implementations should do any borrowing work (serializing the request)
/// synchronously and move owned data into the returned future, which is
/// tied to `&self`.
pub trait ChunkStore: Send + Sync {
    /// Delivers one chunk. An accepted chunk is durably received.
    fn put_chunk(
        &self,
        req: &PutChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PutChunkResponse, StoreError>> + Send + '_>>;

    /// Returns the acked-index set for a session — the source of truth
    /// for resume.
    fn session_status(
        &self,
        session_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<SessionStatusResponse, StoreError>> + Send + '_>>;

    /// Signals transfer-complete, triggering remote assembly. The store
    /// must validate its received count against `total_chunks`.
    fn complete(
        &self,
        req: &CompleteUploadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompleteUploadResponse, StoreError>> + Send + '_>>;

    /// Reads the status of an async post-processing job.
    fn job_status(
        &self,
        job_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatusResponse, StoreError>> + Send + '_>>;
}
