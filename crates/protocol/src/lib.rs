//! Wire contract between the upload client and the remote chunk store.
//!
//! The store is an external collaborator: this crate only defines the
//! payload types that cross the boundary, plus the domain enums shared by
//! the rest of the workspace. Binary chunk data is base64-encoded in JSON.

pub mod messages;
pub mod types;

pub use messages::{
    CompleteUploadRequest, CompleteUploadResponse, JobStatusResponse, PutChunkRequest,
    PutChunkResponse, SessionStatusResponse,
};
pub use types::{ChunkStatus, CompletionOutcome, JobStatus, ProcessingJob, SessionState, UploadProgress};
