//! Caller-facing upload surface: compress → split → transfer → complete.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use uplift_media::MediaCompressor;
use uplift_protocol::{CompleteUploadRequest, CompletionOutcome, SessionState};
use uplift_transfer::UploadSession;

use crate::error::UploadError;
use crate::orchestrator::UploadOrchestrator;
use crate::poller::JobPoller;
use crate::resume::plan_resume;
use crate::store::{ChunkStore, StoreError};
use crate::transport::ChunkTransport;
use crate::types::{UploadEvent, UploadReceipt, UploaderConfig};

/// Drives complete uploads against a [`ChunkStore`].
///
/// Each call owns its session for the call's lifetime; an `Uploader` keeps
/// no cross-session mutable state, so many uploads can run concurrently on
/// clones of the same store. The only thing worth keeping across process
/// restarts is the session id from a failed upload — everything else needed
/// for resume lives in the store.
pub struct Uploader {
    store: Arc<dyn ChunkStore>,
    config: UploaderConfig,
    compressor: MediaCompressor,
    events_tx: mpsc::Sender<UploadEvent>,
    events_rx: Option<mpsc::Receiver<UploadEvent>>,
    cancel: CancellationToken,
}

impl Uploader {
    pub fn new(store: Arc<dyn ChunkStore>, config: UploaderConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(256);
        let compressor = MediaCompressor::new(config.compressor.clone());
        Self {
            store,
            config,
            compressor,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
        }
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UploadEvent>> {
        self.events_rx.take()
    }

    /// Token that aborts in-flight work when cancelled. The session stays
    /// resumable.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads a blob, returning the session id and the completion
    /// outcome.
    pub async fn upload(
        &self,
        file_name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<UploadReceipt, UploadError> {
        validate_names(file_name, mime_type)?;

        let media = self.compressor.compress(data, mime_type).await;
        let session_id = Uuid::new_v4().to_string();
        let session = Arc::new(
            UploadSession::new(
                &session_id,
                file_name,
                &media.mime_type,
                media.data.len(),
                self.config.chunk_size,
            )
            .map_err(|e| UploadError::InvalidInput(e.to_string()))?,
        );

        session.advance(SessionState::Splitting);
        self.emit_progress(&session, "Splitting file");
        debug!(
            session = %session_id,
            file = file_name,
            bytes = media.data.len(),
            chunks = session.total_chunks(),
            compressed = media.compressed,
            "upload session created"
        );

        let indices: Vec<u32> = (0..session.total_chunks()).collect();
        let outcome = self
            .run_to_completion(&session, &media.data, &indices)
            .await?;
        Ok(UploadReceipt {
            session_id,
            outcome,
        })
    }

    /// Reads a file from disk and uploads it, deriving the upload name
    /// from the path.
    pub async fn upload_path(
        &self,
        path: &Path,
        mime_type: &str,
    ) -> Result<UploadReceipt, UploadError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                UploadError::InvalidInput(format!(
                    "path has no usable file name: {}",
                    path.display()
                ))
            })?
            .to_string();
        let data = tokio::fs::read(path).await?;
        self.upload(&file_name, mime_type, data).await
    }

    /// Resumes an interrupted session: queries the store for what already
    /// arrived and uploads only the missing chunks.
    ///
    /// Compression is deterministic, so re-applying it to the same local
    /// blob re-derives chunk bytes identical to the original pass.
    pub async fn resume(
        &self,
        session_id: &str,
        file_name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<UploadReceipt, UploadError> {
        validate_names(file_name, mime_type)?;
        if session_id.is_empty() {
            return Err(UploadError::InvalidInput("empty session id".into()));
        }

        let media = self.compressor.compress(data, mime_type).await;

        let status = self
            .config
            .retry
            .run(StoreError::is_transient, |_| {
                self.store.session_status(session_id)
            })
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => UploadError::SessionNotFound(session_id.to_string()),
                other => UploadError::Internal(other.to_string()),
            })?;

        let plan = plan_resume(&status, media.data.len(), self.config.chunk_size)?;
        let session = Arc::new(
            UploadSession::new(
                session_id,
                file_name,
                &media.mime_type,
                media.data.len(),
                self.config.chunk_size,
            )
            .map_err(|e| UploadError::InvalidInput(e.to_string()))?,
        );
        session.advance(SessionState::Splitting);
        for &index in &plan.acked {
            session.mark_acked(index, 0);
        }
        self.emit_progress(&session, "Resuming upload");
        info!(
            session = %session_id,
            acked = plan.acked.len(),
            missing = plan.missing.len(),
            "resuming session"
        );

        let outcome = self
            .run_to_completion(&session, &media.data, &plan.missing)
            .await?;
        Ok(UploadReceipt {
            session_id: session_id.to_string(),
            outcome,
        })
    }

    /// Polls a post-processing job until it finishes, returning the
    /// artifact reference from its result.
    pub async fn poll_job(&self, job_id: &str) -> Result<String, UploadError> {
        let poller = JobPoller::new(self.config.poll_interval, self.config.poll_max_wait);
        let job = poller
            .poll(
                self.store.as_ref(),
                job_id,
                &self.cancel,
                Some(&self.events_tx),
            )
            .await?;
        job.result
            .ok_or_else(|| UploadError::Internal(format!("job {job_id} completed without a result")))
    }

    async fn run_to_completion(
        &self,
        session: &Arc<UploadSession>,
        blob: &[u8],
        indices: &[u32],
    ) -> Result<CompletionOutcome, UploadError> {
        match self.drive(session, blob, indices).await {
            Ok(outcome) => {
                session.advance(SessionState::Completed);
                self.emit_progress(session, "Upload complete");
                self.emit(UploadEvent::Completed {
                    session_id: session.id(),
                    outcome: outcome.clone(),
                });
                info!(session = %session.id(), "upload completed");
                Ok(outcome)
            }
            Err(e) => {
                let reason = e.to_string();
                session.fail(&reason);
                self.emit(UploadEvent::Failed {
                    session_id: session.id(),
                    error: reason,
                });
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        session: &Arc<UploadSession>,
        blob: &[u8],
        indices: &[u32],
    ) -> Result<CompletionOutcome, UploadError> {
        session.advance(SessionState::Uploading);
        if !indices.is_empty() {
            let transport = Arc::new(ChunkTransport::new(
                self.config.retry.clone(),
                self.config.chunk_timeout,
            ));
            let orchestrator = UploadOrchestrator::new(
                transport,
                self.config.max_parallel,
                self.events_tx.clone(),
                self.cancel.clone(),
            );
            orchestrator
                .run(
                    Arc::clone(&self.store),
                    Arc::clone(session),
                    blob,
                    indices,
                )
                .await?;
        }

        session.advance(SessionState::Completing);
        self.emit_progress(session, "Assembling");
        self.complete_session(session).await
    }

    async fn complete_session(
        &self,
        session: &Arc<UploadSession>,
    ) -> Result<CompletionOutcome, UploadError> {
        let req = CompleteUploadRequest {
            session_id: session.id(),
            file_name: session.file_name(),
            mime_type: session.mime_type(),
            total_chunks: session.total_chunks(),
        };

        let resp = self
            .config
            .retry
            .run(StoreError::is_transient, |_| self.store.complete(&req))
            .await
            .map_err(|e| match e {
                StoreError::Incomplete { acked, expected } => UploadError::IncompleteSession {
                    session_id: req.session_id.clone(),
                    acked,
                    expected,
                },
                StoreError::NotFound(id) => UploadError::SessionNotFound(id),
                other => UploadError::Internal(other.to_string()),
            })?;

        resp.outcome().ok_or_else(|| {
            UploadError::Internal("completion response named neither artifact nor job".into())
        })
    }

    fn emit_progress(&self, session: &UploadSession, status: &str) {
        let p = session.progress();
        self.emit(UploadEvent::Progress {
            session_id: p.session_id,
            state: p.state,
            percent: p.percent,
            acked_chunks: p.acked_chunks,
            total_chunks: p.total_chunks,
            bytes_per_second: 0.0,
            status: status.to_string(),
        });
    }

    fn emit(&self, event: UploadEvent) {
        if self.events_tx.try_send(event).is_err() {
            debug!("upload event dropped");
        }
    }
}

fn validate_names(file_name: &str, mime_type: &str) -> Result<(), UploadError> {
    if file_name.is_empty() {
        return Err(UploadError::InvalidInput("empty file name".into()));
    }
    if mime_type.is_empty() {
        return Err(UploadError::InvalidInput("empty MIME type".into()));
    }
    Ok(())
}
