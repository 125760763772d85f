//! Drives chunk transport across a session under bounded parallelism.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use uplift_protocol::PutChunkRequest;
use uplift_transfer::{SpeedCalculator, UploadSession, checksum_bytes, range_for_index};

use crate::error::UploadError;
use crate::store::ChunkStore;
use crate::transport::ChunkTransport;
use crate::types::UploadEvent;

/// Dispatches chunks to the transport as a continuously-refilling worker
/// pool.
///
/// A semaphore with `max_parallel` permits throttles spawning: a task
/// cannot start without a permit and a finished chunk's permit immediately
/// admits the next index, so the in-flight cap is exact at every instant.
/// Dispatch ascends by index; acks may land in any order and are tracked
/// per index on the session.
pub struct UploadOrchestrator {
    transport: Arc<ChunkTransport>,
    max_parallel: usize,
    events_tx: mpsc::Sender<UploadEvent>,
    cancel: CancellationToken,
}

impl UploadOrchestrator {
    pub fn new(
        transport: Arc<ChunkTransport>,
        max_parallel: usize,
        events_tx: mpsc::Sender<UploadEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            transport,
            max_parallel: max_parallel.max(1),
            events_tx,
            cancel,
        }
    }

    /// Uploads the given chunk indices of `blob`, in ascending dispatch
    /// order, until all are acked or the first chunk exhausts its budget.
    ///
    /// On failure or cancellation, in-flight sends are interrupted and no
    /// further chunks are dispatched; already-acked chunks remain valid
    /// remotely, leaving the session resumable.
    pub async fn run(
        &self,
        store: Arc<dyn ChunkStore>,
        session: Arc<UploadSession>,
        blob: &[u8],
        indices: &[u32],
    ) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }

        let total_chunks = session.total_chunks();
        let chunk_size = session.chunk_size();
        let session_id = session.id();

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        // Trips on the first exhausted chunk; as a child token it also
        // trips when the caller cancels, interrupting in-flight sends.
        let abort = self.cancel.child_token();
        let speed = Arc::new(SpeedCalculator::new(None));
        // Serializes mark-acked + event emission so observed progress
        // percentages are monotonic even though acks land out of order.
        let emit_gate = Arc::new(tokio::sync::Mutex::new(()));
        let mut join_set: JoinSet<Result<(), UploadError>> = JoinSet::new();

        debug!(
            session = %session_id,
            chunks = indices.len(),
            max_parallel = self.max_parallel,
            "dispatching chunks"
        );

        for &index in indices {
            let permit = tokio::select! {
                // Biased so an abort that raced a freed permit always
                // stops dispatch.
                biased;
                _ = abort.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    match permit {
                        Ok(p) => p,
                        Err(_) => break,
                    }
                }
            };

            // Slice after acquiring the permit: at most max_parallel chunk
            // copies are alive at once.
            let range = range_for_index(blob.len(), chunk_size, index)?;
            let data = blob[range.start..range.end].to_vec();
            let req = PutChunkRequest {
                session_id: session_id.clone(),
                index,
                total_chunks,
                checksum: checksum_bytes(&data),
                data,
            };
            session.mark_in_flight(index);

            let transport = Arc::clone(&self.transport);
            let store = Arc::clone(&store);
            let session = Arc::clone(&session);
            let abort_task = abort.clone();
            let events_tx = self.events_tx.clone();
            let speed = Arc::clone(&speed);
            let emit_gate = Arc::clone(&emit_gate);

            join_set.spawn(async move {
                let _permit = permit;
                let chunk_len = req.data.len();

                let result = tokio::select! {
                    // Biased so a send that finished just as the abort
                    // fired is still recorded as acked.
                    biased;
                    r = transport.send(store.as_ref(), &req) => r,
                    // Dispatch was aborted while this send was in flight;
                    // the chunk simply stays un-acked.
                    _ = abort_task.cancelled() => return Ok(()),
                };

                match result {
                    Ok(attempts) => {
                        speed.add_sample(chunk_len);
                        let _gate = emit_gate.lock().await;
                        session.mark_acked(req.index, attempts);
                        let p = session.progress();
                        let event = UploadEvent::Progress {
                            session_id: p.session_id,
                            state: p.state,
                            percent: p.percent,
                            acked_chunks: p.acked_chunks,
                            total_chunks: p.total_chunks,
                            bytes_per_second: speed.bytes_per_second(),
                            status: format!(
                                "Uploaded chunk {} of {}",
                                p.acked_chunks, p.total_chunks
                            ),
                        };
                        if events_tx.try_send(event).is_err() {
                            debug!(index = req.index, "progress event dropped");
                        }
                        Ok(())
                    }
                    Err(e) => {
                        if let UploadError::ChunkUploadFailed {
                            index, attempts, ..
                        } = &e
                        {
                            session.mark_failed(*index, *attempts);
                        }
                        warn!(session = %session.id(), error = %e, "aborting dispatch");
                        abort_task.cancel();
                        Err(e)
                    }
                }
            });
        }

        let mut first_error: Option<UploadError> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(UploadError::Internal(format!(
                            "chunk task join error: {e}"
                        )));
                    }
                }
            }
        }

        if self.cancel.is_cancelled() {
            return Err(UploadError::Cancelled);
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        Ok(())
    }
}
