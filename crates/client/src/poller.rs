//! Bounded polling for an async post-processing job.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use uplift_protocol::{JobStatus, ProcessingJob};
use uplift_transfer::RetryPolicy;

use crate::error::UploadError;
use crate::store::{ChunkStore, StoreError};

/// Polls a job at a fixed interval up to a max wait budget.
///
/// Terminal states stop polling; exceeding the budget raises
/// `PollTimeout`. Transient store errors during a tick are tolerated and
/// consume budget like any other tick. Cancellable at every wait point.
pub struct JobPoller {
    interval: Duration,
    max_wait: Duration,
}

impl JobPoller {
    pub fn new(interval: Duration, max_wait: Duration) -> Self {
        Self { interval, max_wait }
    }

    /// Polls until the job finishes, the budget runs out, or `cancel`
    /// fires. Status observations are reported on `events_tx` when given.
    pub async fn poll(
        &self,
        store: &dyn ChunkStore,
        job_id: &str,
        cancel: &CancellationToken,
        events_tx: Option<&mpsc::Sender<crate::types::UploadEvent>>,
    ) -> Result<ProcessingJob, UploadError> {
        // The same policy value the transport retries with; factor 1.0
        // makes it a constant interval.
        let policy = RetryPolicy::fixed(self.interval, 1);
        let deadline = tokio::time::Instant::now() + self.max_wait;
        let mut tick: u32 = 0;

        loop {
            tick += 1;
            match store.job_status(job_id).await {
                Ok(resp) => {
                    debug!(job = %job_id, status = ?resp.status, tick, "job polled");
                    if let Some(tx) = events_tx {
                        let _ = tx.try_send(crate::types::UploadEvent::JobUpdate {
                            job_id: job_id.to_string(),
                            status: resp.status,
                        });
                    }
                    match resp.status {
                        JobStatus::Completed => return Ok(resp.into_job(job_id)),
                        JobStatus::Failed => {
                            return Err(UploadError::JobFailed {
                                job_id: job_id.to_string(),
                                reason: resp
                                    .error
                                    .unwrap_or_else(|| "no reason reported".to_string()),
                            });
                        }
                        JobStatus::Queued | JobStatus::Processing => {}
                    }
                }
                Err(StoreError::NotFound(_)) => {
                    return Err(UploadError::JobNotFound(job_id.to_string()));
                }
                Err(e) if e.is_transient() => {
                    warn!(job = %job_id, error = %e, "job poll failed, will retry");
                }
                Err(e) => return Err(UploadError::Internal(e.to_string())),
            }

            let delay = policy.delay_for_attempt(tick);
            if tokio::time::Instant::now() + delay >= deadline {
                return Err(UploadError::PollTimeout {
                    job_id: job_id.to_string(),
                    waited_ms: self.max_wait.as_millis() as u64,
                });
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(UploadError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
