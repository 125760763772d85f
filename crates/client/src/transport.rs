//! Single-chunk transport: one send with timeout and bounded retry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use tracing::debug;
use uplift_protocol::PutChunkRequest;
use uplift_transfer::RetryPolicy;

use crate::error::UploadError;
use crate::store::{ChunkStore, StoreError};

/// Sends one chunk to the store, retrying transient failures.
///
/// Each attempt is bounded by `chunk_timeout`; a timed-out attempt counts
/// as transient. Non-transient failures (rejection, unknown session) fail
/// immediately without consuming further retry budget. The outcome is
/// acked or failed — never partial.
pub struct ChunkTransport {
    policy: RetryPolicy,
    chunk_timeout: Duration,
}

impl ChunkTransport {
    pub fn new(policy: RetryPolicy, chunk_timeout: Duration) -> Self {
        Self {
            policy,
            chunk_timeout,
        }
    }

    /// Delivers `req`, returning the number of attempts consumed on
    /// success.
    pub async fn send(
        &self,
        store: &dyn ChunkStore,
        req: &PutChunkRequest,
    ) -> Result<u32, UploadError> {
        let attempts_used = AtomicU32::new(0);

        let result = self
            .policy
            .run(StoreError::is_transient, |attempt| {
                attempts_used.store(attempt, Ordering::SeqCst);
                async move {
                    match tokio::time::timeout(self.chunk_timeout, store.put_chunk(req)).await {
                        Ok(Ok(resp)) if resp.accepted => Ok(()),
                        Ok(Ok(_)) => Err(StoreError::Rejected("chunk not accepted".into())),
                        Ok(Err(e)) => Err(e),
                        Err(_) => Err(StoreError::Transient(format!(
                            "chunk send timed out after {} ms",
                            self.chunk_timeout.as_millis()
                        ))),
                    }
                }
            })
            .await;

        let attempts = attempts_used.load(Ordering::SeqCst);
        match result {
            Ok(()) => {
                debug!(
                    session = %req.session_id,
                    index = req.index,
                    attempts,
                    "chunk acked"
                );
                Ok(attempts)
            }
            Err(e) => Err(UploadError::ChunkUploadFailed {
                session_id: req.session_id.clone(),
                index: req.index,
                attempts,
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockStore;
    use std::sync::Arc;

    fn request(index: u32) -> PutChunkRequest {
        let data = vec![7u8; 16];
        PutChunkRequest {
            session_id: "s1".into(),
            index,
            total_chunks: 4,
            checksum: uplift_transfer::checksum_bytes(&data),
            data,
        }
    }

    fn transport() -> ChunkTransport {
        ChunkTransport::new(
            RetryPolicy {
                initial_delay: Duration::from_millis(10),
                ..RetryPolicy::default()
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success() {
        let store = Arc::new(MockStore::new());
        let attempts = transport().send(store.as_ref(), &request(0)).await.unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(store.put_calls(), 1);
        assert_eq!(store.stored_indices("s1"), vec![0]);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_twice_then_acked() {
        let store = Arc::new(MockStore::new());
        store.script_put_failure(1, StoreError::Transient("503".into()));
        store.script_put_failure(1, StoreError::Transient("reset".into()));

        let attempts = transport().send(store.as_ref(), &request(1)).await.unwrap();
        assert_eq!(attempts, 3);
        assert_eq!(store.put_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exhaustion_fails_chunk() {
        let store = Arc::new(MockStore::new());
        store.fail_index_always(2);

        let err = transport()
            .send(store.as_ref(), &request(2))
            .await
            .unwrap_err();
        match err {
            UploadError::ChunkUploadFailed {
                index, attempts, ..
            } => {
                assert_eq!(index, 2);
                assert_eq!(attempts, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.put_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rejection_fails_without_retry() {
        let store = Arc::new(MockStore::new());
        store.script_put_failure(3, StoreError::Rejected("too large".into()));

        let err = transport()
            .send(store.as_ref(), &request(3))
            .await
            .unwrap_err();
        match err {
            UploadError::ChunkUploadFailed {
                session_id,
                index,
                attempts,
                reason,
            } => {
                assert_eq!(session_id, "s1");
                assert_eq!(index, 3);
                assert_eq!(attempts, 1);
                assert!(reason.contains("too large"));
            }
            other => panic!("unexpected error: {other}"),
        }
        // No retry budget consumed on a rejection.
        assert_eq!(store.put_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_store_times_out_and_retries() {
        let store = Arc::new(MockStore::new());
        store.set_put_delay(Duration::from_secs(60));

        let transport = ChunkTransport::new(
            RetryPolicy {
                max_attempts: 2,
                initial_delay: Duration::from_millis(10),
                ..RetryPolicy::default()
            },
            Duration::from_millis(100),
        );
        let err = transport
            .send(store.as_ref(), &request(0))
            .await
            .unwrap_err();
        match err {
            UploadError::ChunkUploadFailed {
                attempts, reason, ..
            } => {
                assert_eq!(attempts, 2);
                assert!(reason.contains("timed out"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
