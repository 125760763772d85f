//! Scripted in-memory [`ChunkStore`] for tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use uplift_protocol::{
    CompleteUploadRequest, CompleteUploadResponse, JobStatusResponse, PutChunkRequest,
    PutChunkResponse, SessionStatusResponse,
};
use uplift_transfer::checksum_bytes;

use crate::store::{ChunkStore, StoreError};

/// In-memory chunk store with scripted failures and concurrency
/// instrumentation.
pub(crate) struct MockStore {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    put_calls: AtomicUsize,
    put_delay: Mutex<Duration>,
}

#[derive(Default)]
struct MockState {
    /// session -> index -> chunk bytes
    chunks: HashMap<String, BTreeMap<u32, Vec<u8>>>,
    /// session -> total_chunks as declared on put
    totals: HashMap<String, u32>,
    /// per-index failures consumed one per call
    scripted_put_failures: HashMap<u32, VecDeque<StoreError>>,
    /// indices that fail on every attempt
    fail_always: HashSet<u32>,
    complete_error: Option<StoreError>,
    complete_job: Option<String>,
    /// job -> scripted responses consumed one per poll
    jobs: HashMap<String, VecDeque<Result<JobStatusResponse, StoreError>>>,
    /// job -> response once the script is exhausted
    job_defaults: HashMap<String, JobStatusResponse>,
}

/// Decrements the in-flight gauge even if the send future is dropped by a
/// timeout.
struct InFlightGuard<'a>(&'a MockStore);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            put_calls: AtomicUsize::new(0),
            put_delay: Mutex::new(Duration::ZERO),
        }
    }

    pub fn script_put_failure(&self, index: u32, err: StoreError) {
        let mut st = self.state.lock().unwrap();
        st.scripted_put_failures
            .entry(index)
            .or_default()
            .push_back(err);
    }

    pub fn fail_index_always(&self, index: u32) {
        self.state.lock().unwrap().fail_always.insert(index);
    }

    pub fn clear_put_failures(&self) {
        let mut st = self.state.lock().unwrap();
        st.scripted_put_failures.clear();
        st.fail_always.clear();
    }

    pub fn set_put_delay(&self, delay: Duration) {
        *self.put_delay.lock().unwrap() = delay;
    }

    pub fn set_complete_error(&self, err: StoreError) {
        self.state.lock().unwrap().complete_error = Some(err);
    }

    pub fn set_complete_job(&self, job_id: &str) {
        self.state.lock().unwrap().complete_job = Some(job_id.to_string());
    }

    pub fn script_job(&self, job_id: &str, resp: JobStatusResponse) {
        let mut st = self.state.lock().unwrap();
        st.jobs
            .entry(job_id.to_string())
            .or_default()
            .push_back(Ok(resp));
    }

    pub fn script_job_error(&self, job_id: &str, err: StoreError) {
        let mut st = self.state.lock().unwrap();
        st.jobs
            .entry(job_id.to_string())
            .or_default()
            .push_back(Err(err));
    }

    pub fn set_job_default(&self, job_id: &str, resp: JobStatusResponse) {
        let mut st = self.state.lock().unwrap();
        st.job_defaults.insert(job_id.to_string(), resp);
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn stored_indices(&self, session_id: &str) -> Vec<u32> {
        let st = self.state.lock().unwrap();
        st.chunks
            .get(session_id)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Concatenates stored chunks in index order, as remote assembly would.
    pub fn assemble(&self, session_id: &str) -> Vec<u8> {
        let st = self.state.lock().unwrap();
        st.chunks
            .get(session_id)
            .map(|m| m.values().flatten().copied().collect())
            .unwrap_or_default()
    }
}

impl ChunkStore for MockStore {
    fn put_chunk(
        &self,
        req: &PutChunkRequest,
    ) -> Pin<Box<dyn Future<Output = Result<PutChunkResponse, StoreError>> + Send + '_>> {
        let req = req.clone();
        Box::pin(async move {
            self.put_calls.fetch_add(1, Ordering::SeqCst);
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
            let guard = InFlightGuard(self);

            let delay = *self.put_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            drop(guard);

            let mut st = self.state.lock().unwrap();
            if st.fail_always.contains(&req.index) {
                return Err(StoreError::Transient(format!(
                    "induced failure for chunk {}",
                    req.index
                )));
            }
            if let Some(queue) = st.scripted_put_failures.get_mut(&req.index)
                && let Some(err) = queue.pop_front()
            {
                return Err(err);
            }
            if !req.checksum.is_empty() && checksum_bytes(&req.data) != req.checksum {
                return Err(StoreError::Rejected("checksum mismatch".into()));
            }

            st.totals.insert(req.session_id.clone(), req.total_chunks);
            st.chunks
                .entry(req.session_id.clone())
                .or_default()
                .insert(req.index, req.data);
            Ok(PutChunkResponse { accepted: true })
        })
    }

    fn session_status(
        &self,
        session_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<SessionStatusResponse, StoreError>> + Send + '_>> {
        let session_id = session_id.to_string();
        Box::pin(async move {
            let st = self.state.lock().unwrap();
            let Some(total) = st.totals.get(&session_id) else {
                return Err(StoreError::NotFound(session_id));
            };
            let acked_indices = st
                .chunks
                .get(&session_id)
                .map(|m| m.keys().copied().collect())
                .unwrap_or_default();
            Ok(SessionStatusResponse {
                session_id,
                total_chunks: *total,
                acked_indices,
            })
        })
    }

    fn complete(
        &self,
        req: &CompleteUploadRequest,
    ) -> Pin<Box<dyn Future<Output = Result<CompleteUploadResponse, StoreError>> + Send + '_>> {
        let req = req.clone();
        Box::pin(async move {
            let mut st = self.state.lock().unwrap();
            if let Some(err) = st.complete_error.take() {
                return Err(err);
            }
            let received = st.chunks.get(&req.session_id).map_or(0, |m| m.len() as u32);
            if received != req.total_chunks {
                return Err(StoreError::Incomplete {
                    acked: received,
                    expected: req.total_chunks,
                });
            }
            if let Some(job_id) = st.complete_job.clone() {
                return Ok(CompleteUploadResponse {
                    artifact_ref: None,
                    job_id: Some(job_id),
                });
            }
            Ok(CompleteUploadResponse {
                artifact_ref: Some(format!("artifact/{}", req.session_id)),
                job_id: None,
            })
        })
    }

    fn job_status(
        &self,
        job_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<JobStatusResponse, StoreError>> + Send + '_>> {
        let job_id = job_id.to_string();
        Box::pin(async move {
            let mut st = self.state.lock().unwrap();
            if let Some(queue) = st.jobs.get_mut(&job_id)
                && let Some(next) = queue.pop_front()
            {
                return next;
            }
            if let Some(default) = st.job_defaults.get(&job_id) {
                return Ok(default.clone());
            }
            Err(StoreError::NotFound(job_id))
        })
    }
}
