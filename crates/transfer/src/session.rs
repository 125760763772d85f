use std::sync::RwLock;

use uplift_protocol::{ChunkStatus, SessionState, UploadProgress};

use crate::{TransferError, split};

/// Tracks one upload session (thread-safe).
///
/// The session is the bookkeeping unit tying all chunks of one logical
/// upload together. Chunk tasks run concurrently, so all mutation goes
/// through an interior lock; state transitions are forward-only.
pub struct UploadSession {
    inner: RwLock<SessionInner>,
}

struct SessionInner {
    id: String,
    file_name: String,
    mime_type: String,
    total_size: usize,
    chunk_size: usize,
    state: SessionState,
    chunks: Vec<ChunkSlot>,
    acked: u32,
    error: String,
}

#[derive(Clone, Copy)]
struct ChunkSlot {
    status: ChunkStatus,
    attempts: u32,
}

impl UploadSession {
    /// Creates a new session in the `Created` state.
    ///
    /// The chunk count is derived from `total_size` and `chunk_size`; a
    /// zero chunk size is rejected.
    pub fn new(
        id: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        total_size: usize,
        chunk_size: usize,
    ) -> Result<Self, TransferError> {
        let total_chunks = split::chunk_count(total_size, chunk_size)?;
        Ok(Self {
            inner: RwLock::new(SessionInner {
                id: id.into(),
                file_name: file_name.into(),
                mime_type: mime_type.into(),
                total_size,
                chunk_size,
                state: SessionState::Created,
                chunks: vec![
                    ChunkSlot {
                        status: ChunkStatus::Pending,
                        attempts: 0,
                    };
                    total_chunks as usize
                ],
                acked: 0,
                error: String::new(),
            }),
        })
    }

    pub fn id(&self) -> String {
        self.inner.read().unwrap().id.clone()
    }

    pub fn file_name(&self) -> String {
        self.inner.read().unwrap().file_name.clone()
    }

    pub fn mime_type(&self) -> String {
        self.inner.read().unwrap().mime_type.clone()
    }

    pub fn total_size(&self) -> usize {
        self.inner.read().unwrap().total_size
    }

    pub fn chunk_size(&self) -> usize {
        self.inner.read().unwrap().chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.inner.read().unwrap().chunks.len() as u32
    }

    pub fn state(&self) -> SessionState {
        self.inner.read().unwrap().state
    }

    pub fn acked_chunks(&self) -> u32 {
        self.inner.read().unwrap().acked
    }

    /// Advances the session state. Backward or post-terminal transitions
    /// are ignored and return `false`.
    pub fn advance(&self, state: SessionState) -> bool {
        let mut s = self.inner.write().unwrap();
        if s.state.is_terminal() || state.rank() <= s.state.rank() {
            return false;
        }
        s.state = state;
        true
    }

    /// Marks the session failed with a human-readable reason.
    pub fn fail(&self, error: &str) {
        let mut s = self.inner.write().unwrap();
        if s.state == SessionState::Completed {
            return;
        }
        s.state = SessionState::Failed;
        s.error = error.to_string();
    }

    /// Records a chunk entering transfer. Returns `false` for an
    /// out-of-range index.
    pub fn mark_in_flight(&self, index: u32) -> bool {
        let mut s = self.inner.write().unwrap();
        let Some(slot) = s.chunks.get_mut(index as usize) else {
            return false;
        };
        slot.status = ChunkStatus::InFlight;
        true
    }

    /// Records a durably received chunk and the transport attempts it took.
    /// Idempotent: re-acking an acked index does not recount. Returns the
    /// acked total.
    pub fn mark_acked(&self, index: u32, attempts: u32) -> u32 {
        let mut s = self.inner.write().unwrap();
        if let Some(slot) = s.chunks.get_mut(index as usize)
            && slot.status != ChunkStatus::Acked
        {
            slot.status = ChunkStatus::Acked;
            slot.attempts += attempts;
            s.acked += 1;
        }
        s.acked
    }

    /// Records a chunk that exhausted its transport budget.
    pub fn mark_failed(&self, index: u32, attempts: u32) {
        let mut s = self.inner.write().unwrap();
        if let Some(slot) = s.chunks.get_mut(index as usize) {
            slot.status = ChunkStatus::Failed;
            slot.attempts += attempts;
        }
    }

    pub fn chunk_status(&self, index: u32) -> Option<ChunkStatus> {
        let s = self.inner.read().unwrap();
        s.chunks.get(index as usize).map(|c| c.status)
    }

    pub fn chunk_attempts(&self, index: u32) -> u32 {
        let s = self.inner.read().unwrap();
        s.chunks.get(index as usize).map_or(0, |c| c.attempts)
    }

    /// Indices confirmed received, ascending.
    pub fn acked_indices(&self) -> Vec<u32> {
        let s = self.inner.read().unwrap();
        s.chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.status == ChunkStatus::Acked)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Indices not yet acked, ascending.
    pub fn pending_indices(&self) -> Vec<u32> {
        let s = self.inner.read().unwrap();
        s.chunks
            .iter()
            .enumerate()
            .filter(|(_, c)| c.status != ChunkStatus::Acked)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Current progress snapshot. Percent is acked/total and therefore
    /// monotonically non-decreasing; a zero-chunk session reports 1.0.
    pub fn progress(&self) -> UploadProgress {
        let s = self.inner.read().unwrap();
        let total = s.chunks.len() as u32;
        let percent = if total == 0 {
            1.0
        } else {
            f64::from(s.acked) / f64::from(total)
        };
        UploadProgress {
            session_id: s.id.clone(),
            state: s.state,
            total_chunks: total,
            acked_chunks: s.acked,
            percent,
            error: s.error.clone(),
        }
    }
}
