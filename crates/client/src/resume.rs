//! Reconciles local data with remote state to resume a session.

use std::collections::HashSet;

use uplift_protocol::SessionStatusResponse;
use uplift_transfer::chunk_count;

use crate::error::UploadError;

/// What a resumed pass has to do: which indices the store already holds,
/// and which remain to upload (ascending).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePlan {
    pub total_chunks: u32,
    pub acked: Vec<u32>,
    pub missing: Vec<u32>,
}

/// Computes the missing-chunk set for an interrupted session.
///
/// The remote acked-index set is the source of truth. The local blob must
/// split into exactly the chunk count the store recorded for the session —
/// a disagreement means the file or chunk size differs from the original
/// pass and byte continuity cannot be guaranteed.
pub fn plan_resume(
    status: &SessionStatusResponse,
    blob_len: usize,
    chunk_size: usize,
) -> Result<ResumePlan, UploadError> {
    let local_total =
        chunk_count(blob_len, chunk_size).map_err(|e| UploadError::InvalidInput(e.to_string()))?;

    if status.total_chunks != local_total {
        return Err(UploadError::InvalidInput(format!(
            "session {} expects {} chunks but the local blob splits into {}",
            status.session_id, status.total_chunks, local_total
        )));
    }

    let mut acked: HashSet<u32> = HashSet::with_capacity(status.acked_indices.len());
    for &index in &status.acked_indices {
        if index >= local_total {
            return Err(UploadError::InvalidInput(format!(
                "session {} reports acked index {} outside [0, {})",
                status.session_id, index, local_total
            )));
        }
        acked.insert(index);
    }

    let missing: Vec<u32> = (0..local_total).filter(|i| !acked.contains(i)).collect();
    let mut acked: Vec<u32> = acked.into_iter().collect();
    acked.sort_unstable();

    Ok(ResumePlan {
        total_chunks: local_total,
        acked,
        missing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(total: u32, acked: &[u32]) -> SessionStatusResponse {
        SessionStatusResponse {
            session_id: "s1".into(),
            total_chunks: total,
            acked_indices: acked.to_vec(),
        }
    }

    #[test]
    fn missing_is_the_complement() {
        let plan = plan_resume(&status(5, &[0, 2, 4]), 5_000, 1_024).unwrap();
        assert_eq!(plan.total_chunks, 5);
        assert_eq!(plan.acked, vec![0, 2, 4]);
        assert_eq!(plan.missing, vec![1, 3]);
    }

    #[test]
    fn nothing_acked_means_everything_missing() {
        let plan = plan_resume(&status(3, &[]), 3_000, 1_024).unwrap();
        assert_eq!(plan.missing, vec![0, 1, 2]);
        assert!(plan.acked.is_empty());
    }

    #[test]
    fn everything_acked_means_nothing_missing() {
        let plan = plan_resume(&status(3, &[0, 1, 2]), 3_000, 1_024).unwrap();
        assert!(plan.missing.is_empty());
    }

    #[test]
    fn duplicate_acks_are_collapsed() {
        let plan = plan_resume(&status(4, &[1, 1, 2, 2]), 4_000, 1_024).unwrap();
        assert_eq!(plan.acked, vec![1, 2]);
        assert_eq!(plan.missing, vec![0, 3]);
    }

    #[test]
    fn chunk_count_mismatch_rejected() {
        // Local blob would split into 2 chunks, store recorded 5.
        let err = plan_resume(&status(5, &[0]), 2_000, 1_024).unwrap_err();
        assert!(matches!(err, UploadError::InvalidInput(_)));
    }

    #[test]
    fn out_of_range_ack_rejected() {
        let err = plan_resume(&status(3, &[0, 7]), 3_000, 1_024).unwrap_err();
        assert!(matches!(err, UploadError::InvalidInput(_)));
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let err = plan_resume(&status(3, &[]), 3_000, 0).unwrap_err();
        assert!(matches!(err, UploadError::InvalidInput(_)));
    }

    #[test]
    fn missing_ranges_rederive_byte_for_byte() {
        // The ranges a resumed pass derives must equal the original split.
        let total = 10_000;
        let chunk = 1_024;
        let full = uplift_transfer::split_ranges(total, chunk).unwrap();
        let plan = plan_resume(&status(10, &[0, 1, 2]), total, chunk).unwrap();
        for &index in &plan.missing {
            let range = uplift_transfer::range_for_index(total, chunk, index).unwrap();
            assert_eq!(range, full[index as usize]);
        }
    }
}
