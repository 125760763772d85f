use serde::{Deserialize, Serialize};

use crate::types::{CompletionOutcome, JobStatus, ProcessingJob};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Delivers one chunk of an upload session.
///
/// The `data` field is base64-encoded in JSON. `total_chunks` is repeated on
/// every chunk so the store can create the session record lazily on first
/// contact and validate the index range on each delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutChunkRequest {
    pub session_id: String,
    pub index: u32,
    pub total_chunks: u32,
    /// SHA-256 hex digest of `data` (empty means no verification).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub checksum: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

/// Finalizes an upload, triggering remote assembly.
///
/// The store must validate that its received-chunk count equals
/// `total_chunks` before assembling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub session_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub total_chunks: u32,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Store acknowledgment for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutChunkResponse {
    pub accepted: bool,
}

/// Remote view of a session: which chunk indices were durably received.
/// This is the source of truth for resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub total_chunks: u32,
    pub acked_indices: Vec<u32>,
}

/// Result of the completion handshake: a durable artifact reference when
/// assembly is synchronous, or a job id when post-processing runs async.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl CompleteUploadResponse {
    /// Interprets the response. The artifact reference wins if the store
    /// populated both fields.
    pub fn outcome(&self) -> Option<CompletionOutcome> {
        if let Some(artifact) = &self.artifact_ref {
            return Some(CompletionOutcome::Artifact(artifact.clone()));
        }
        self.job_id.clone().map(CompletionOutcome::Job)
    }
}

/// Current status of a post-processing job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStatusResponse {
    /// Pairs the response with the job id it was fetched for.
    pub fn into_job(self, job_id: impl Into<String>) -> ProcessingJob {
        ProcessingJob {
            job_id: job_id.into(),
            status: self.status,
            result: self.result,
            error: self.error,
        }
    }
}

/// Serializes `Vec<u8>` as a base64 string in JSON.
mod base64_bytes {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        STANDARD.encode(data).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_chunk_base64_roundtrip() {
        let req = PutChunkRequest {
            session_id: "s1".into(),
            index: 2,
            total_chunks: 5,
            checksum: "abc123".into(),
            data: vec![0, 1, 2, 255, 254],
        };
        let json = serde_json::to_string(&req).unwrap();
        // Binary data must not appear as a JSON array.
        assert!(json.contains("\"data\":\""));
        let back: PutChunkRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, req);
    }

    #[test]
    fn put_chunk_camel_case_keys() {
        let req = PutChunkRequest {
            session_id: "s1".into(),
            index: 0,
            total_chunks: 1,
            checksum: String::new(),
            data: vec![42],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["totalChunks"], 1);
        // Empty checksum is omitted entirely.
        assert!(json.get("checksum").is_none());
    }

    #[test]
    fn complete_response_outcome_prefers_artifact() {
        let resp = CompleteUploadResponse {
            artifact_ref: Some("media/abc".into()),
            job_id: Some("job-1".into()),
        };
        assert_eq!(
            resp.outcome(),
            Some(CompletionOutcome::Artifact("media/abc".into()))
        );
    }

    #[test]
    fn complete_response_outcome_job() {
        let resp = CompleteUploadResponse {
            artifact_ref: None,
            job_id: Some("job-1".into()),
        };
        assert_eq!(resp.outcome(), Some(CompletionOutcome::Job("job-1".into())));
    }

    #[test]
    fn complete_response_outcome_empty() {
        let resp = CompleteUploadResponse {
            artifact_ref: None,
            job_id: None,
        };
        assert_eq!(resp.outcome(), None);
    }

    #[test]
    fn session_status_roundtrip() {
        let resp = SessionStatusResponse {
            session_id: "s1".into(),
            total_chunks: 4,
            acked_indices: vec![0, 2],
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("ackedIndices"));
        let back: SessionStatusResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn job_status_into_job() {
        let resp = JobStatusResponse {
            status: JobStatus::Completed,
            result: Some("media/xyz".into()),
            error: None,
        };
        let job = resp.into_job("job-7");
        assert_eq!(job.job_id, "job-7");
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_deref(), Some("media/xyz"));
    }

    #[test]
    fn job_status_defaults_missing_optionals() {
        let back: JobStatusResponse =
            serde_json::from_str("{\"status\":\"processing\"}").unwrap();
        assert_eq!(back.status, JobStatus::Processing);
        assert!(back.result.is_none());
        assert!(back.error.is_none());
    }
}
