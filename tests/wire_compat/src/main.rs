fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use uplift_protocol::{
        CompleteUploadRequest, CompleteUploadResponse, CompletionOutcome, JobStatus,
        JobStatusResponse, ProcessingJob, PutChunkRequest, PutChunkResponse,
        SessionStatusResponse, UploadProgress,
    };

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Normalizes JSON numbers so integer-valued floats compare equal
    /// (a store serializing `1.0` must match our `1`).
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => {
                if let Some(f) = n.as_f64() {
                    serde_json::json!(f)
                } else {
                    v.clone()
                }
            }
            serde_json::Value::Object(map) => {
                let normalized: serde_json::Map<String, serde_json::Value> = map
                    .iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect();
                serde_json::Value::Object(normalized)
            }
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and
    /// compares the JSON values. A mismatch means the wire format drifted.
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized =
            serde_json::to_value(&parsed).unwrap_or_else(|e| panic!("failed to serialize {name}: {e}"));
        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "wire format drift in {name}"
        );
        parsed
    }

    #[test]
    fn put_chunk_request_wire_format() {
        let req: PutChunkRequest = roundtrip_test("put_chunk_request.json");
        assert_eq!(req.session_id, "0d7f9a3c-bf51-4a42-9a6e-2f25f1d3a001");
        assert_eq!(req.index, 2);
        assert_eq!(req.total_chunks, 5);
        // "aGVsbG8gd29ybGQ=" is base64 for "hello world".
        assert_eq!(req.data, b"hello world");
    }

    #[test]
    fn put_chunk_response_wire_format() {
        let resp: PutChunkResponse = roundtrip_test("put_chunk_response.json");
        assert!(resp.accepted);
    }

    #[test]
    fn session_status_wire_format() {
        let resp: SessionStatusResponse = roundtrip_test("session_status_response.json");
        assert_eq!(resp.total_chunks, 5);
        assert_eq!(resp.acked_indices, vec![0, 1, 3]);
    }

    #[test]
    fn complete_upload_request_wire_format() {
        let req: CompleteUploadRequest = roundtrip_test("complete_upload_request.json");
        assert_eq!(req.file_name, "beach-sunset.jpg");
        assert_eq!(req.mime_type, "image/jpeg");
        assert_eq!(req.total_chunks, 5);
    }

    #[test]
    fn complete_upload_response_artifact_wire_format() {
        let resp: CompleteUploadResponse =
            roundtrip_test("complete_upload_response_artifact.json");
        assert_eq!(
            resp.outcome(),
            Some(CompletionOutcome::Artifact("media/2026/08/beach-sunset.jpg".into()))
        );
    }

    #[test]
    fn complete_upload_response_job_wire_format() {
        let resp: CompleteUploadResponse = roundtrip_test("complete_upload_response_job.json");
        assert_eq!(
            resp.outcome(),
            Some(CompletionOutcome::Job("job-7c11".into()))
        );
    }

    #[test]
    fn job_status_wire_format() {
        let resp: JobStatusResponse = roundtrip_test("job_status_response.json");
        assert_eq!(resp.status, JobStatus::Completed);
        assert_eq!(resp.result.as_deref(), Some("media/2026/08/beach-sunset.jpg"));
    }

    #[test]
    fn processing_job_wire_format() {
        let job: ProcessingJob = roundtrip_test("processing_job.json");
        assert_eq!(job.job_id, "job-7c11");
        assert_eq!(job.status, JobStatus::Processing);
    }

    #[test]
    fn upload_progress_wire_format() {
        let progress: UploadProgress = roundtrip_test("upload_progress.json");
        assert_eq!(progress.acked_chunks, 3);
        assert_eq!(progress.total_chunks, 5);
        assert!((progress.percent - 0.6).abs() < f64::EPSILON);
    }
}
