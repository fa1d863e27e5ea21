//! Peak worker message protocol.
//!
//! Requests and responses are JSON objects tagged by `type`:
//!
//! ```json
//! { "type": "generate-peaks", "id": "…", "audioData": [..], "sampleRate": 44100, "targetPeaks": 100 }
//! { "type": "cancel", "id": "…" }
//! { "type": "peaks-result", "id": "…", "peaks": [..] }
//! { "type": "error", "id": "…", "error": "…" }
//! ```
//!
//! Every response carries the id of the request it answers. Responses to
//! concurrent requests may arrive in any order.

use crate::peaks::{compute_peaks, PeakArray};
use musicverse_core::{Result, StudioError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Request tag for peak generation.
pub const GENERATE_PEAKS: &str = "generate-peaks";
/// Request tag for cancellation.
pub const CANCEL: &str = "cancel";

/// Opaque token pairing a request with its response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Message sent to a peak worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerRequest {
    /// Compute peaks for a mono buffer. The buffer is owned by the request.
    #[serde(rename_all = "camelCase")]
    GeneratePeaks {
        id: CorrelationId,
        audio_data: Vec<f32>,
        sample_rate: u32,
        target_peaks: usize,
    },
    /// Drop a queued request without replying.
    Cancel { id: CorrelationId },
}

impl WorkerRequest {
    pub fn id(&self) -> &CorrelationId {
        match self {
            Self::GeneratePeaks { id, .. } | Self::Cancel { id } => id,
        }
    }
}

/// Message sent back by a peak worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerResponse {
    PeaksResult { id: CorrelationId, peaks: PeakArray },
    Error { id: CorrelationId, error: String },
}

impl WorkerResponse {
    pub fn error(id: CorrelationId, error: impl Into<String>) -> Self {
        Self::Error {
            id,
            error: error.into(),
        }
    }

    pub fn id(&self) -> &CorrelationId {
        match self {
            Self::PeaksResult { id, .. } | Self::Error { id, .. } => id,
        }
    }

    /// Convert into the caller-facing result. Error responses become
    /// `StudioError::Worker`.
    pub fn into_result(self) -> Result<PeakArray> {
        match self {
            Self::PeaksResult { peaks, .. } => Ok(peaks),
            Self::Error { error, .. } => Err(StudioError::Worker(error)),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| StudioError::Serialization(format!("Failed to encode response: {}", e)))
    }
}

/// Parse a JSON request. Malformed or unrecognized messages come back as
/// the error response the worker should send.
pub fn decode_request(text: &str) -> std::result::Result<WorkerRequest, WorkerResponse> {
    let raw: serde_json::Value = serde_json::from_str(text).map_err(|e| {
        WorkerResponse::error(CorrelationId::default(), format!("Malformed message: {}", e))
    })?;

    let id = raw
        .get("id")
        .and_then(serde_json::Value::as_str)
        .map(CorrelationId::new)
        .unwrap_or_default();

    let kind = match raw.get("type").and_then(serde_json::Value::as_str) {
        Some(kind) => kind.to_string(),
        None => return Err(WorkerResponse::error(id, "Message has no type")),
    };

    match kind.as_str() {
        GENERATE_PEAKS | CANCEL => serde_json::from_value(raw).map_err(|e| {
            WorkerResponse::error(id, format!("Malformed {} message: {}", kind, e))
        }),
        other => Err(WorkerResponse::error(
            id,
            format!("Unknown message type: {}", other),
        )),
    }
}

/// Execute one request on the current thread.
///
/// `Cancel` has nothing to answer here; the pool handles it before dispatch.
pub fn handle_request(request: WorkerRequest) -> Option<WorkerResponse> {
    match request {
        WorkerRequest::GeneratePeaks {
            id,
            audio_data,
            sample_rate,
            target_peaks,
        } => {
            debug!(
                %id,
                samples = audio_data.len(),
                sample_rate,
                target_peaks,
                "Generating peaks"
            );
            let response = match compute_peaks(&audio_data, target_peaks) {
                Ok(peaks) => WorkerResponse::PeaksResult { id, peaks },
                Err(e) => WorkerResponse::error(id, e.to_string()),
            };
            Some(response)
        }
        WorkerRequest::Cancel { .. } => None,
    }
}

/// JSON in, JSON out. Returns `None` when the message needs no reply.
pub fn handle_message(text: &str) -> Result<Option<String>> {
    let response = match decode_request(text) {
        Ok(request) => handle_request(request),
        Err(error_response) => Some(error_response),
    };
    response.map(|r| r.to_json()).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let request = WorkerRequest::GeneratePeaks {
            id: CorrelationId::new("req-1"),
            audio_data: vec![0.5, -1.0],
            sample_rate: 44100,
            target_peaks: 2,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "generate-peaks",
                "id": "req-1",
                "audioData": [0.5, -1.0],
                "sampleRate": 44100,
                "targetPeaks": 2,
            })
        );
    }

    #[test]
    fn test_response_wire_format() {
        let ok = WorkerResponse::PeaksResult {
            id: CorrelationId::new("a"),
            peaks: vec![1.0, 0.5],
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({ "type": "peaks-result", "id": "a", "peaks": [1.0, 0.5] })
        );

        let err = WorkerResponse::error(CorrelationId::new("b"), "boom");
        assert_eq!(
            serde_json::to_value(&err).unwrap(),
            json!({ "type": "error", "id": "b", "error": "boom" })
        );
    }

    #[test]
    fn test_handle_message_generates_peaks() {
        let text = json!({
            "type": "generate-peaks",
            "id": "x1",
            "audioData": [0.25, -0.5, 0.0, 0.0],
            "sampleRate": 8000,
            "targetPeaks": 2,
        })
        .to_string();

        let reply = handle_message(&text).unwrap().unwrap();
        let response: WorkerResponse = serde_json::from_str(&reply).unwrap();
        assert_eq!(
            response,
            WorkerResponse::PeaksResult {
                id: CorrelationId::new("x1"),
                peaks: vec![1.0, 0.0],
            }
        );
    }

    #[test]
    fn test_unknown_type_names_the_type() {
        let text = json!({ "type": "make-coffee", "id": "c9" }).to_string();
        match decode_request(&text) {
            Err(WorkerResponse::Error { id, error }) => {
                assert_eq!(id.as_str(), "c9");
                assert!(error.contains("make-coffee"));
            }
            other => panic!("expected error response, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_target_is_error_response() {
        let text = json!({
            "type": "generate-peaks",
            "id": "z",
            "audioData": [0.1],
            "sampleRate": 8000,
            "targetPeaks": 0,
        })
        .to_string();
        let reply = handle_message(&text).unwrap().unwrap();
        let response: WorkerResponse = serde_json::from_str(&reply).unwrap();
        assert!(matches!(response, WorkerResponse::Error { ref id, .. } if id.as_str() == "z"));
    }

    #[test]
    fn test_malformed_json_is_error_response() {
        assert!(matches!(
            decode_request("{not json"),
            Err(WorkerResponse::Error { .. })
        ));
    }

    #[test]
    fn test_cancel_has_no_reply() {
        let text = json!({ "type": "cancel", "id": "q" }).to_string();
        assert_eq!(handle_message(&text).unwrap(), None);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(CorrelationId::generate(), CorrelationId::generate());
    }
}
