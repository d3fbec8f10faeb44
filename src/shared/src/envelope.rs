//! Run-request envelope carried on the run-request topic.
//!
//! The ingestion tier persists a ZapRun first and publishes this envelope
//! referencing it; the worker's only job per message is "load run by id
//! and execute". Messages are keyed by `zap_id` so every run of a Zap
//! lands on the same partition and is delivered in publish order.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::types::TriggerKind;

/// Current wire version. Bump when the envelope shape changes.
pub const ENVELOPE_VERSION: u32 = 1;

/// Errors decoding an envelope from raw message bytes.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("empty message value")]
    Empty,

    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported envelope version {0}")]
    UnsupportedVersion(u32),
}

/// One run request: which run to execute, plus the trigger kind and zap
/// id for logging and dead-letter triage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub v: u32,
    pub trigger: TriggerKind,
    pub zap_id: Uuid,
    pub zap_run_id: Uuid,
}

impl RunRequest {
    pub fn new(trigger: TriggerKind, zap_id: Uuid, zap_run_id: Uuid) -> Self {
        Self {
            v: ENVELOPE_VERSION,
            trigger,
            zap_id,
            zap_run_id,
        }
    }

    /// Partition key: all runs of a Zap share one key.
    pub fn key(&self) -> String {
        self.zap_id.to_string()
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.is_empty() {
            return Err(EnvelopeError::Empty);
        }
        let request: RunRequest = serde_json::from_slice(bytes)?;
        if request.v != ENVELOPE_VERSION {
            return Err(EnvelopeError::UnsupportedVersion(request.v));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_encode_decode() {
        let request = RunRequest::new(TriggerKind::Form, Uuid::new_v4(), Uuid::new_v4());
        let bytes = request.encode().unwrap();
        let decoded = RunRequest::decode(&bytes).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn test_decode_rejects_empty_value() {
        assert!(matches!(RunRequest::decode(b""), Err(EnvelopeError::Empty)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            RunRequest::decode(b"not json"),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_rejects_future_version() {
        let mut request = RunRequest::new(TriggerKind::Webhook, Uuid::new_v4(), Uuid::new_v4());
        request.v = 99;
        let bytes = serde_json::to_vec(&request).unwrap();
        assert!(matches!(
            RunRequest::decode(&bytes),
            Err(EnvelopeError::UnsupportedVersion(99))
        ));
    }

    #[test]
    fn test_key_is_zap_id() {
        let zap_id = Uuid::new_v4();
        let a = RunRequest::new(TriggerKind::Form, zap_id, Uuid::new_v4());
        let b = RunRequest::new(TriggerKind::Form, zap_id, Uuid::new_v4());
        assert_eq!(a.key(), b.key());
    }
}
