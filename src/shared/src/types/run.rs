//! ZapRun: one execution instance of a Zap.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Lifecycle state of a run. Succeeded and Failed are terminal; a run is
/// never re-executed automatically once finalized, though at-least-once
/// delivery may re-run a Pending run after a worker crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Succeeded,
    Failed,
}

impl Default for RunStatus {
    fn default() -> Self {
        RunStatus::Pending
    }
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Succeeded | RunStatus::Failed)
    }
}

/// One materialized execution of a Zap, created by an ingestion endpoint
/// when a triggering event arrives. Exclusively owns its `metadata` (the
/// triggering payload) and its accumulated `result`; the parent Zap's
/// chain is shared, read-only state at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZapRun {
    pub id: Uuid,
    pub zap_id: Uuid,
    pub metadata: Value,
    pub status: RunStatus,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ZapRun {
    /// Fresh pending run for a triggering event.
    pub fn new(zap_id: Uuid, metadata: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            zap_id,
            metadata,
            status: RunStatus::Pending,
            result: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_run_is_pending() {
        let run = ZapRun::new(Uuid::new_v4(), json!({"k": "v"}));
        assert_eq!(run.status, RunStatus::Pending);
        assert!(run.result.is_none());
        assert!(run.finished_at.is_none());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!RunStatus::Pending.is_terminal());
        assert!(RunStatus::Succeeded.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
    }
}
