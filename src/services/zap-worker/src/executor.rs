//! # Run Executor Module
//!
//! Given a run id, loads the run and its owning Zap's ordered action
//! chain, replays the chain over the triggering payload, and persists
//! the outcome. Each successful step wraps rather than replaces the
//! running payload (`{ "prev": ..., "action": ... }`), so every step's
//! result stays inspectable in the final structure.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::actions::{ActionError, ActionRegistry};
use crate::error::{Result, WorkerError};
use zapflow_shared::{RunStatus, Zap, ZapRun};

/// A run joined with its (possibly dangling) parent Zap, chain eagerly
/// loaded.
#[derive(Debug, Clone)]
pub struct RunWithZap {
    pub run: ZapRun,
    pub zap: Option<Zap>,
}

/// Persistence seam for the executor. Production uses Postgres; tests
/// substitute an in-memory store.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Load a run with its owning Zap and the Zap's ordered action
    /// chain. `None` when no such run exists; a present run with a
    /// `None` zap signals a dangling parent reference.
    async fn load_run_with_zap(&self, run_id: Uuid) -> Result<Option<RunWithZap>>;

    /// Finalize a run with its terminal status and effective output.
    async fn finalize_run(&self, run_id: Uuid, status: RunStatus, result: &Value) -> Result<()>;
}

/// Terminal outcome of a run. Both variants mean the consumer may commit
/// the message: the run will never produce anything different on
/// redelivery.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    /// Every step completed; carries the final wrapped payload.
    Completed(Value),
    /// The run failed terminally (unresolved action kind or a
    /// configuration error); carries the structured error recorded on
    /// the run.
    Failed(Value),
}

/// Sequential action-chain executor.
pub struct RunExecutor<S: RunStore> {
    store: Arc<S>,
    registry: Arc<ActionRegistry>,
    action_timeout: Duration,
}

impl<S: RunStore> RunExecutor<S> {
    pub fn new(store: Arc<S>, registry: Arc<ActionRegistry>, action_timeout: Duration) -> Self {
        Self {
            store,
            registry,
            action_timeout,
        }
    }

    /// Execute the run's action chain in ascending `sorting_order`.
    ///
    /// Terminal failures (unresolved kind, configuration error) come
    /// back as `Ok(ExecutionOutcome::Failed)` with the run row
    /// finalized. Retryable faults (transient action error, timeout,
    /// storage I/O) come back as `Err` with the run row untouched, so
    /// queue redelivery re-runs the whole chain.
    pub async fn execute(&self, run_id: Uuid) -> Result<ExecutionOutcome> {
        let loaded = self
            .store
            .load_run_with_zap(run_id)
            .await?
            .ok_or(WorkerError::RunNotFound { run_id })?;

        let Some(parent) = loaded.zap.as_ref() else {
            return Err(WorkerError::ZapMissing {
                run_id,
                zap_id: loaded.run.zap_id,
            });
        };

        let mut payload = loaded.run.metadata.clone();
        let chain = parent.ordered_actions();
        info!(%run_id, zap_id = %parent.id, steps = chain.len(), "Executing run");

        for (step, action) in chain.iter().enumerate() {
            let Some(handler) = self.registry.resolve(&action.kind) else {
                warn!(%run_id, step, kind = %action.kind, "No implementation for action kind");
                let error = json!({
                    "error": {
                        "kind": "unresolved_action",
                        "action": action.kind,
                        "step": step,
                    },
                    "last_payload": payload,
                });
                self.store
                    .finalize_run(run_id, RunStatus::Failed, &error)
                    .await?;
                return Ok(ExecutionOutcome::Failed(error));
            };

            let invocation = handler.execute(&action.config, &payload);
            let result = match tokio::time::timeout(self.action_timeout, invocation).await {
                Err(_) => {
                    return Err(WorkerError::action(
                        step,
                        &action.kind,
                        format!("timed out after {:?}", self.action_timeout),
                        true,
                    ));
                }
                Ok(Err(ActionError::Config(message))) => {
                    warn!(%run_id, step, kind = %action.kind, %message, "Action configuration error");
                    let error = json!({
                        "error": {
                            "kind": "action_config",
                            "action": action.kind,
                            "step": step,
                            "message": message,
                        },
                        "last_payload": payload,
                    });
                    self.store
                        .finalize_run(run_id, RunStatus::Failed, &error)
                        .await?;
                    return Ok(ExecutionOutcome::Failed(error));
                }
                Ok(Err(ActionError::Transient(message))) => {
                    return Err(WorkerError::action(step, &action.kind, message, true));
                }
                Ok(Ok(result)) => result,
            };

            payload = json!({"prev": payload, "action": result});
        }

        self.store
            .finalize_run(run_id, RunStatus::Succeeded, &payload)
            .await?;
        info!(%run_id, "Run completed");
        Ok(ExecutionOutcome::Completed(payload))
    }
}
