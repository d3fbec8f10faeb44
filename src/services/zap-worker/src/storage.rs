//! # Run Storage Module
//!
//! Postgres-backed `RunStore`. Loads a run joined with its owning Zap
//! and the Zap's chain (each action resolved to its catalog kind name),
//! and finalizes run rows with their terminal status and effective
//! output.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{Result, WorkerError};
use crate::executor::{RunStore, RunWithZap};
use zapflow_shared::{Action, RunStatus, Trigger, Zap, ZapRun};

/// Postgres implementation of `RunStore`.
#[derive(Clone)]
pub struct PostgresRunStore {
    pool: Arc<PgPool>,
}

impl PostgresRunStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        info!("Connecting run store to Postgres");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| WorkerError::storage(format!("Failed to connect to database: {}", e)))?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn load_zap(&self, zap_id: Uuid) -> Result<Option<Zap>> {
        let zap_row = sqlx::query(
            r#"
            SELECT id, name, user_id, created_at
            FROM zaps
            WHERE id = $1
            "#,
        )
        .bind(zap_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some(zap_row) = zap_row else {
            return Ok(None);
        };

        let trigger = sqlx::query(
            r#"
            SELECT t.id, t.zap_id, at.name AS kind, t.config
            FROM triggers t
            JOIN available_triggers at ON at.id = t.available_trigger_id
            WHERE t.zap_id = $1
            "#,
        )
        .bind(zap_id)
        .fetch_optional(self.pool.as_ref())
        .await?
        .map(|row| -> std::result::Result<Trigger, sqlx::Error> {
            Ok(Trigger {
                id: row.try_get("id")?,
                zap_id: row.try_get("zap_id")?,
                kind: row.try_get("kind")?,
                config: row.try_get("config")?,
            })
        })
        .transpose()?;

        let action_rows = sqlx::query(
            r#"
            SELECT a.id, a.zap_id, aa.name AS kind, a.config, a.sorting_order
            FROM actions a
            JOIN available_actions aa ON aa.id = a.available_action_id
            WHERE a.zap_id = $1
            ORDER BY a.sorting_order ASC
            "#,
        )
        .bind(zap_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut actions = Vec::with_capacity(action_rows.len());
        for row in action_rows {
            actions.push(Action {
                id: row.try_get("id")?,
                zap_id: row.try_get("zap_id")?,
                kind: row.try_get("kind")?,
                config: row.try_get("config")?,
                sorting_order: row.try_get("sorting_order")?,
            });
        }

        Ok(Some(Zap {
            id: zap_row.try_get("id")?,
            name: zap_row.try_get("name")?,
            user_id: zap_row.try_get("user_id")?,
            trigger,
            actions,
            created_at: zap_row.try_get("created_at")?,
        }))
    }
}

#[async_trait]
impl RunStore for PostgresRunStore {
    async fn load_run_with_zap(&self, run_id: Uuid) -> Result<Option<RunWithZap>> {
        debug!(%run_id, "Loading run with zap chain");

        let run_row = sqlx::query(
            r#"
            SELECT id, zap_id, metadata, status, result, created_at, finished_at
            FROM zap_runs
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        let Some(row) = run_row else {
            return Ok(None);
        };

        let status: String = row.try_get("status")?;
        let run = ZapRun {
            id: row.try_get("id")?,
            zap_id: row.try_get("zap_id")?,
            metadata: row.try_get("metadata")?,
            status: match status.as_str() {
                "succeeded" => RunStatus::Succeeded,
                "failed" => RunStatus::Failed,
                _ => RunStatus::Pending,
            },
            result: row.try_get::<Option<Value>, _>("result")?,
            created_at: row.try_get("created_at")?,
            finished_at: row.try_get("finished_at")?,
        };

        let zap = self.load_zap(run.zap_id).await?;
        Ok(Some(RunWithZap { run, zap }))
    }

    async fn finalize_run(&self, run_id: Uuid, status: RunStatus, result: &Value) -> Result<()> {
        debug!(%run_id, status = status.as_str(), "Finalizing run");

        sqlx::query(
            r#"
            UPDATE zap_runs
            SET status = $2, result = $3, finished_at = $4
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(status.as_str())
        .bind(result)
        .bind(Utc::now())
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
