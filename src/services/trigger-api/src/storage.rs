//! # Trigger Storage Module
//!
//! Postgres-backed `TriggerStore`: the reads ingestion endpoints need
//! (published forms, trigger bindings) and the writes they make
//! (submissions, pending runs, registered bots).

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use zapflow_shared::{Form, FormSubmission, TelegramBot, TriggerKind, ZapRun};

use crate::config::StorageConfig;
use crate::error::{ApiError, Result};

/// Persistence seam for the ingestion endpoints. Handler tests use an
/// in-memory implementation.
#[async_trait]
pub trait TriggerStore: Send + Sync {
    /// Load a form by id, published forms only.
    async fn load_published_form(&self, form_id: Uuid) -> Result<Option<Form>>;

    /// The Zap whose form trigger is bound to this form, if any.
    async fn form_trigger_binding(&self, form_id: Uuid) -> Result<Option<Uuid>>;

    /// Whether a Zap exists and carries a trigger of the given kind.
    async fn zap_has_trigger(&self, zap_id: Uuid, kind: TriggerKind) -> Result<bool>;

    /// The Zap whose telegram trigger is bound to this bot, if any.
    async fn telegram_trigger_binding(&self, bot_id: Uuid) -> Result<Option<Uuid>>;

    async fn create_submission(&self, submission: &FormSubmission) -> Result<()>;

    async fn create_bot(&self, bot: &TelegramBot) -> Result<()>;

    /// Persist a fresh pending run. Must complete before the matching
    /// run request is published.
    async fn create_run(&self, run: &ZapRun) -> Result<()>;
}

/// Postgres implementation of `TriggerStore`.
#[derive(Clone)]
pub struct PostgresTriggerStore {
    pool: Arc<PgPool>,
}

impl PostgresTriggerStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self> {
        info!("Connecting trigger store to Postgres");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(|e| ApiError::storage(format!("Failed to connect to database: {}", e)))?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Zap bound to a trigger of `kind` whose config carries the given
    /// reference under `config_key`.
    async fn binding_by_config(
        &self,
        kind: TriggerKind,
        config_key: &str,
        reference: Uuid,
    ) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            r#"
            SELECT t.zap_id
            FROM triggers t
            JOIN available_triggers at ON at.id = t.available_trigger_id
            WHERE at.name = $1 AND t.config ->> $2 = $3
            "#,
        )
        .bind(kind.to_string())
        .bind(config_key)
        .bind(reference.to_string())
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(|r| r.try_get("zap_id"))
            .transpose()
            .map_err(ApiError::from)
    }
}

#[async_trait]
impl TriggerStore for PostgresTriggerStore {
    async fn load_published_form(&self, form_id: Uuid) -> Result<Option<Form>> {
        debug!(%form_id, "Loading published form");

        let row = sqlx::query(
            r#"
            SELECT id, name, description, fields, published, user_id, created_at
            FROM forms
            WHERE id = $1 AND published = TRUE
            "#,
        )
        .bind(form_id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(|r| -> std::result::Result<Form, sqlx::Error> {
            Ok(Form {
                id: r.try_get("id")?,
                name: r.try_get("name")?,
                description: r.try_get("description")?,
                fields: r.try_get("fields")?,
                published: r.try_get("published")?,
                user_id: r.try_get("user_id")?,
                created_at: r.try_get("created_at")?,
            })
        })
        .transpose()
        .map_err(ApiError::from)
    }

    async fn form_trigger_binding(&self, form_id: Uuid) -> Result<Option<Uuid>> {
        self.binding_by_config(TriggerKind::Form, "form_id", form_id)
            .await
    }

    async fn zap_has_trigger(&self, zap_id: Uuid, kind: TriggerKind) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 AS present
            FROM triggers t
            JOIN available_triggers at ON at.id = t.available_trigger_id
            WHERE t.zap_id = $1 AND at.name = $2
            "#,
        )
        .bind(zap_id)
        .bind(kind.to_string())
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row.is_some())
    }

    async fn telegram_trigger_binding(&self, bot_id: Uuid) -> Result<Option<Uuid>> {
        self.binding_by_config(TriggerKind::Telegram, "bot_id", bot_id)
            .await
    }

    async fn create_submission(&self, submission: &FormSubmission) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO form_submissions (id, form_id, data, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(submission.id)
        .bind(submission.form_id)
        .bind(&submission.data)
        .bind(submission.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_bot(&self, bot: &TelegramBot) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO telegram_bots (id, name, token_enc, user_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(bot.id)
        .bind(&bot.name)
        .bind(&bot.token_enc)
        .bind(bot.user_id)
        .bind(bot.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_run(&self, run: &ZapRun) -> Result<()> {
        debug!(run_id = %run.id, zap_id = %run.zap_id, "Creating pending run");

        sqlx::query(
            r#"
            INSERT INTO zap_runs (id, zap_id, metadata, status, result, created_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(run.id)
        .bind(run.zap_id)
        .bind(&run.metadata)
        .bind(run.status.as_str())
        .bind(&run.result)
        .bind(run.created_at)
        .bind(run.finished_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}
