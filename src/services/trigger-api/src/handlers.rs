//! # HTTP Handlers
//!
//! Ingestion endpoints. Every triggering path follows the same shape:
//! persist the durable record first (submission, run), then publish the
//! run request. A publish failure after the run row exists surfaces as
//! an error response while the pending run stays queued for operator
//! replay.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use zapflow_shared::{Form, FormSubmission, RunRequest, TelegramBot, TriggerKind, ZapRun};

use crate::auth::AuthenticatedUser;
use crate::error::{ApiError, Result};
use crate::server::AppState;

/// Response for a form submission.
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitFormResponse {
    pub ok: bool,
    pub submission_id: Uuid,
    /// True only when the form is bound to a Zap and a run was queued.
    pub workflow_triggered: bool,
}

/// Response for a caught webhook.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookCaughtResponse {
    pub ok: bool,
    pub zap_run_id: Uuid,
}

/// Request body for bot registration.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterBotRequest {
    #[validate(length(min = 1, message = "Bot name cannot be empty"))]
    pub name: String,
    #[validate(length(min = 10, message = "Bot token is too short"))]
    pub token: String,
}

/// Response for bot registration. Never echoes the token.
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterBotResponse {
    pub id: Uuid,
    pub name: String,
}

/// Persist a pending run and publish its run request.
async fn trigger_run(
    state: &AppState,
    zap_id: Uuid,
    kind: TriggerKind,
    metadata: Value,
) -> Result<Uuid> {
    let run = ZapRun::new(zap_id, metadata);
    let run_id = run.id;
    state.store.create_run(&run).await?;

    let request = RunRequest::new(kind, zap_id, run_id);
    if let Err(e) = state.publisher.publish(&request).await {
        state.metrics.publish_failures.inc();
        warn!(%zap_id, %run_id, error = %e, "Run persisted but publish failed");
        return Err(e);
    }

    state
        .metrics
        .runs_triggered
        .with_label_values(&[&kind.to_string()])
        .inc();
    info!(%zap_id, %run_id, trigger = %kind, "Run queued");
    Ok(run_id)
}

/// `GET /api/v1/forms/:form_id`: render data for a published form.
pub async fn get_public_form(
    State(state): State<AppState>,
    Path(form_id): Path<Uuid>,
) -> Result<Json<Form>> {
    let form = state
        .store
        .load_published_form(form_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Form"))?;
    Ok(Json(form))
}

/// `POST /api/v1/forms/:form_id/submit`: record a submission and queue
/// a run if the form is bound to a Zap.
pub async fn submit_form(
    State(state): State<AppState>,
    Path(form_id): Path<Uuid>,
    Json(data): Json<Value>,
) -> Result<Json<SubmitFormResponse>> {
    let form = state
        .store
        .load_published_form(form_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Form"))?;

    // The submission is recorded whether or not anything triggers.
    let submission = FormSubmission::new(form.id, data.clone());
    state.store.create_submission(&submission).await?;

    let binding = state.store.form_trigger_binding(form_id).await?;
    let workflow_triggered = match binding {
        Some(zap_id) => {
            let metadata = json!({
                "form_id": form_id,
                "submission_id": submission.id,
                "data": data,
            });
            trigger_run(&state, zap_id, TriggerKind::Form, metadata).await?;
            true
        }
        None => {
            state
                .metrics
                .events_unbound
                .with_label_values(&["form"])
                .inc();
            false
        }
    };

    Ok(Json(SubmitFormResponse {
        ok: true,
        submission_id: submission.id,
        workflow_triggered,
    }))
}

/// `POST /api/v1/hooks/catch/:zap_id`: generic webhook catch. The
/// request body becomes the run's triggering metadata verbatim.
pub async fn webhook_catch(
    State(state): State<AppState>,
    Path(zap_id): Path<Uuid>,
    Json(body): Json<Value>,
) -> Result<Json<WebhookCaughtResponse>> {
    if !state
        .store
        .zap_has_trigger(zap_id, TriggerKind::Webhook)
        .await?
    {
        return Err(ApiError::not_found("Webhook"));
    }

    let zap_run_id = trigger_run(&state, zap_id, TriggerKind::Webhook, body).await?;
    Ok(Json(WebhookCaughtResponse {
        ok: true,
        zap_run_id,
    }))
}

/// `POST /api/v1/telegram/bots`: register a bot for the authenticated
/// user. The token is encrypted before it touches storage.
pub async fn register_telegram_bot(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<RegisterBotRequest>,
) -> Result<(StatusCode, Json<RegisterBotResponse>)> {
    request
        .validate()
        .map_err(|e| ApiError::validation(e.to_string()))?;

    let bot = TelegramBot {
        id: Uuid::new_v4(),
        name: request.name,
        token_enc: state.cipher.encrypt(&request.token)?,
        user_id: user.user_id,
        created_at: chrono::Utc::now(),
    };
    state.store.create_bot(&bot).await?;

    info!(bot_id = %bot.id, user_id = %user.user_id, "Telegram bot registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisterBotResponse {
            id: bot.id,
            name: bot.name,
        }),
    ))
}

/// `POST /api/v1/telegram/webhook/:bot_id`: incoming Telegram update.
pub async fn telegram_webhook(
    State(state): State<AppState>,
    Path(bot_id): Path<Uuid>,
    Json(update): Json<Value>,
) -> Result<Json<WebhookCaughtResponse>> {
    let zap_id = state
        .store
        .telegram_trigger_binding(bot_id)
        .await?
        .ok_or_else(|| {
            state
                .metrics
                .events_unbound
                .with_label_values(&["telegram"])
                .inc();
            ApiError::not_found("Telegram binding")
        })?;

    let metadata = json!({
        "bot_id": bot_id,
        "update": update,
    });
    let zap_run_id = trigger_run(&state, zap_id, TriggerKind::Telegram, metadata).await?;
    Ok(Json(WebhookCaughtResponse {
        ok: true,
        zap_run_id,
    }))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": crate::SERVICE_NAME,
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now(),
    }))
}

/// `GET /ready`
pub async fn ready() -> impl IntoResponse {
    Json(json!({"status": "ready"}))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Result<String> {
    state.metrics.render()
}
