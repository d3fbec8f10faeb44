//! # Integration Tests for the Trigger API
//!
//! Exercise the ingestion endpoints through the full router against an
//! in-memory trigger store and a recording publisher: persist-then-
//! publish ordering, unbound-form behavior, partition-key stability, and
//! bot token encryption.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use trigger_api_service::auth::Claims;
use trigger_api_service::config::Config;
use trigger_api_service::crypto::TokenCipher;
use trigger_api_service::kafka::EventPublisher;
use trigger_api_service::metrics::ApiMetrics;
use trigger_api_service::storage::TriggerStore;
use trigger_api_service::{create_router, AppState, Result};
use zapflow_shared::{Form, FormSubmission, RunRequest, TelegramBot, TriggerKind, ZapRun};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

const JWT_SECRET: &str = "0123456789abcdef0123456789abcdef";

/// In-memory trigger store shared by the tests.
#[derive(Default)]
struct MemoryTriggerStore {
    forms: Mutex<HashMap<Uuid, Form>>,
    form_bindings: Mutex<HashMap<Uuid, Uuid>>,
    webhook_zaps: Mutex<Vec<Uuid>>,
    telegram_bindings: Mutex<HashMap<Uuid, Uuid>>,
    submissions: Mutex<Vec<FormSubmission>>,
    bots: Mutex<Vec<TelegramBot>>,
    runs: Mutex<Vec<ZapRun>>,
}

#[async_trait]
impl TriggerStore for MemoryTriggerStore {
    async fn load_published_form(&self, form_id: Uuid) -> Result<Option<Form>> {
        Ok(self
            .forms
            .lock()
            .unwrap()
            .get(&form_id)
            .filter(|f| f.published)
            .cloned())
    }

    async fn form_trigger_binding(&self, form_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.form_bindings.lock().unwrap().get(&form_id).copied())
    }

    async fn zap_has_trigger(&self, zap_id: Uuid, kind: TriggerKind) -> Result<bool> {
        Ok(kind == TriggerKind::Webhook && self.webhook_zaps.lock().unwrap().contains(&zap_id))
    }

    async fn telegram_trigger_binding(&self, bot_id: Uuid) -> Result<Option<Uuid>> {
        Ok(self.telegram_bindings.lock().unwrap().get(&bot_id).copied())
    }

    async fn create_submission(&self, submission: &FormSubmission) -> Result<()> {
        self.submissions.lock().unwrap().push(submission.clone());
        Ok(())
    }

    async fn create_bot(&self, bot: &TelegramBot) -> Result<()> {
        self.bots.lock().unwrap().push(bot.clone());
        Ok(())
    }

    async fn create_run(&self, run: &ZapRun) -> Result<()> {
        self.runs.lock().unwrap().push(run.clone());
        Ok(())
    }
}

/// Publisher recording every run request instead of talking to Kafka.
#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<RunRequest>>,
}

impl RecordingPublisher {
    fn published(&self) -> Vec<RunRequest> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, request: &RunRequest) -> Result<()> {
        self.published.lock().unwrap().push(request.clone());
        Ok(())
    }
}

fn published_form(form_id: Uuid) -> Form {
    Form {
        id: form_id,
        name: "contact".to_string(),
        description: None,
        fields: json!([{"name": "email", "type": "text"}]),
        published: true,
        user_id: Uuid::new_v4(),
        created_at: Utc::now(),
    }
}

fn test_app(
    store: Arc<MemoryTriggerStore>,
    publisher: Arc<RecordingPublisher>,
) -> Router {
    let mut config = Config::default();
    config.auth.jwt_secret = JWT_SECRET.to_string();
    config.crypto.encryption_key = BASE64.encode([9u8; 32]);
    let cipher = TokenCipher::from_base64_key(&config.crypto.encryption_key).unwrap();

    create_router(AppState {
        store,
        publisher,
        cipher: Arc::new(cipher),
        config: Arc::new(config),
        metrics: Arc::new(ApiMetrics::new().unwrap()),
    })
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_bound_form_submission_persists_then_publishes() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let form_id = Uuid::new_v4();
    let zap_id = Uuid::new_v4();
    store
        .forms
        .lock()
        .unwrap()
        .insert(form_id, published_form(form_id));
    store.form_bindings.lock().unwrap().insert(form_id, zap_id);

    let app = test_app(store.clone(), publisher.clone());
    let response = app
        .oneshot(post_json(
            &format!("/api/v1/forms/{}/submit", form_id),
            json!({"email": "a@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["workflow_triggered"], json!(true));

    // Submission and pending run are both on disk.
    assert_eq!(store.submissions.lock().unwrap().len(), 1);
    let runs = store.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].zap_id, zap_id);

    // The published envelope references the persisted run.
    let published = publisher.published();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].zap_run_id, runs[0].id);
    assert_eq!(published[0].trigger, TriggerKind::Form);
}

#[tokio::test]
async fn test_unbound_form_submission_persists_without_publishing() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let form_id = Uuid::new_v4();
    store
        .forms
        .lock()
        .unwrap()
        .insert(form_id, published_form(form_id));

    let app = test_app(store.clone(), publisher.clone());
    let response = app
        .oneshot(post_json(
            &format!("/api/v1/forms/{}/submit", form_id),
            json!({"email": "b@example.com"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["ok"], json!(true));
    assert_eq!(body["workflow_triggered"], json!(false));
    assert!(body["submission_id"].is_string());

    // Submission recorded, but no run and no message.
    assert_eq!(store.submissions.lock().unwrap().len(), 1);
    assert!(store.runs.lock().unwrap().is_empty());
    assert!(publisher.published().is_empty());
}

#[tokio::test]
async fn test_unpublished_form_is_not_visible() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let form_id = Uuid::new_v4();
    let mut form = published_form(form_id);
    form.published = false;
    store.forms.lock().unwrap().insert(form_id, form);

    let app = test_app(store.clone(), publisher);
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/forms/{}", form_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rapid_submissions_share_partition_key() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let form_id = Uuid::new_v4();
    let zap_id = Uuid::new_v4();
    store
        .forms
        .lock()
        .unwrap()
        .insert(form_id, published_form(form_id));
    store.form_bindings.lock().unwrap().insert(form_id, zap_id);

    let app = test_app(store, publisher.clone());
    for n in 0..2 {
        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/v1/forms/{}/submit", form_id),
                json!({"n": n}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    // Same Zap, same key: any key-hash partitioner puts both runs on one
    // partition, in publish order.
    let published = publisher.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].key(), published[1].key());
    assert_ne!(published[0].zap_run_id, published[1].zap_run_id);

    let partition = |key: &str| {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish() % 12
    };
    assert_eq!(
        partition(&published[0].key()),
        partition(&published[1].key())
    );
}

#[tokio::test]
async fn test_webhook_catch_unknown_zap_is_404() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let app = test_app(store, publisher.clone());

    let response = app
        .oneshot(post_json(
            &format!("/api/v1/hooks/catch/{}", Uuid::new_v4()),
            json!({"event": "push"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(publisher.published().is_empty());
}

#[tokio::test]
async fn test_webhook_catch_queues_run_with_body_as_metadata() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let zap_id = Uuid::new_v4();
    store.webhook_zaps.lock().unwrap().push(zap_id);

    let app = test_app(store.clone(), publisher.clone());
    let response = app
        .oneshot(post_json(
            &format!("/api/v1/hooks/catch/{}", zap_id),
            json!({"event": "push", "ref": "main"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let runs = store.runs.lock().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].metadata, json!({"event": "push", "ref": "main"}));
    assert_eq!(publisher.published()[0].trigger, TriggerKind::Webhook);
}

#[tokio::test]
async fn test_telegram_webhook_unbound_bot_is_404() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let app = test_app(store, publisher.clone());

    let response = app
        .oneshot(post_json(
            &format!("/api/v1/telegram/webhook/{}", Uuid::new_v4()),
            json!({"message": {"text": "/start"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(publisher.published().is_empty());
}

#[tokio::test]
async fn test_telegram_webhook_queues_run() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let bot_id = Uuid::new_v4();
    let zap_id = Uuid::new_v4();
    store
        .telegram_bindings
        .lock()
        .unwrap()
        .insert(bot_id, zap_id);

    let app = test_app(store.clone(), publisher.clone());
    let response = app
        .oneshot(post_json(
            &format!("/api/v1/telegram/webhook/{}", bot_id),
            json!({"message": {"text": "hello"}}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let runs = store.runs.lock().unwrap();
    assert_eq!(runs[0].metadata["update"]["message"]["text"], json!("hello"));
    assert_eq!(publisher.published()[0].trigger, TriggerKind::Telegram);
}

#[tokio::test]
async fn test_register_bot_encrypts_token_at_rest() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let app = test_app(store.clone(), publisher);

    let token = encode(
        &Header::default(),
        &Claims {
            sub: Uuid::new_v4(),
            exp: Utc::now().timestamp() + 3600,
        },
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap();

    let bot_token = "123456789:AAHn-exampleTelegramBotToken";
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/telegram/bots")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::from(
                    json!({"name": "alerts-bot", "token": bot_token}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let bots = store.bots.lock().unwrap();
    assert_eq!(bots.len(), 1);
    assert_ne!(bots[0].token_enc, bot_token);
    assert!(!bots[0].token_enc.contains("AAHn"));
}

#[tokio::test]
async fn test_register_bot_requires_auth() {
    let store = Arc::new(MemoryTriggerStore::default());
    let publisher = Arc::new(RecordingPublisher::default());
    let app = test_app(store, publisher);

    let response = app
        .oneshot(post_json(
            "/api/v1/telegram/bots",
            json!({"name": "bot", "token": "123456789:AAHn-token"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
