//! # HTTP Server
//!
//! Router assembly and server lifecycle for the trigger API.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::crypto::TokenCipher;
use crate::error::{ApiError, Result};
use crate::handlers;
use crate::kafka::EventPublisher;
use crate::metrics::ApiMetrics;
use crate::storage::TriggerStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TriggerStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub cipher: Arc<TokenCipher>,
    pub config: Arc<Config>,
    pub metrics: Arc<ApiMetrics>,
}

/// Build the full application router.
pub fn create_router(state: AppState) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_seconds);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/ready", get(handlers::ready))
        .route("/metrics", get(handlers::metrics))
        .route("/api/v1/forms/:form_id", get(handlers::get_public_form))
        .route("/api/v1/forms/:form_id/submit", post(handlers::submit_form))
        .route("/api/v1/hooks/catch/:zap_id", post(handlers::webhook_catch))
        .route(
            "/api/v1/telegram/bots",
            post(handlers::register_telegram_bot),
        )
        .route(
            "/api/v1/telegram/webhook/:bot_id",
            post(handlers::telegram_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(state: AppState) -> Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Trigger API listening on {}", addr);

    let router = create_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::internal(format!("Server error: {}", e)))
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C signal");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
                info!("Received SIGTERM signal");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
