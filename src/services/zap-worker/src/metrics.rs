//! # Metrics Module
//!
//! Prometheus counters for the worker's message dispositions, exposed
//! on a small HTTP listener alongside the consumer loop.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use serde_json::json;
use tracing::info;

use crate::config::MetricsConfig;
use crate::error::{Result, WorkerError};

#[derive(Clone)]
pub struct WorkerMetrics {
    registry: Registry,
    pub runs_succeeded: IntCounter,
    pub runs_failed_terminal: IntCounter,
    pub runs_retried: IntCounterVec,
    pub messages_malformed: IntCounter,
    pub messages_dead_lettered: IntCounter,
}

impl WorkerMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let runs_succeeded = IntCounter::with_opts(Opts::new(
            "zap_runs_succeeded_total",
            "Runs that completed every action step",
        ))
        .map_err(|e| WorkerError::internal(e.to_string()))?;

        let runs_failed_terminal = IntCounter::with_opts(Opts::new(
            "zap_runs_failed_terminal_total",
            "Runs finalized as failed (unresolved kind or configuration error)",
        ))
        .map_err(|e| WorkerError::internal(e.to_string()))?;

        let runs_retried = IntCounterVec::new(
            Opts::new(
                "zap_runs_retried_total",
                "Messages left uncommitted for redelivery, by error category",
            ),
            &["category"],
        )
        .map_err(|e| WorkerError::internal(e.to_string()))?;

        let messages_malformed = IntCounter::with_opts(Opts::new(
            "zap_messages_malformed_total",
            "Queue messages with an empty or unparseable value",
        ))
        .map_err(|e| WorkerError::internal(e.to_string()))?;

        let messages_dead_lettered = IntCounter::with_opts(Opts::new(
            "zap_messages_dead_lettered_total",
            "Messages published to the dead-letter topic",
        ))
        .map_err(|e| WorkerError::internal(e.to_string()))?;

        registry
            .register(Box::new(runs_succeeded.clone()))
            .and_then(|_| registry.register(Box::new(runs_failed_terminal.clone())))
            .and_then(|_| registry.register(Box::new(runs_retried.clone())))
            .and_then(|_| registry.register(Box::new(messages_malformed.clone())))
            .and_then(|_| registry.register(Box::new(messages_dead_lettered.clone())))
            .map_err(|e| WorkerError::internal(e.to_string()))?;

        Ok(Self {
            registry,
            runs_succeeded,
            runs_failed_terminal,
            runs_retried,
            messages_malformed,
            messages_dead_lettered,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render all counters in Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| WorkerError::internal(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| WorkerError::internal(e.to_string()))
    }
}

/// Serve `/health` and `/metrics` until the process exits.
pub async fn serve(metrics: Arc<WorkerMetrics>, config: &MetricsConfig) -> Result<()> {
    let router = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(render))
        .with_state(metrics);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WorkerError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    info!("Metrics listener on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| WorkerError::internal(format!("Metrics server error: {}", e)))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": crate::SERVICE_NAME,
        "version": crate::VERSION,
    }))
}

async fn render(State(metrics): State<Arc<WorkerMetrics>>) -> std::result::Result<String, String> {
    metrics.render().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_count() {
        let metrics = WorkerMetrics::new().unwrap();
        metrics.runs_succeeded.inc();
        metrics.runs_retried.with_label_values(&["storage"]).inc();

        assert_eq!(metrics.runs_succeeded.get(), 1);
        assert!(!metrics.registry().gather().is_empty());
    }

    #[test]
    fn test_render_exposes_counters() {
        let metrics = WorkerMetrics::new().unwrap();
        metrics.runs_succeeded.inc();
        metrics.messages_dead_lettered.inc();

        let rendered = metrics.render().unwrap();
        assert!(rendered.contains("zap_runs_succeeded_total"));
        assert!(rendered.contains("zap_messages_dead_lettered_total"));
    }
}
