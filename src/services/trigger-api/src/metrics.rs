//! Prometheus metrics for the ingestion tier.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::{ApiError, Result};

/// Counters exported at `/metrics`.
pub struct ApiMetrics {
    registry: Registry,
    /// Triggering events that produced a run, by trigger kind.
    pub runs_triggered: IntCounterVec,
    /// Events received on an ingestion endpoint with no bound Zap.
    pub events_unbound: IntCounterVec,
    /// Run requests that failed to publish after the run was persisted.
    pub publish_failures: IntCounter,
}

impl ApiMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let runs_triggered = IntCounterVec::new(
            Opts::new("trigger_api_runs_triggered_total", "Runs created and published"),
            &["trigger"],
        )
        .map_err(metrics_error)?;

        let events_unbound = IntCounterVec::new(
            Opts::new(
                "trigger_api_events_unbound_total",
                "Events received with no Zap bound to the trigger",
            ),
            &["trigger"],
        )
        .map_err(metrics_error)?;

        let publish_failures = IntCounter::new(
            "trigger_api_publish_failures_total",
            "Run requests that failed to publish",
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(runs_triggered.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(events_unbound.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(publish_failures.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            runs_triggered,
            events_unbound,
            publish_failures,
        })
    }

    /// Render all counters in Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| ApiError::internal(e.to_string()))
    }
}

fn metrics_error(error: prometheus::Error) -> ApiError {
    ApiError::internal(format!("Metrics error: {}", error))
}
