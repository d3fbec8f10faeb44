//! # Trigger API Service
//!
//! Ingestion tier of the Zapflow platform. Receives triggering events
//! (form submissions, caught webhooks, Telegram updates), persists the
//! durable records they imply, and hands execution to the worker tier by
//! publishing run requests to Kafka. Persist first, publish second, so
//! a queued message always references an existing run.

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod kafka;
pub mod metrics;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{ApiError, Result};
pub use server::{create_router, AppState};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SERVICE_NAME: &str = "trigger-api-service";
