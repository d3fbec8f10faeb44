//! # Zap Worker Service
//!
//! Worker tier of the Zapflow platform. Consumes run-request messages
//! from Kafka, loads the referenced run from Postgres, replays the
//! owning Zap's action chain through the action registry, persists the
//! outcome, and commits the offset only after the executor resolved.
//! Manual commits are the correctness mechanism that guarantees a run
//! is never marked done before it actually finished.

pub mod actions;
pub mod config;
pub mod consumer;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod storage;

pub use config::Config;
pub use error::{Result, WorkerError};
pub use executor::{ExecutionOutcome, RunExecutor, RunStore};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const SERVICE_NAME: &str = "zap-worker-service";
