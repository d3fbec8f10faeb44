//! Shared domain types for the Zapflow platform
//!
//! Pure data definitions consumed by the trigger-api and zap-worker
//! services: the Zap domain model, the run-request envelope carried on
//! Kafka, and the topic name constants both tiers must agree on.

pub mod envelope;
pub mod topics;
pub mod types;

pub use envelope::{EnvelopeError, RunRequest, ENVELOPE_VERSION};
pub use types::*;
