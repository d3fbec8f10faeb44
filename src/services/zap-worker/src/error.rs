//! # Error Handling Module
//!
//! Error types for the zap worker. The taxonomy the consumer loop cares
//! about is terminal vs. retryable: terminal faults are committed away
//! (the run will never succeed by redelivery), retryable faults leave the
//! offset uncommitted so the queue redelivers the run.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for the zap worker service.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Kafka-related errors
    #[error("Kafka error: {message}")]
    Kafka {
        message: String,
        topic: Option<String>,
    },

    /// Storage and database errors
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        operation: Option<String>,
    },

    /// No run exists for the requested id
    #[error("Run {run_id} not found")]
    RunNotFound { run_id: Uuid },

    /// The run's parent Zap reference is dangling (data-integrity fault)
    #[error("Run {run_id} references missing zap {zap_id}")]
    ZapMissing { run_id: Uuid, zap_id: Uuid },

    /// An action implementation failed at a given step
    #[error("Action '{kind}' failed at step {step}: {message}")]
    Action {
        step: usize,
        kind: String,
        message: String,
        retryable: bool,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Internal service errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl WorkerError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn kafka(message: impl Into<String>) -> Self {
        Self::Kafka {
            message: message.into(),
            topic: None,
        }
    }

    pub fn kafka_topic(message: impl Into<String>, topic: impl Into<String>) -> Self {
        Self::Kafka {
            message: message.into(),
            topic: Some(topic.into()),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            operation: None,
        }
    }

    pub fn action(
        step: usize,
        kind: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self::Action {
            step,
            kind: kind.into(),
            message: message.into(),
            retryable,
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether redelivering the message can make this error go away.
    ///
    /// RunNotFound and ZapMissing are data-integrity faults: the run was
    /// persisted before publish, so a missing row will not reappear and
    /// retrying forever would only stall the partition.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Kafka { .. } => true,
            WorkerError::Storage { .. } => true,
            WorkerError::Action { retryable, .. } => *retryable,
            WorkerError::Configuration { .. } => false,
            WorkerError::RunNotFound { .. } => false,
            WorkerError::ZapMissing { .. } => false,
            WorkerError::Serialization { .. } => false,
            WorkerError::Internal { .. } => false,
        }
    }

    /// Short category label for logs and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            WorkerError::Configuration { .. } => "configuration",
            WorkerError::Kafka { .. } => "kafka",
            WorkerError::Storage { .. } => "storage",
            WorkerError::RunNotFound { .. } => "run_not_found",
            WorkerError::ZapMissing { .. } => "zap_missing",
            WorkerError::Action { .. } => "action",
            WorkerError::Serialization { .. } => "serialization",
            WorkerError::Internal { .. } => "internal",
        }
    }
}

impl From<sqlx::Error> for WorkerError {
    fn from(error: sqlx::Error) -> Self {
        WorkerError::storage(error.to_string())
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(error: serde_json::Error) -> Self {
        WorkerError::serialization(error.to_string())
    }
}

/// Result type alias for the zap worker service.
pub type Result<T> = std::result::Result<T, WorkerError>;
