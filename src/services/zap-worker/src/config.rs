//! # Configuration Module
//!
//! Configuration for the zap worker: Kafka consumer settings, storage,
//! action execution limits, and the SMTP transport used by the
//! send_email action. Loaded from `config/zap-worker*` files overridden
//! by `ZAP_WORKER_`-prefixed environment variables.

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkerError};
use zapflow_shared::topics;

/// Main configuration structure for the zap worker service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Kafka configuration
    pub kafka: KafkaConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Run/action execution configuration
    pub worker: WorkerConfig,

    /// SMTP configuration for the send_email action
    pub email: EmailConfig,

    /// Metrics listener settings
    pub metrics: MetricsConfig,

    /// Environment-specific settings
    pub environment: EnvironmentConfig,
}

impl Config {
    /// Load configuration from files and environment variables over
    /// defaults.
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Config::try_from(&Config::default())
                    .map_err(|e| WorkerError::configuration(e.to_string()))?,
            )
            .add_source(config::File::with_name("config/zap-worker").required(false))
            .add_source(config::File::with_name("config/zap-worker.local").required(false))
            .add_source(
                config::Environment::with_prefix("ZAP_WORKER")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| WorkerError::configuration(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| WorkerError::configuration(e.to_string()))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.kafka.bootstrap_servers.is_empty() {
            return Err(WorkerError::configuration(
                "kafka.bootstrap_servers must not be empty",
            ));
        }
        if self.kafka.consumer_group_id.is_empty() {
            return Err(WorkerError::configuration(
                "kafka.consumer_group_id must not be empty",
            ));
        }
        if self.kafka.topic.is_empty() {
            return Err(WorkerError::configuration("kafka.topic must not be empty"));
        }
        if self.storage.database_url.is_empty() {
            return Err(WorkerError::configuration(
                "storage.database_url must not be empty",
            ));
        }
        if self.worker.action_timeout_seconds == 0 {
            return Err(WorkerError::configuration(
                "worker.action_timeout_seconds must be greater than zero",
            ));
        }
        if self.metrics.port == 0 {
            return Err(WorkerError::configuration(
                "metrics.port must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kafka: KafkaConfig::default(),
            storage: StorageConfig::default(),
            worker: WorkerConfig::default(),
            email: EmailConfig::default(),
            metrics: MetricsConfig::default(),
            environment: EnvironmentConfig::default(),
        }
    }
}

/// Kafka consumer configuration.
///
/// Auto-commit stays disabled: the manual commit after a resolved
/// executor call is the worker's core correctness mechanism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KafkaConfig {
    /// Kafka bootstrap servers
    pub bootstrap_servers: Vec<String>,

    /// Consumer group ID
    pub consumer_group_id: String,

    /// Client ID for the dead-letter producer
    pub producer_client_id: String,

    /// Run-request topic to consume
    pub topic: String,

    /// Session timeout in milliseconds
    pub session_timeout_ms: u32,

    /// Heartbeat interval in milliseconds
    pub heartbeat_interval_ms: u32,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: vec!["localhost:9092".to_string()],
            consumer_group_id: "zap-worker".to_string(),
            producer_client_id: "zap-worker-dlq".to_string(),
            topic: topics::ZAP_RUN_REQUESTED.to_string(),
            session_timeout_ms: 30000,
            heartbeat_interval_ms: 3000,
        }
    }
}

impl KafkaConfig {
    /// Dead-letter topic companion of the consumed topic.
    pub fn dead_letter_topic(&self) -> String {
        topics::dead_letter_topic(&self.topic)
    }
}

/// Storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Postgres connection URL
    pub database_url: String,

    /// Maximum pool connections
    pub max_connections: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost:5432/zapflow".to_string(),
            max_connections: 10,
        }
    }
}

/// Policy applied to empty or unparseable queue messages.
///
/// Both variants end in a commit so a poison message can never stall its
/// partition through infinite redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedMessagePolicy {
    /// Log the message and commit past it.
    CommitAndDrop,
    /// Publish the raw bytes to the dead-letter topic, then commit.
    DeadLetter,
}

impl Default for MalformedMessagePolicy {
    fn default() -> Self {
        MalformedMessagePolicy::DeadLetter
    }
}

/// Run/action execution configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Upper bound for a single action invocation, in seconds. A hung
    /// action otherwise blocks its partition indefinitely.
    pub action_timeout_seconds: u64,

    /// Timeout for outbound HTTP calls made by the http_request action
    pub http_timeout_seconds: u64,

    /// What to do with empty/unparseable queue messages
    pub malformed_message_policy: MalformedMessagePolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            action_timeout_seconds: 30,
            http_timeout_seconds: 20,
            malformed_message_policy: MalformedMessagePolicy::default(),
        }
    }
}

/// SMTP configuration for the send_email action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub smtp_use_tls: bool,
    pub from_name: String,
    pub from_email: String,
    pub timeout_seconds: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "localhost".to_string(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            smtp_use_tls: false,
            from_name: "Zapflow".to_string(),
            from_email: "no-reply@zapflow.dev".to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Bind address for the worker's health/metrics listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub host: String,
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9091,
        }
    }
}

/// Environment-specific settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub debug: bool,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: "development".to_string(),
            debug: false,
        }
    }
}
