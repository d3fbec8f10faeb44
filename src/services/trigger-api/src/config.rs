//! # Configuration Module
//!
//! Environment-driven configuration for the trigger API. Values come
//! from `TRIGGER_API`-prefixed environment variables layered over
//! defaults, e.g. `TRIGGER_API_SERVER__PORT=8080`.

use config::{Config as ConfigBuilder, ConfigError, Environment};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Main configuration for the trigger API service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub kafka: KafkaConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub crypto: CryptoConfig,
    pub environment: EnvironmentConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_seconds: u64,
}

/// Kafka producer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub client_id: String,
    /// Topic run requests are published to.
    pub topic: String,
    pub message_timeout_ms: u32,
    /// All in-flight messages to one partition stay ordered.
    pub max_in_flight: u32,
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub connect_timeout_seconds: u64,
}

/// JWT authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Secrets-at-rest configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoConfig {
    /// 32-byte AES-256-GCM key, base64-encoded.
    pub encryption_key: String,
}

/// Environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                request_timeout_seconds: 30,
            },
            kafka: KafkaConfig {
                bootstrap_servers: "localhost:9092".to_string(),
                client_id: "trigger-api".to_string(),
                topic: zapflow_shared::topics::ZAP_RUN_REQUESTED.to_string(),
                message_timeout_ms: 10_000,
                max_in_flight: 1,
            },
            storage: StorageConfig {
                database_url: "postgresql://localhost:5432/zapflow".to_string(),
                max_connections: 10,
                connect_timeout_seconds: 10,
            },
            auth: AuthConfig {
                jwt_secret: String::new(),
            },
            crypto: CryptoConfig {
                encryption_key: String::new(),
            },
            environment: EnvironmentConfig {
                name: "development".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables over defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let config = ConfigBuilder::builder()
            .add_source(config::Config::try_from(&defaults).map_err(config_error)?)
            .add_source(
                Environment::with_prefix("TRIGGER_API")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?;

        config.try_deserialize().map_err(config_error)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(ApiError::configuration("Server port cannot be 0"));
        }
        if self.kafka.bootstrap_servers.is_empty() {
            return Err(ApiError::configuration(
                "Kafka bootstrap servers cannot be empty",
            ));
        }
        if self.kafka.topic.is_empty() {
            return Err(ApiError::configuration("Kafka topic cannot be empty"));
        }
        if self.storage.database_url.is_empty() {
            return Err(ApiError::configuration("Database URL cannot be empty"));
        }
        if self.auth.jwt_secret.len() < 32 {
            return Err(ApiError::configuration(
                "JWT secret must be at least 32 bytes",
            ));
        }
        if self.crypto.encryption_key.is_empty() {
            return Err(ApiError::configuration("Encryption key cannot be empty"));
        }
        Ok(())
    }
}

fn config_error(error: ConfigError) -> ApiError {
    ApiError::configuration(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = "0123456789abcdef0123456789abcdef".to_string();
        config.crypto.encryption_key = "a".repeat(44);
        config
    }

    #[test]
    fn test_default_config_targets_run_topic() {
        let config = Config::default();
        assert_eq!(config.kafka.topic, "zap.run.requested");
        assert_eq!(config.kafka.max_in_flight, 1);
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_jwt_secret() {
        let mut config = valid_config();
        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_encryption_key() {
        let mut config = valid_config();
        config.crypto.encryption_key.clear();
        assert!(config.validate().is_err());
    }
}
