//! # Kafka Producer
//!
//! Lazily-initialized process-wide producer with a serialized connect
//! path: concurrent requests that find no producer race to a mutex, and
//! only the first one builds the client. Publish failures invalidate the
//! cached producer so the next request reconnects.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use zapflow_shared::RunRequest;

use crate::config::KafkaConfig;
use crate::error::{ApiError, Result};

/// Seam between HTTP handlers and Kafka. Handler tests swap in a
/// recording implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a run request, keyed by its zap id.
    async fn publish(&self, request: &RunRequest) -> Result<()>;
}

/// Holds at most one connected producer for the process lifetime.
pub struct ProducerManager {
    config: KafkaConfig,
    producer: Mutex<Option<Arc<FutureProducer>>>,
}

impl ProducerManager {
    pub fn new(config: KafkaConfig) -> Self {
        Self {
            config,
            producer: Mutex::new(None),
        }
    }

    /// Return the cached producer, building one under the lock if none
    /// exists yet.
    async fn acquire(&self) -> Result<Arc<FutureProducer>> {
        let mut guard = self.producer.lock().await;
        if let Some(producer) = guard.as_ref() {
            return Ok(producer.clone());
        }

        info!(
            bootstrap_servers = %self.config.bootstrap_servers,
            "Connecting Kafka producer"
        );
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.bootstrap_servers)
            .set("client.id", &self.config.client_id)
            .set(
                "message.timeout.ms",
                self.config.message_timeout_ms.to_string(),
            )
            .set(
                "max.in.flight.requests.per.connection",
                self.config.max_in_flight.to_string(),
            )
            .set("acks", "all")
            .create()
            .map_err(|e| ApiError::kafka(format!("Failed to create producer: {}", e)))?;

        let producer = Arc::new(producer);
        *guard = Some(producer.clone());
        Ok(producer)
    }

    /// Drop the cached producer so the next publish reconnects.
    async fn invalidate(&self) {
        let mut guard = self.producer.lock().await;
        *guard = None;
    }
}

/// [`EventPublisher`] backed by the shared producer.
pub struct KafkaEventPublisher {
    manager: ProducerManager,
}

impl KafkaEventPublisher {
    pub fn new(config: KafkaConfig) -> Self {
        Self {
            manager: ProducerManager::new(config),
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, request: &RunRequest) -> Result<()> {
        let producer = self.manager.acquire().await?;
        let payload = request
            .encode()
            .map_err(|e| ApiError::internal(format!("Failed to encode run request: {}", e)))?;
        let key = request.key();

        let record = FutureRecord::to(&self.manager.config.topic)
            .key(&key)
            .payload(&payload);

        match producer.send(record, Duration::from_secs(10)).await {
            Ok((partition, offset)) => {
                debug!(
                    zap_id = %request.zap_id,
                    zap_run_id = %request.zap_run_id,
                    partition,
                    offset,
                    "Published run request"
                );
                Ok(())
            }
            Err((e, _)) => {
                warn!(error = %e, "Kafka publish failed, invalidating producer");
                self.manager.invalidate().await;
                Err(ApiError::kafka(format!("Failed to publish run request: {}", e)))
            }
        }
    }
}
