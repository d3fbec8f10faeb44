//! # Worker Consumer Loop
//!
//! One consumer-group member per worker process, subscribed to the
//! run-request topic from the earliest available offset. Messages for a
//! partition are processed strictly sequentially: the loop never
//! advances before the current executor call resolves, and the offset
//! for a message is committed (at `offset + 1`, sync, auto-commit
//! disabled) only after the executor returned a terminal outcome.
//! Retryable failures leave the offset uncommitted and the loop seeks
//! back to the failed message before polling again, so the run is
//! redelivered in process and a later commit can never move the
//! committed mark past it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{Header, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::topic_partition_list::{Offset, TopicPartitionList};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{Config, KafkaConfig, MalformedMessagePolicy};
use crate::error::{Result, WorkerError};
use crate::executor::{ExecutionOutcome, RunExecutor, RunStore};
use crate::metrics::WorkerMetrics;
use zapflow_shared::RunRequest;

/// Seam between disposition logic and the executor, so the loop is
/// testable with fakes.
#[async_trait]
pub trait ExecuteRun: Send + Sync {
    async fn execute(&self, run_id: Uuid) -> Result<ExecutionOutcome>;
}

#[async_trait]
impl<S: RunStore> ExecuteRun for RunExecutor<S> {
    async fn execute(&self, run_id: Uuid) -> Result<ExecutionOutcome> {
        RunExecutor::execute(self, run_id).await
    }
}

/// Per-message effects the disposition logic can request. Production
/// wires this to the Kafka consumer/producer pair; tests record calls.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Commit this message's offset + 1 for its partition.
    async fn commit(&self) -> Result<()>;

    /// Publish the raw message bytes to the dead-letter topic with a
    /// reason header.
    async fn dead_letter(&self, payload: &[u8], reason: &str) -> Result<()>;
}

/// Disposition logic for one queue message, independent of the broker
/// client.
pub struct MessageProcessor<E: ExecuteRun> {
    executor: Arc<E>,
    policy: MalformedMessagePolicy,
    metrics: Arc<WorkerMetrics>,
}

impl<E: ExecuteRun> MessageProcessor<E> {
    pub fn new(
        executor: Arc<E>,
        policy: MalformedMessagePolicy,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        Self {
            executor,
            policy,
            metrics,
        }
    }

    /// Process one message value and apply its effects to the sink.
    ///
    /// The commit happens strictly after the executor call resolves. A
    /// retryable failure applies no effect and comes back as `Err`, so
    /// the caller must rewind to this message before polling again;
    /// advancing past it would let a later commit move the committed
    /// mark over the failed run and lose the redelivery.
    pub async fn process(&self, payload: Option<&[u8]>, sink: &dyn MessageSink) -> Result<()> {
        let raw = payload.unwrap_or_default();

        let request = match RunRequest::decode(raw) {
            Ok(request) => request,
            Err(decode_error) => {
                self.metrics.messages_malformed.inc();
                warn!(error = %decode_error, "Dropping malformed run-request message");
                match self.policy {
                    MalformedMessagePolicy::CommitAndDrop => {
                        sink.commit().await?;
                    }
                    MalformedMessagePolicy::DeadLetter => {
                        sink.dead_letter(raw, &decode_error.to_string()).await?;
                        self.metrics.messages_dead_lettered.inc();
                        sink.commit().await?;
                    }
                }
                return Ok(());
            }
        };

        debug!(
            zap_run_id = %request.zap_run_id,
            zap_id = %request.zap_id,
            trigger = %request.trigger,
            "Processing run request"
        );

        match self.executor.execute(request.zap_run_id).await {
            Ok(ExecutionOutcome::Completed(_)) => {
                self.metrics.runs_succeeded.inc();
                sink.commit().await?;
            }
            Ok(ExecutionOutcome::Failed(_)) => {
                self.metrics.runs_failed_terminal.inc();
                sink.commit().await?;
            }
            Err(e) if e.is_retryable() => {
                self.metrics
                    .runs_retried
                    .with_label_values(&[e.category()])
                    .inc();
                error!(
                    zap_run_id = %request.zap_run_id,
                    error = %e,
                    "Run failed with retryable error, leaving offset uncommitted"
                );
                return Err(e);
            }
            Err(e) => {
                // Data-integrity fault: redelivery cannot fix a missing
                // run or a dangling zap reference.
                error!(
                    zap_run_id = %request.zap_run_id,
                    error = %e,
                    "Run failed terminally, dead-lettering"
                );
                sink.dead_letter(raw, e.category()).await?;
                self.metrics.messages_dead_lettered.inc();
                sink.commit().await?;
            }
        }

        Ok(())
    }
}

/// Kafka-backed worker consumer.
pub struct WorkerConsumer<E: ExecuteRun> {
    consumer: StreamConsumer,
    producer: FutureProducer,
    processor: MessageProcessor<E>,
    topic: String,
    dead_letter_topic: String,
}

impl<E: ExecuteRun> WorkerConsumer<E> {
    pub fn new(config: &Config, processor: MessageProcessor<E>) -> Result<Self> {
        let consumer = create_consumer(&config.kafka)?;
        let producer = create_dead_letter_producer(&config.kafka)?;

        consumer
            .subscribe(&[config.kafka.topic.as_str()])
            .map_err(|e| {
                WorkerError::kafka_topic(
                    format!("Failed to subscribe: {}", e),
                    config.kafka.topic.clone(),
                )
            })?;

        Ok(Self {
            consumer,
            producer,
            processor,
            topic: config.kafka.topic.clone(),
            dead_letter_topic: config.kafka.dead_letter_topic(),
        })
    }

    /// Consume until the shutdown signal fires. Broker errors are logged
    /// and retried; they never kill the loop.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!(topic = %self.topic, "Worker consumer started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Worker consumer received shutdown signal");
                    return Ok(());
                }
                received = self.consumer.recv() => {
                    match received {
                        Err(e) => {
                            error!(error = %e, "Kafka receive error");
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                        Ok(message) => {
                            let partition = message.partition();
                            let offset = message.offset();
                            let sink = KafkaMessageSink {
                                consumer: &self.consumer,
                                producer: &self.producer,
                                topic: &self.topic,
                                dead_letter_topic: &self.dead_letter_topic,
                                key: message.key(),
                                partition,
                                offset,
                            };
                            if let Err(e) = self.processor.process(message.payload(), &sink).await {
                                // Retryable run failure or commit/DLQ I/O
                                // failure. Rewind to this offset before
                                // polling again: if the loop advanced, a
                                // later commit at offset+1 would move the
                                // committed mark past this message and
                                // the run would never be redelivered.
                                error!(partition, offset, error = %e, "Message not committed, rewinding");
                                if let Err(seek_error) = self.consumer.seek(
                                    &self.topic,
                                    partition,
                                    Offset::Offset(offset),
                                    Duration::from_secs(5),
                                ) {
                                    error!(
                                        partition,
                                        offset,
                                        error = %seek_error,
                                        "Seek failed, relying on committed-offset restart"
                                    );
                                }
                                tokio::time::sleep(Duration::from_secs(1)).await;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Sink wiring one received message to the Kafka client.
struct KafkaMessageSink<'a> {
    consumer: &'a StreamConsumer,
    producer: &'a FutureProducer,
    topic: &'a str,
    dead_letter_topic: &'a str,
    key: Option<&'a [u8]>,
    partition: i32,
    offset: i64,
}

#[async_trait]
impl MessageSink for KafkaMessageSink<'_> {
    async fn commit(&self) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(self.topic, self.partition, Offset::Offset(self.offset + 1))
            .map_err(|e| WorkerError::kafka_topic(e.to_string(), self.topic))?;

        self.consumer
            .commit(&offsets, rdkafka::consumer::CommitMode::Sync)
            .map_err(|e| {
                WorkerError::kafka_topic(format!("Offset commit failed: {}", e), self.topic)
            })
    }

    async fn dead_letter(&self, payload: &[u8], reason: &str) -> Result<()> {
        // Original key preserved so DLQ entries stay groupable per zap.
        let record = FutureRecord::to(self.dead_letter_topic)
            .payload(payload)
            .key(self.key.unwrap_or_default())
            .headers(OwnedHeaders::new().insert(Header {
                key: "reason",
                value: Some(reason),
            }));

        self.producer
            .send(record, Duration::from_secs(10))
            .await
            .map_err(|(e, _)| {
                WorkerError::kafka_topic(
                    format!("Dead-letter publish failed: {}", e),
                    self.dead_letter_topic,
                )
            })?;

        Ok(())
    }
}

fn create_consumer(config: &KafkaConfig) -> Result<StreamConsumer> {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.bootstrap_servers.join(","))
        .set("group.id", &config.consumer_group_id)
        .set(
            "client.id",
            format!("{}-consumer", config.consumer_group_id),
        )
        .set("session.timeout.ms", config.session_timeout_ms.to_string())
        .set(
            "heartbeat.interval.ms",
            config.heartbeat_interval_ms.to_string(),
        )
        .set("auto.offset.reset", "earliest")
        // Manual commits are the core correctness mechanism.
        .set("enable.auto.commit", "false");

    client_config
        .create()
        .map_err(|e| WorkerError::kafka(format!("Failed to create consumer: {}", e)))
}

fn create_dead_letter_producer(config: &KafkaConfig) -> Result<FutureProducer> {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.bootstrap_servers.join(","))
        .set("client.id", &config.producer_client_id)
        .set("acks", "all");

    client_config
        .create()
        .map_err(|e| WorkerError::kafka(format!("Failed to create dead-letter producer: {}", e)))
}
