//! Kafka topic names shared between the API tier and the worker tier.

/// Run-request topic: one message per ZapRun to execute, keyed by the
/// owning Zap id so all runs of a Zap land on the same partition.
pub const ZAP_RUN_REQUESTED: &str = "zap.run.requested";

/// Suffix appended to a topic name to form its dead-letter companion.
pub const DEAD_LETTER_SUFFIX: &str = ".dlq";

/// Dead-letter topic name for a given source topic.
pub fn dead_letter_topic(topic: &str) -> String {
    format!("{}{}", topic, DEAD_LETTER_SUFFIX)
}
