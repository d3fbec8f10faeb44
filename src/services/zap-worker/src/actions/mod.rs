//! # Action Registry Module
//!
//! String-keyed dispatch from a catalog action name to its
//! implementation. The registry is a flat name-to-handler table: new
//! kinds register without the executor special-casing anything, and an
//! unresolved name is a data/deployment mismatch the executor turns into
//! a terminal run failure.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::error::Result;

mod http_request;
mod send_email;

pub use http_request::HttpRequestAction;
pub use send_email::SendEmailAction;

/// Failure modes of a single action invocation.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The step's static configuration is unusable (missing required
    /// field, unparseable value). Terminal: redelivery cannot fix it.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O or downstream failure that a redelivered run may not hit
    /// again.
    #[error("{0}")]
    Transient(String),
}

pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// A single executable action kind.
///
/// `config` is the step's static configuration blob, `input` the
/// accumulated payload from prior steps. Implementations make no
/// idempotence promise; retry semantics live entirely in the queue.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Catalog name this handler implements.
    fn kind(&self) -> &'static str;

    async fn execute(&self, config: &Value, input: &Value) -> ActionResult<Value>;
}

/// Name-to-implementation lookup table for action kinds.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Arc<dyn ActionHandler>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all built-in action kinds registered.
    pub fn builtin(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(HttpRequestAction::new(config)?));
        registry.register(Arc::new(SendEmailAction::new(&config.email)?));
        Ok(registry)
    }

    /// Register a handler under its declared kind. Re-registering a kind
    /// replaces the previous handler.
    pub fn register(&mut self, handler: Arc<dyn ActionHandler>) {
        self.handlers.insert(handler.kind().to_string(), handler);
    }

    /// Pure lookup; `None` means no implementation is deployed for the
    /// requested kind.
    pub fn resolve(&self, kind: &str) -> Option<Arc<dyn ActionHandler>> {
        self.handlers.get(kind).cloned()
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}

/// Required string field out of an action config blob.
pub(crate) fn require_str<'a>(config: &'a Value, field: &str) -> ActionResult<&'a str> {
    config
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ActionError::Config(format!("missing required field '{}'", field)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoAction;

    #[async_trait]
    impl ActionHandler for EchoAction {
        fn kind(&self) -> &'static str {
            "echo"
        }

        async fn execute(&self, _config: &Value, input: &Value) -> ActionResult<Value> {
            Ok(input.clone())
        }
    }

    #[test]
    fn test_resolve_registered_kind() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(EchoAction));
        assert!(registry.resolve("echo").is_some());
    }

    #[test]
    fn test_resolve_unknown_kind_is_none() {
        let registry = ActionRegistry::new();
        assert!(registry.resolve("teleport").is_none());
    }

    #[test]
    fn test_require_str() {
        let config = json!({"url": "https://example.com", "empty": ""});
        assert_eq!(require_str(&config, "url").unwrap(), "https://example.com");
        assert!(require_str(&config, "missing").is_err());
        assert!(require_str(&config, "empty").is_err());
    }

    #[tokio::test]
    async fn test_registered_handler_executes() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(EchoAction));
        let handler = registry.resolve("echo").unwrap();
        let result = handler.execute(&json!({}), &json!({"x": 1})).await.unwrap();
        assert_eq!(result, json!({"x": 1}));
    }
}
