//! Zap, trigger, and action definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Catalog entry for a trigger kind. The `name` is the key that binds a
/// concrete trigger to its ingestion path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableTrigger {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Catalog entry for an action kind. The `name` is the key the worker's
/// action registry resolves to an implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableAction {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// The trigger kinds the ingestion boundary understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    Webhook,
    Form,
    Telegram,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Webhook => write!(f, "webhook"),
            TriggerKind::Form => write!(f, "form"),
            TriggerKind::Telegram => write!(f, "telegram"),
        }
    }
}

impl FromStr for TriggerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webhook" => Ok(TriggerKind::Webhook),
            "form" => Ok(TriggerKind::Form),
            "telegram" => Ok(TriggerKind::Telegram),
            other => Err(format!("unknown trigger kind: {}", other)),
        }
    }
}

/// Binding of a Zap to one trigger kind plus kind-specific configuration
/// (a form reference, a Telegram bot reference, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    pub zap_id: Uuid,
    /// Catalog `AvailableTrigger.name` this trigger is an instance of.
    pub kind: String,
    pub config: Value,
}

/// One step in a Zap's execution chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: Uuid,
    pub zap_id: Uuid,
    /// Catalog `AvailableAction.name`, resolved in the action registry.
    pub kind: String,
    pub config: Value,
    /// 0-based execution order. Unique per Zap; gaps are allowed in
    /// storage, iteration always honors ascending numeric order.
    pub sorting_order: i32,
}

/// A user-defined automation: one trigger plus an ordered action chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zap {
    pub id: Uuid,
    pub name: String,
    pub user_id: Uuid,
    pub trigger: Option<Trigger>,
    pub actions: Vec<Action>,
    pub created_at: DateTime<Utc>,
}

impl Zap {
    /// Action chain in execution order.
    pub fn ordered_actions(&self) -> Vec<&Action> {
        let mut actions: Vec<&Action> = self.actions.iter().collect();
        actions.sort_by_key(|a| a.sorting_order);
        actions
    }
}
