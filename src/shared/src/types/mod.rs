//! Domain model for the Zapflow platform
//!
//! These types mirror the persistence schema used by both services. A Zap
//! owns exactly one trigger and an ordered chain of actions; a ZapRun is
//! one materialized execution of that chain for a single triggering event.

mod form;
mod run;
mod zap;

pub use form::{Form, FormSubmission, TelegramBot};
pub use run::{RunStatus, ZapRun};
pub use zap::{Action, AvailableAction, AvailableTrigger, Trigger, TriggerKind, Zap};
