//! Form, form-submission, and Telegram bot records used at the
//! ingestion boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A user-built form. Only published forms are publicly renderable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Field definitions as stored by the form builder; the ingestion
    /// boundary treats them as opaque structured data.
    pub fields: Value,
    pub published: bool,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Terminal record of one form submission. Always persisted, whether or
/// not the form's trigger is bound to a Zap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub id: Uuid,
    pub form_id: Uuid,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl FormSubmission {
    pub fn new(form_id: Uuid, data: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            form_id,
            data,
            created_at: Utc::now(),
        }
    }
}

/// A registered Telegram bot. The API token is stored encrypted; this
/// type never carries the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelegramBot {
    pub id: Uuid,
    pub name: String,
    /// AES-256-GCM ciphertext, base64-encoded `iv || tag || data`.
    pub token_enc: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}
