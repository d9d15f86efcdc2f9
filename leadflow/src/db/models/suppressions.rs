//! Opt-out and bounce records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A contact that asked not to be messaged over a channel.
/// `value` is canonicalized (lowercased, trimmed) before storage.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OptOut {
    pub id: i64,
    pub method: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

/// A failed send, captured either from the sender or from a provider webhook.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Bounce {
    pub id: i64,
    pub method: String,
    pub target: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
