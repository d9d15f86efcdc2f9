//! Shared identifier aliases and small domain enums.

use serde::{Deserialize, Serialize};

pub type LeadSourceId = i64;
pub type RawLeadId = i64;
pub type QualifiedLeadId = i64;
pub type ClientId = i64;
pub type DeliveryId = i64;
pub type PaymentId = i64;

/// Channel used to transmit a lead to a client.
///
/// `Dashboard` deliveries are recorded under the same idempotency key as the
/// other channels but never trigger a send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Email,
    WhatsApp,
    Dashboard,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Email => "email",
            DeliveryMethod::WhatsApp => "whatsapp",
            DeliveryMethod::Dashboard => "dashboard",
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Qualification bucket assigned by the qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ScoreCategory {
    Hot,
    Warm,
    Cold,
}

impl ScoreCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreCategory::Hot => "hot",
            ScoreCategory::Warm => "warm",
            ScoreCategory::Cold => "cold",
        }
    }
}

/// Pricing tier derived from a lead's industry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Mid,
    High,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Mid => "mid",
            Tier::High => "high",
        }
    }
}
