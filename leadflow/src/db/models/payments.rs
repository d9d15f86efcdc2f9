//! Payment and delivery record entities.

use crate::types::{ClientId, DeliveryId, DeliveryMethod, PaymentId, QualifiedLeadId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A recorded payment status transition. The core does not talk to payment
/// gateways; it only records transitions it is told about.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: PaymentId,
    pub business_client_id: ClientId,
    pub plan_name: Option<String>,
    pub amount: f64,
    pub payment_date: DateTime<Utc>,
    pub payment_status: String,
}

impl Payment {
    /// Statuses that count as settled when deciding client activity.
    pub fn is_settled(&self) -> bool {
        matches!(self.payment_status.as_str(), "paid" | "success")
    }
}

/// One lead delivered to one client over one channel.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeliveredLead {
    pub id: DeliveryId,
    pub qualified_lead_id: QualifiedLeadId,
    pub business_client_id: ClientId,
    pub delivered_at: DateTime<Utc>,
    pub delivery_method: DeliveryMethod,
    pub opened: bool,
}

/// Result of an idempotent delivery insert.
#[derive(Debug, Clone, Copy)]
pub struct RecordedDelivery {
    pub id: DeliveryId,
    /// False when the UNIQUE key matched an existing row.
    pub inserted: bool,
}
