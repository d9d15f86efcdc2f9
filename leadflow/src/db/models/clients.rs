//! Business client entities.

use crate::types::ClientId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A subscribed business receiving leads.
///
/// `subscription_plan` is `None` for pay-per-lead or trial clients. Soft
/// deletion hides the row from listings; restore and permanent delete are
/// separate operations on [`crate::db::handlers::Clients`].
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BusinessClient {
    pub id: ClientId,
    pub business_name: String,
    pub industry: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub subscription_plan: Option<String>,
    pub number_of_users: Option<i64>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ClientCreate {
    pub business_name: String,
    pub industry: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
}

/// Patch-style update; `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct ClientUpdate {
    pub business_name: Option<String>,
    pub industry: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
}
