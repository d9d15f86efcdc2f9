//! Subscription and payment lifecycle.
//!
//! The core never talks to a payment gateway: it records status transitions
//! it is told about and derives client activity from them.

use crate::db::handlers::{Clients, Payments};
use crate::db::models::clients::BusinessClient;
use crate::db::models::payments::Payment;
use crate::errors::{Error, Result};
use crate::pricing::{self, AUTO_DOWNGRADE, GRACE_PERIOD_DAYS};
use crate::types::{ClientId, PaymentId};
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use tracing::{info, instrument};

/// Record a payment transition for a client. Returns `None` when the client
/// does not exist.
#[instrument(skip(pool), err)]
pub async fn record_payment(
    pool: &SqlitePool,
    client_id: ClientId,
    plan_name: Option<&str>,
    amount: f64,
    payment_status: &str,
) -> Result<Option<PaymentId>> {
    if Clients::fetch(pool, client_id).await?.is_none() {
        info!(client_id, "payment skipped: client missing");
        return Ok(None);
    }
    let id = Payments::record(pool, client_id, plan_name, amount, Utc::now(), payment_status).await?;
    info!(client_id, plan = plan_name.unwrap_or(""), status = payment_status, "payment recorded");
    Ok(Some(id))
}

pub async fn payments_for_client(pool: &SqlitePool, client_id: ClientId) -> Result<Vec<Payment>> {
    Ok(Payments::for_client(pool, client_id).await?)
}

/// Apply a subscription change driven by a payment status.
///
/// A settled payment for a known plan sets the plan, the seat count and
/// `next_billing_date = now + period_days`. Anything else nulls the plan.
/// Returns whether the subscription is active afterwards.
#[instrument(skip(pool), err)]
pub async fn update_subscription(
    pool: &SqlitePool,
    client_id: ClientId,
    plan_name: &str,
    number_of_users: Option<i64>,
    payment_status: &str,
) -> Result<bool> {
    if Clients::fetch(pool, client_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "BusinessClient".to_string(),
            id: client_id.to_string(),
        });
    }
    let Some(plan) = pricing::plan(plan_name) else {
        return Err(Error::PlanUnknown {
            plan: plan_name.to_string(),
        });
    };

    if matches!(payment_status.to_lowercase().as_str(), "paid" | "success") {
        let next_billing = Utc::now() + Duration::days(plan.period_days);
        sqlx::query(
            "UPDATE business_clients
             SET subscription_plan = ?,
                 number_of_users = COALESCE(?, number_of_users),
                 next_billing_date = ?
             WHERE id = ?",
        )
        .bind(plan.name)
        .bind(number_of_users)
        .bind(next_billing)
        .bind(client_id)
        .execute(pool)
        .await
        .map_err(crate::db::errors::DbError::from)?;
        info!(client_id, plan = plan.name, "subscription updated");
        Ok(true)
    } else {
        sqlx::query("UPDATE business_clients SET subscription_plan = NULL WHERE id = ?")
            .bind(client_id)
            .execute(pool)
            .await
            .map_err(crate::db::errors::DbError::from)?;
        info!(client_id, "subscription deactivated: payment not settled");
        Ok(false)
    }
}

/// Whether a client may receive deliveries.
///
/// Subscribed clients stay active while `next_billing_date` has not elapsed
/// beyond the grace period and a settled payment exists. Clients without a
/// plan are active on any settled payment (pay-per-lead or trial policy
/// applies downstream).
pub async fn is_client_active(pool: &SqlitePool, client_id: ClientId) -> Result<bool> {
    let Some(client) = Clients::fetch(pool, client_id).await? else {
        return Ok(false);
    };
    let has_settled = Payments::has_settled(pool, client_id).await?;

    if client.subscription_plan.is_none() {
        return Ok(has_settled);
    }
    let Some(next_billing) = client.next_billing_date else {
        return Ok(false);
    };
    let now = Utc::now();
    if next_billing <= now && next_billing + Duration::days(GRACE_PERIOD_DAYS) <= now {
        return Ok(false);
    }
    Ok(has_settled)
}

/// Clients whose next billing date falls within the coming `threshold_days`.
pub async fn check_upcoming_billing(
    pool: &SqlitePool,
    threshold_days: i64,
) -> Result<Vec<BusinessClient>> {
    let now = Utc::now();
    let soon = now + Duration::days(threshold_days);
    let clients = Clients::fetch_all(pool).await?;
    let due: Vec<BusinessClient> = clients
        .into_iter()
        .filter(|c| {
            c.next_billing_date
                .is_some_and(|date| now <= date && date <= soon)
        })
        .collect();
    info!(count = due.len(), threshold_days, "upcoming billing check");
    Ok(due)
}

/// Null the plan of every client whose grace period has fully elapsed.
/// Returns the number of clients downgraded.
#[instrument(skip(pool), err)]
pub async fn deactivate_expired_clients(pool: &SqlitePool) -> Result<u64> {
    if !AUTO_DOWNGRADE {
        return Ok(0);
    }
    let cutoff = Utc::now() - Duration::days(GRACE_PERIOD_DAYS);
    let result = sqlx::query(
        "UPDATE business_clients SET subscription_plan = NULL
         WHERE next_billing_date IS NOT NULL AND next_billing_date < ?",
    )
    .bind(cutoff)
    .execute(pool)
    .await
    .map_err(crate::db::errors::DbError::from)?;
    info!(count = result.rows_affected(), "expired clients deactivated");
    Ok(result.rows_affected())
}

/// Draft a `due` payment at the client's plan price. Returns `None` when the
/// client is missing, unsubscribed, or on an unknown plan.
pub async fn generate_invoice(pool: &SqlitePool, client_id: ClientId) -> Result<Option<PaymentId>> {
    let Some(client) = Clients::fetch(pool, client_id).await? else {
        return Ok(None);
    };
    let Some(plan) = client.subscription_plan.as_deref().and_then(pricing::plan) else {
        return Ok(None);
    };
    let id = Payments::record(pool, client_id, Some(plan.name), plan.price, Utc::now(), "due").await?;
    info!(client_id, amount = plan.price, "invoice generated");
    Ok(Some(id))
}

/// Settle a previously drafted invoice. Returns whether it existed.
pub async fn settle_invoice(pool: &SqlitePool, payment_id: PaymentId) -> Result<bool> {
    let settled = Payments::set_status(pool, payment_id, "paid").await?;
    if settled {
        info!(payment_id, "invoice settled");
    }
    Ok(settled)
}
