//! Store handler for payments.

use crate::db::errors::Result;
use crate::db::models::payments::Payment;
use crate::types::{ClientId, PaymentId};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

pub struct Payments;

impl Payments {
    #[instrument(skip(pool), err)]
    pub async fn record(
        pool: &SqlitePool,
        client_id: ClientId,
        plan_name: Option<&str>,
        amount: f64,
        payment_date: DateTime<Utc>,
        payment_status: &str,
    ) -> Result<PaymentId> {
        let result = sqlx::query(
            "INSERT INTO payments (business_client_id, plan_name, amount, payment_date, payment_status)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(client_id)
        .bind(plan_name)
        .bind(amount)
        .bind(payment_date)
        .bind(payment_status)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get(pool: &SqlitePool, id: PaymentId) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(payment)
    }

    pub async fn for_client(pool: &SqlitePool, client_id: ClientId) -> Result<Vec<Payment>> {
        let payments =
            sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE business_client_id = ? ORDER BY id")
                .bind(client_id)
                .fetch_all(pool)
                .await?;
        Ok(payments)
    }

    /// Whether any settled (paid/success) payment exists for the client.
    pub async fn has_settled(pool: &SqlitePool, client_id: ClientId) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM payments
             WHERE business_client_id = ? AND payment_status IN ('paid', 'success'))",
        )
        .bind(client_id)
        .fetch_one(pool)
        .await?;
        Ok(exists != 0)
    }

    /// The earliest settled trial payment, if any.
    pub async fn trial_payment(pool: &SqlitePool, client_id: ClientId) -> Result<Option<Payment>> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments
             WHERE business_client_id = ? AND plan_name = 'trial'
               AND payment_status IN ('paid', 'success')
             ORDER BY payment_date LIMIT 1",
        )
        .bind(client_id)
        .fetch_optional(pool)
        .await?;
        Ok(payment)
    }

    pub async fn set_status(pool: &SqlitePool, id: PaymentId, status: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE payments SET payment_status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
