//! Store handler for opt-outs and bounces.

use crate::db::errors::Result;
use crate::db::models::suppressions::{Bounce, OptOut};
use crate::types::DeliveryMethod;
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Canonical form used for every stored and compared suppression value.
pub fn canonicalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub struct Suppressions;

impl Suppressions {
    /// Whether the (method, value) pair is suppressed. The value is
    /// canonicalized before comparison so callers can pass raw input.
    pub async fn is_opted_out(pool: &SqlitePool, method: DeliveryMethod, value: &str) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM opt_outs WHERE method = ? AND value = ?)",
        )
        .bind(method)
        .bind(canonicalize(value))
        .fetch_one(pool)
        .await?;
        Ok(exists != 0)
    }

    pub async fn add_opt_out(pool: &SqlitePool, method: DeliveryMethod, value: &str) -> Result<()> {
        sqlx::query("INSERT INTO opt_outs (method, value, created_at) VALUES (?, ?, ?)")
            .bind(method)
            .bind(canonicalize(value))
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn add_bounce(
        pool: &SqlitePool,
        method: DeliveryMethod,
        target: &str,
        reason: &str,
    ) -> Result<()> {
        sqlx::query("INSERT INTO bounces (method, target, reason, created_at) VALUES (?, ?, ?, ?)")
            .bind(method)
            .bind(canonicalize(target))
            .bind(reason)
            .bind(Utc::now())
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn opt_outs(pool: &SqlitePool) -> Result<Vec<OptOut>> {
        let rows = sqlx::query_as::<_, OptOut>("SELECT * FROM opt_outs ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    pub async fn bounces(pool: &SqlitePool) -> Result<Vec<Bounce>> {
        let rows = sqlx::query_as::<_, Bounce>("SELECT * FROM bounces ORDER BY id")
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Bounce totals keyed by (method, target), across all time.
    pub async fn bounce_counts(pool: &SqlitePool) -> Result<HashMap<(String, String), i64>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            "SELECT method, lower(target), COUNT(*) FROM bounces GROUP BY method, lower(target)",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(method, target, count)| ((method, target), count))
            .collect())
    }
}
