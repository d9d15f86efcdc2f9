//! Store handler for delivery records.
//!
//! The UNIQUE (qualified_lead_id, business_client_id, delivery_method) index
//! is the single source of truth for idempotency: [`Deliveries::record`] is
//! an upsert that reports whether insertion occurred, and a duplicate never
//! triggers another send.

use crate::db::errors::Result;
use crate::db::models::payments::{DeliveredLead, RecordedDelivery};
use crate::types::{ClientId, DeliveryMethod, QualifiedLeadId};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

pub struct Deliveries;

impl Deliveries {
    /// Record one delivery idempotently. Returns `None` when either side of
    /// the foreign key is missing.
    #[instrument(skip(pool), err)]
    pub async fn record(
        pool: &SqlitePool,
        qualified_lead_id: QualifiedLeadId,
        client_id: ClientId,
        method: DeliveryMethod,
    ) -> Result<Option<RecordedDelivery>> {
        let lead_exists: i64 = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM qualified_leads WHERE id = ?)")
            .bind(qualified_lead_id)
            .fetch_one(pool)
            .await?;
        let client_exists: i64 =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM business_clients WHERE id = ?)")
                .bind(client_id)
                .fetch_one(pool)
                .await?;
        if lead_exists == 0 || client_exists == 0 {
            tracing::info!(qualified_lead_id, client_id, "delivery skipped: fk missing");
            return Ok(None);
        }

        let result = sqlx::query(
            "INSERT INTO delivered_leads
                 (qualified_lead_id, business_client_id, delivered_at, delivery_method, opened)
             VALUES (?, ?, ?, ?, 0)
             ON CONFLICT (qualified_lead_id, business_client_id, delivery_method) DO NOTHING",
        )
        .bind(qualified_lead_id)
        .bind(client_id)
        .bind(Utc::now())
        .bind(method)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(Some(RecordedDelivery {
                id: result.last_insert_rowid(),
                inserted: true,
            }));
        }

        let existing: i64 = sqlx::query_scalar(
            "SELECT id FROM delivered_leads
             WHERE qualified_lead_id = ? AND business_client_id = ? AND delivery_method = ?",
        )
        .bind(qualified_lead_id)
        .bind(client_id)
        .bind(method)
        .fetch_one(pool)
        .await?;
        Ok(Some(RecordedDelivery {
            id: existing,
            inserted: false,
        }))
    }

    /// Deliveries for a client inside `[start, end)`, all channels.
    pub async fn count_for_month(
        pool: &SqlitePool,
        client_id: ClientId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM delivered_leads
             WHERE business_client_id = ? AND delivered_at >= ? AND delivered_at < ?",
        )
        .bind(client_id)
        .bind(start)
        .bind(end)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Same window, restricted to leads from one industry (pay-per-lead cap).
    pub async fn count_for_month_industry(
        pool: &SqlitePool,
        client_id: ClientId,
        industry: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM delivered_leads d
             JOIN qualified_leads q ON q.id = d.qualified_lead_id
             WHERE d.business_client_id = ? AND d.delivered_at >= ? AND d.delivered_at < ?
               AND q.industry = ?",
        )
        .bind(client_id)
        .bind(start)
        .bind(end)
        .bind(industry)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Deliveries inside the trial validity window (inclusive deadline).
    pub async fn count_in_trial_window(
        pool: &SqlitePool,
        client_id: ClientId,
        start: DateTime<Utc>,
        deadline: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM delivered_leads
             WHERE business_client_id = ? AND delivered_at >= ? AND delivered_at <= ?",
        )
        .bind(client_id)
        .bind(start)
        .bind(deadline)
        .fetch_one(pool)
        .await?;
        Ok(count)
    }

    /// Flip the opened flag on the delivery matching a webhook target.
    ///
    /// The target is matched against the qualified lead's email (email
    /// channel) or phone (whatsapp channel), lowercased. Returns whether a
    /// row was found; the flip is monotonic, replays leave state unchanged.
    pub async fn mark_opened(pool: &SqlitePool, method: DeliveryMethod, target: &str) -> Result<bool> {
        let target = target.trim().to_lowercase();
        let contact_column = match method {
            DeliveryMethod::Email => "q.email",
            _ => "q.phone",
        };
        let sql = format!(
            "UPDATE delivered_leads SET opened = 1 WHERE id = (
                 SELECT d.id FROM delivered_leads d
                 JOIN qualified_leads q ON q.id = d.qualified_lead_id
                 WHERE d.delivery_method = ? AND lower({contact_column}) = ?
                 ORDER BY d.id LIMIT 1
             )"
        );
        let result = sqlx::query(&sql)
            .bind(method)
            .bind(&target)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_for_client(pool: &SqlitePool, client_id: ClientId) -> Result<Vec<DeliveredLead>> {
        let rows = sqlx::query_as::<_, DeliveredLead>(
            "SELECT * FROM delivered_leads WHERE business_client_id = ? ORDER BY id",
        )
        .bind(client_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{LeadSources, QualifiedLeads, RawLeads, Repository};
    use crate::db::models::clients::ClientCreate;
    use crate::db::models::leads::{QualifiedLeadCreate, RawLeadCreate};
    use crate::types::ScoreCategory;

    async fn seed(pool: &SqlitePool) -> (QualifiedLeadId, ClientId) {
        let source = LeadSources::ensure(pool, "maps", "", "maps", "").await.unwrap();
        let raw_ids = RawLeads::insert_batch(
            pool,
            source,
            &[(
                RawLeadCreate {
                    email: Some("lead@example.com".into()),
                    phone: Some("+15551234".into()),
                    industry: Some("restaurants".into()),
                    ..Default::default()
                },
                None,
            )],
        )
        .await
        .unwrap();
        let (lead_id, _) = QualifiedLeads::upsert_for_raw(
            pool,
            &QualifiedLeadCreate {
                raw_lead_id: raw_ids[0],
                name: None,
                company_name: None,
                phone: Some("+15551234".into()),
                whatsapp: None,
                email: Some("lead@example.com".into()),
                score: 80,
                category: ScoreCategory::Hot,
                industry: Some("restaurants".into()),
                summary: String::new(),
                enriched_json: None,
                verified: true,
            },
        )
        .await
        .unwrap();

        let mut conn = pool.acquire().await.unwrap();
        let client = crate::db::handlers::Clients::new(&mut conn)
            .create(&ClientCreate {
                business_name: "Diner".into(),
                industry: "restaurants".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        (lead_id, client.id)
    }

    #[tokio::test]
    async fn record_is_idempotent_per_channel() {
        let pool = crate::db::connect_memory().await.unwrap();
        let (lead_id, client_id) = seed(&pool).await;

        let first = Deliveries::record(&pool, lead_id, client_id, DeliveryMethod::Email)
            .await
            .unwrap()
            .unwrap();
        assert!(first.inserted);

        let replay = Deliveries::record(&pool, lead_id, client_id, DeliveryMethod::Email)
            .await
            .unwrap()
            .unwrap();
        assert!(!replay.inserted);
        assert_eq!(first.id, replay.id);

        // A different channel is a distinct delivery.
        let whatsapp = Deliveries::record(&pool, lead_id, client_id, DeliveryMethod::WhatsApp)
            .await
            .unwrap()
            .unwrap();
        assert!(whatsapp.inserted);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM delivered_leads")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn record_with_missing_fk_is_a_noop() {
        let pool = crate::db::connect_memory().await.unwrap();
        let (lead_id, client_id) = seed(&pool).await;
        assert!(Deliveries::record(&pool, lead_id, 9999, DeliveryMethod::Email)
            .await
            .unwrap()
            .is_none());
        assert!(Deliveries::record(&pool, 9999, client_id, DeliveryMethod::Email)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn mark_opened_matches_channel_contact_and_is_monotonic() {
        let pool = crate::db::connect_memory().await.unwrap();
        let (lead_id, client_id) = seed(&pool).await;
        Deliveries::record(&pool, lead_id, client_id, DeliveryMethod::Email)
            .await
            .unwrap();

        assert!(Deliveries::mark_opened(&pool, DeliveryMethod::Email, "LEAD@example.com")
            .await
            .unwrap());
        // Replay leaves the state equal.
        assert!(Deliveries::mark_opened(&pool, DeliveryMethod::Email, "lead@example.com")
            .await
            .unwrap());
        // No whatsapp delivery exists for this lead.
        assert!(!Deliveries::mark_opened(&pool, DeliveryMethod::WhatsApp, "+15551234")
            .await
            .unwrap());

        let rows = Deliveries::list_for_client(&pool, client_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].opened);
    }
}
