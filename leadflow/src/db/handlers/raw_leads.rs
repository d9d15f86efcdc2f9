//! Store handler for raw leads and their source attributions.

use crate::db::errors::Result;
use crate::db::models::leads::{AttributionCreate, RawLead, RawLeadCreate};
use crate::types::{LeadSourceId, RawLeadId};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::instrument;

pub struct RawLeads;

impl RawLeads {
    /// Insert one ingestion batch transactionally: either every lead (and its
    /// attribution) lands, or none do. Returns the new ids in input order.
    #[instrument(skip_all, fields(source_id = source_id, count = items.len()), err)]
    pub async fn insert_batch(
        pool: &SqlitePool,
        source_id: LeadSourceId,
        items: &[(RawLeadCreate, Option<AttributionCreate>)],
    ) -> Result<Vec<RawLeadId>> {
        let mut tx = pool.begin().await?;
        let now = Utc::now();
        let mut ids = Vec::with_capacity(items.len());

        for (lead, attribution) in items {
            let result = sqlx::query(
                "INSERT INTO raw_leads
                     (name, company_name, email, phone, website, industry, source_id, captured_at, raw_data)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&lead.name)
            .bind(&lead.company_name)
            .bind(&lead.email)
            .bind(&lead.phone)
            .bind(&lead.website)
            .bind(&lead.industry)
            .bind(source_id)
            .bind(now)
            .bind(&lead.raw_data)
            .execute(&mut *tx)
            .await?;
            let raw_id = result.last_insert_rowid();

            if let Some(attr) = attribution {
                sqlx::query(
                    "INSERT INTO source_attributions
                         (raw_lead_id, platform, reference_url, campaign, collected_at)
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(raw_id)
                .bind(&attr.platform)
                .bind(&attr.reference_url)
                .bind(&attr.campaign)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }

            ids.push(raw_id);
        }

        tx.commit().await?;
        Ok(ids)
    }

    pub async fn get(pool: &SqlitePool, id: RawLeadId) -> Result<Option<RawLead>> {
        let lead = sqlx::query_as::<_, RawLead>("SELECT * FROM raw_leads WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(lead)
    }

    /// Load many raw leads; missing ids are silently absent from the result.
    pub async fn get_bulk(pool: &SqlitePool, ids: &[RawLeadId]) -> Result<Vec<RawLead>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(lead) = Self::get(pool, *id).await? {
                out.push(lead);
            }
        }
        Ok(out)
    }
}
