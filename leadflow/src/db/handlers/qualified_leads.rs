//! Store handler for qualified leads.

use crate::db::errors::Result;
use crate::db::models::leads::{QualifiedLead, QualifiedLeadCreate};
use crate::types::{QualifiedLeadId, RawLeadId};
use sqlx::SqlitePool;
use tracing::instrument;

pub struct QualifiedLeads;

impl QualifiedLeads {
    /// Insert a qualified lead unless one already exists for the raw lead.
    /// Returns the id plus whether a new row was inserted.
    #[instrument(skip_all, fields(raw_lead_id = request.raw_lead_id), err)]
    pub async fn upsert_for_raw(
        pool: &SqlitePool,
        request: &QualifiedLeadCreate,
    ) -> Result<(QualifiedLeadId, bool)> {
        if let Some(existing) = Self::get_by_raw(pool, request.raw_lead_id).await? {
            return Ok((existing.id, false));
        }

        let result = sqlx::query(
            "INSERT INTO qualified_leads
                 (raw_lead_id, name, company_name, phone, whatsapp, email,
                  score, category, industry, summary, enriched_json, verified)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (raw_lead_id) DO NOTHING",
        )
        .bind(request.raw_lead_id)
        .bind(&request.name)
        .bind(&request.company_name)
        .bind(&request.phone)
        .bind(&request.whatsapp)
        .bind(&request.email)
        .bind(request.score)
        .bind(request.category)
        .bind(&request.industry)
        .bind(&request.summary)
        .bind(&request.enriched_json)
        .bind(request.verified)
        .execute(pool)
        .await?;

        if result.rows_affected() == 0 {
            // Lost a race with a concurrent upsert for the same raw lead.
            let existing = Self::get_by_raw(pool, request.raw_lead_id)
                .await?
                .ok_or(crate::db::errors::DbError::NotFound)?;
            return Ok((existing.id, false));
        }
        Ok((result.last_insert_rowid(), true))
    }

    /// Overwrite the enrichment outputs. Re-running enrichment is idempotent.
    pub async fn update_enrichment(
        pool: &SqlitePool,
        id: QualifiedLeadId,
        summary: &str,
        enriched_json: &str,
        verified: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE qualified_leads SET summary = ?, enriched_json = ?, verified = ? WHERE id = ?",
        )
        .bind(summary)
        .bind(enriched_json)
        .bind(verified)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn get(pool: &SqlitePool, id: QualifiedLeadId) -> Result<Option<QualifiedLead>> {
        let lead = sqlx::query_as::<_, QualifiedLead>("SELECT * FROM qualified_leads WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(lead)
    }

    pub async fn get_by_raw(pool: &SqlitePool, raw_lead_id: RawLeadId) -> Result<Option<QualifiedLead>> {
        let lead =
            sqlx::query_as::<_, QualifiedLead>("SELECT * FROM qualified_leads WHERE raw_lead_id = ?")
                .bind(raw_lead_id)
                .fetch_optional(pool)
                .await?;
        Ok(lead)
    }

    /// Load many qualified leads in id order; missing ids are skipped.
    pub async fn get_bulk(pool: &SqlitePool, ids: &[QualifiedLeadId]) -> Result<Vec<QualifiedLead>> {
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(lead) = Self::get(pool, *id).await? {
                out.push(lead);
            }
        }
        Ok(out)
    }

    /// Delivery candidates when no explicit ids are given: hot or warm leads
    /// in the client's industry.
    pub async fn list_candidates(pool: &SqlitePool, industry: &str) -> Result<Vec<QualifiedLead>> {
        let leads = sqlx::query_as::<_, QualifiedLead>(
            "SELECT * FROM qualified_leads
             WHERE category IN ('hot', 'warm') AND industry = ?
             ORDER BY id",
        )
        .bind(industry)
        .fetch_all(pool)
        .await?;
        Ok(leads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{LeadSources, RawLeads};
    use crate::db::models::leads::RawLeadCreate;
    use crate::types::ScoreCategory;

    async fn seed_raw(pool: &SqlitePool) -> RawLeadId {
        let source = LeadSources::ensure(pool, "maps", "", "maps", "").await.unwrap();
        let ids = RawLeads::insert_batch(
            pool,
            source,
            &[(
                RawLeadCreate {
                    company_name: Some("Widget Co".into()),
                    industry: Some("saas".into()),
                    ..Default::default()
                },
                None,
            )],
        )
        .await
        .unwrap();
        ids[0]
    }

    fn request(raw_lead_id: RawLeadId) -> QualifiedLeadCreate {
        QualifiedLeadCreate {
            raw_lead_id,
            name: None,
            company_name: Some("Widget Co".into()),
            phone: Some("+15550001".into()),
            whatsapp: None,
            email: Some("sales@widget.example".into()),
            score: 75,
            category: ScoreCategory::Hot,
            industry: Some("saas".into()),
            summary: String::new(),
            enriched_json: None,
            verified: false,
        }
    }

    #[tokio::test]
    async fn at_most_one_qualified_lead_per_raw_lead() {
        let pool = crate::db::connect_memory().await.unwrap();
        let raw_id = seed_raw(&pool).await;

        let (first, inserted) = QualifiedLeads::upsert_for_raw(&pool, &request(raw_id)).await.unwrap();
        assert!(inserted);
        let (second, inserted_again) =
            QualifiedLeads::upsert_for_raw(&pool, &request(raw_id)).await.unwrap();
        assert!(!inserted_again);
        assert_eq!(first, second);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM qualified_leads")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn enrichment_update_overwrites_previous_values() {
        let pool = crate::db::connect_memory().await.unwrap();
        let raw_id = seed_raw(&pool).await;
        let (id, _) = QualifiedLeads::upsert_for_raw(&pool, &request(raw_id)).await.unwrap();

        QualifiedLeads::update_enrichment(&pool, id, "site_ok=true, content_len=10", "{}", true)
            .await
            .unwrap();
        QualifiedLeads::update_enrichment(&pool, id, "site_ok=false, content_len=0", "{}", false)
            .await
            .unwrap();

        let lead = QualifiedLeads::get(&pool, id).await.unwrap().unwrap();
        assert_eq!(lead.summary, "site_ok=false, content_len=0");
        assert!(!lead.verified);
    }

    #[tokio::test]
    async fn candidates_filter_by_category_and_industry() {
        let pool = crate::db::connect_memory().await.unwrap();
        let source = LeadSources::ensure(&pool, "maps", "", "maps", "").await.unwrap();

        for (industry, category) in [
            ("saas", ScoreCategory::Hot),
            ("saas", ScoreCategory::Cold),
            ("law", ScoreCategory::Warm),
        ] {
            let ids = RawLeads::insert_batch(
                &pool,
                source,
                &[(RawLeadCreate { industry: Some(industry.into()), ..Default::default() }, None)],
            )
            .await
            .unwrap();
            let mut req = request(ids[0]);
            req.industry = Some(industry.into());
            req.category = category;
            req.email = Some(format!("lead{}@x.example", ids[0]));
            QualifiedLeads::upsert_for_raw(&pool, &req).await.unwrap();
        }

        let saas = QualifiedLeads::list_candidates(&pool, "saas").await.unwrap();
        assert_eq!(saas.len(), 1);
        assert_eq!(saas[0].category, ScoreCategory::Hot);
    }
}
