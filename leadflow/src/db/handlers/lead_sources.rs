//! Store handler for lead sources.

use crate::db::errors::Result;
use crate::db::models::leads::LeadSource;
use crate::types::LeadSourceId;
use sqlx::SqlitePool;
use tracing::instrument;

pub struct LeadSources;

impl LeadSources {
    /// Ensure a source row exists for `(source_name, platform_type)` and
    /// return its id. Concurrent callers race safely on the unique index.
    #[instrument(skip(pool), err)]
    pub async fn ensure(
        pool: &SqlitePool,
        source_name: &str,
        industry: &str,
        platform_type: &str,
        scrape_url: &str,
    ) -> Result<LeadSourceId> {
        sqlx::query(
            "INSERT INTO lead_sources (source_name, industry, platform_type, scrape_url, active)
             VALUES (?, ?, ?, ?, 1)
             ON CONFLICT (source_name, platform_type) DO NOTHING",
        )
        .bind(source_name)
        .bind(industry)
        .bind(platform_type)
        .bind(scrape_url)
        .execute(pool)
        .await?;

        let id: LeadSourceId = sqlx::query_scalar(
            "SELECT id FROM lead_sources WHERE source_name = ? AND platform_type = ?",
        )
        .bind(source_name)
        .bind(platform_type)
        .fetch_one(pool)
        .await?;

        Ok(id)
    }

    pub async fn get(pool: &SqlitePool, id: LeadSourceId) -> Result<Option<LeadSource>> {
        let source = sqlx::query_as::<_, LeadSource>("SELECT * FROM lead_sources WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(source)
    }
}
