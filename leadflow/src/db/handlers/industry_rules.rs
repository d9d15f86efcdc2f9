//! Store handler for industry qualification rules.

use crate::db::errors::Result;
use crate::db::models::leads::IndustryRule;
use sqlx::SqlitePool;
use std::collections::HashMap;

pub struct IndustryRules;

impl IndustryRules {
    pub async fn get_by_industry(pool: &SqlitePool, industry: &str) -> Result<Option<IndustryRule>> {
        let rule = sqlx::query_as::<_, IndustryRule>("SELECT * FROM industry_rules WHERE industry = ?")
            .bind(industry)
            .fetch_optional(pool)
            .await?;
        Ok(rule)
    }

    /// Fetch the scoring rules for a set of industries in one pass; industries
    /// without a rule row are absent from the map.
    pub async fn scoring_rules_for(
        pool: &SqlitePool,
        industries: &[String],
    ) -> Result<HashMap<String, String>> {
        let mut out = HashMap::new();
        for industry in industries {
            if let Some(rule) = Self::get_by_industry(pool, industry).await? {
                if let Some(scoring) = rule.scoring_rules {
                    out.insert(industry.clone(), scoring);
                }
            }
        }
        Ok(out)
    }

    pub async fn upsert(pool: &SqlitePool, industry: &str, scoring_rules: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO industry_rules (industry, scoring_rules) VALUES (?, ?)
             ON CONFLICT (industry) DO UPDATE SET scoring_rules = excluded.scoring_rules",
        )
        .bind(industry)
        .bind(scoring_rules)
        .execute(pool)
        .await?;
        Ok(())
    }
}
