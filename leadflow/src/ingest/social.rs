//! Social platform ingesters (LinkedIn, Instagram).
//!
//! These platforms have no sanctioned scraping API, so capture is
//! fixture-driven: a JSON import file when configured, otherwise a
//! deterministic sample batch that keeps development pipelines flowing.

use crate::config::PlatformIngestConfig;
use crate::db::handlers::{LeadSources, RawLeads};
use crate::db::models::leads::{AttributionCreate, RawLeadCreate};
use crate::errors::Result;
use crate::ingest::{Ingester, Platform, pacing_delay};
use crate::types::RawLeadId;
use async_trait::async_trait;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};

/// One captured profile, as found in an import file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SocialItem {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    /// Secondary industry hint used by some exports.
    pub category: Option<String>,
    pub profile: Option<String>,
    pub campaign: Option<String>,
}

pub struct SocialIngester {
    platform: Platform,
    source_name: &'static str,
    scrape_url: &'static str,
    profile_base: &'static str,
    default_industry: &'static str,
    config: PlatformIngestConfig,
}

impl SocialIngester {
    pub fn linkedin(config: PlatformIngestConfig) -> Self {
        Self {
            platform: Platform::LinkedIn,
            source_name: "linkedin",
            scrape_url: "https://www.linkedin.com",
            profile_base: "https://www.linkedin.com/company",
            default_industry: "saas",
            config,
        }
    }

    pub fn instagram(config: PlatformIngestConfig) -> Self {
        Self {
            platform: Platform::Instagram,
            source_name: "instagram",
            scrape_url: "https://www.instagram.com",
            profile_base: "https://www.instagram.com",
            default_industry: "restaurants",
            config,
        }
    }

    /// Items for this cycle: the import file when configured, otherwise the
    /// generated sample batch.
    fn items(&self) -> Vec<SocialItem> {
        if let Some(path) = &self.config.import_path {
            match std::fs::read_to_string(path) {
                Ok(contents) => match serde_json::from_str::<Vec<SocialItem>>(&contents) {
                    Ok(items) => {
                        let mut items = items;
                        items.truncate(self.config.limit);
                        return items;
                    }
                    Err(err) => {
                        tracing::warn!(path, error = %err, "import file unreadable, using sample batch");
                    }
                },
                Err(err) => {
                    tracing::warn!(path, error = %err, "import file missing, using sample batch");
                }
            }
        }

        (0..self.config.limit)
            .map(|i| SocialItem {
                name: Some(format!("Company {i}")),
                email: Some(format!("contact{i}@example.com")),
                phone: Some(format!("+1{i:07}")),
                website: Some(format!("https://example{i}.com")),
                industry: Some(self.default_industry.to_string()),
                category: None,
                profile: Some(format!("{}/example-{i}/", self.profile_base)),
                campaign: Some(self.config.query.clone()),
            })
            .collect()
    }
}

#[async_trait]
impl Ingester for SocialIngester {
    fn platform(&self) -> Platform {
        self.platform
    }

    #[instrument(skip_all, fields(platform = %self.platform), err)]
    async fn run(&self, pool: &SqlitePool) -> Result<Vec<RawLeadId>> {
        let source_id =
            LeadSources::ensure(pool, self.source_name, "", "social", self.scrape_url).await?;

        let delay = pacing_delay(self.config.rate_per_minute);
        let items = self.items();
        let mut batch = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(delay).await;
            }
            let raw_data = serde_json::json!({
                "name": &item.name,
                "profile": &item.profile,
                "campaign": &item.campaign,
            })
            .to_string();
            batch.push((
                RawLeadCreate {
                    name: item.name.clone(),
                    company_name: item.name,
                    email: item.email,
                    phone: item.phone,
                    website: item.website,
                    industry: item.industry.or(item.category),
                    raw_data: Some(raw_data),
                },
                Some(AttributionCreate {
                    platform: self.platform.name().to_string(),
                    reference_url: item.profile,
                    campaign: item.campaign,
                }),
            ));
        }

        let ids = RawLeads::insert_batch(pool, source_id, &batch).await?;
        info!(platform = %self.platform, captured = ids.len(), "ingestion cycle complete");
        Ok(ids)
    }
}
