//! Lead entities: sources, raw captures, attributions and qualified leads.

use crate::types::{LeadSourceId, QualifiedLeadId, RawLeadId, ScoreCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A platform a lead was captured from.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeadSource {
    pub id: LeadSourceId,
    pub source_name: String,
    pub industry: String,
    pub platform_type: String,
    pub scrape_url: String,
    pub active: bool,
}

/// Unvalidated business contact, immutable once inserted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RawLead {
    pub id: RawLeadId,
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub source_id: LeadSourceId,
    pub captured_at: DateTime<Utc>,
    pub raw_data: Option<String>,
}

/// Insert request for one captured lead.
#[derive(Debug, Clone, Default)]
pub struct RawLeadCreate {
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub industry: Option<String>,
    pub raw_data: Option<String>,
}

/// Provenance record attached to a raw lead when attribution is known.
#[derive(Debug, Clone, Default)]
pub struct AttributionCreate {
    pub platform: String,
    pub reference_url: Option<String>,
    pub campaign: Option<String>,
}

/// Scored, categorized lead eligible for delivery. At most one per raw lead.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QualifiedLead {
    pub id: QualifiedLeadId,
    pub raw_lead_id: RawLeadId,
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub score: i64,
    pub category: ScoreCategory,
    pub industry: Option<String>,
    pub summary: String,
    pub enriched_json: Option<String>,
    pub verified: bool,
}

/// Upsert request produced by the qualifier/enricher pair.
#[derive(Debug, Clone)]
pub struct QualifiedLeadCreate {
    pub raw_lead_id: RawLeadId,
    pub name: Option<String>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub email: Option<String>,
    pub score: i64,
    pub category: ScoreCategory,
    pub industry: Option<String>,
    pub summary: String,
    pub enriched_json: Option<String>,
    pub verified: bool,
}

/// Industry-specific qualification configuration row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IndustryRule {
    pub id: i64,
    pub industry: String,
    pub qualification_questions: Option<String>,
    pub scoring_rules: Option<String>,
    pub enrichment_notes: Option<String>,
}
