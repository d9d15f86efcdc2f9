//! Lead scoring and categorization.

use crate::db::models::leads::QualifiedLeadCreate;
use crate::pipeline::validator::ValidatedLead;
use crate::types::ScoreCategory;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Scoring configuration for one industry, parsed once from the stored
/// `scoring_rules` JSON. Every field is optional; absent fields fall back to
/// the defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QualifierConfig {
    pub weights: Weights,
    pub thresholds: Thresholds,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub email: i64,
    pub phone: i64,
    pub website: i64,
    pub keyword: i64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            email: 30,
            phone: 25,
            website: 20,
            keyword: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub hot: i64,
    pub warm: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self { hot: 75, warm: 50 }
    }
}

impl QualifierConfig {
    /// Parse a stored rules document; malformed JSON falls back to defaults.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }
}

/// Score one validated lead against a rule set.
fn score(lead: &ValidatedLead, rules: &QualifierConfig) -> (i64, ScoreCategory) {
    let mut score = 0;
    if lead.email.is_some() {
        score += rules.weights.email;
    }
    if lead.phone.is_some() {
        score += rules.weights.phone;
    }
    if lead.website.is_some() {
        score += rules.weights.website;
    }

    let haystack = format!(
        "{} {}",
        lead.company_name.as_deref().unwrap_or(""),
        lead.name.as_deref().unwrap_or("")
    )
    .to_lowercase();
    for keyword in &rules.keywords {
        if !keyword.is_empty() && haystack.contains(&keyword.to_lowercase()) {
            score += rules.weights.keyword;
        }
    }

    let score = score.clamp(0, 100);
    let category = if score >= rules.thresholds.hot {
        ScoreCategory::Hot
    } else if score >= rules.thresholds.warm {
        ScoreCategory::Warm
    } else {
        ScoreCategory::Cold
    };
    (score, category)
}

/// Qualify a batch of validated leads.
///
/// `industry_rules` maps industry -> parsed config; industries without an
/// entry score with the defaults. Within the batch, duplicates by
/// `(lower(email), phone, lower(company_name))` are dropped, first wins.
pub fn qualify(
    batch: &[ValidatedLead],
    industry_rules: &HashMap<String, QualifierConfig>,
) -> Vec<QualifiedLeadCreate> {
    let defaults = QualifierConfig::default();
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(batch.len());

    for lead in batch {
        let key = (
            lead.email.as_deref().unwrap_or("").trim().to_lowercase(),
            lead.phone.as_deref().unwrap_or("").trim().to_string(),
            lead.company_name.as_deref().unwrap_or("").trim().to_lowercase(),
        );
        if !seen.insert(key) {
            tracing::debug!(raw_lead_id = lead.raw_lead_id, "duplicate in batch, skipped");
            continue;
        }

        let rules = lead
            .industry
            .as_deref()
            .and_then(|industry| industry_rules.get(industry))
            .unwrap_or(&defaults);
        let (score, category) = score(lead, rules);

        out.push(QualifiedLeadCreate {
            raw_lead_id: lead.raw_lead_id,
            name: lead.name.clone(),
            company_name: lead.company_name.clone(),
            phone: lead.phone.clone(),
            whatsapp: None,
            email: lead.email.clone(),
            score,
            category,
            industry: lead.industry.clone(),
            summary: String::new(),
            enriched_json: None,
            verified: false,
        });
    }

    tracing::info!(input = batch.len(), output = out.len(), "qualifier processed batch");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(
        id: i64,
        email: Option<&str>,
        phone: Option<&str>,
        website: Option<&str>,
        company: &str,
    ) -> ValidatedLead {
        ValidatedLead {
            raw_lead_id: id,
            name: None,
            company_name: Some(company.to_string()),
            phone: phone.map(String::from),
            email: email.map(String::from),
            website: website.map(String::from),
            industry: Some("saas".to_string()),
        }
    }

    #[test]
    fn default_weights_and_thresholds() {
        let rules = HashMap::new();
        let full = lead(1, Some("a@b.co"), Some("1234567"), Some("https://x.co"), "Acme");
        let out = qualify(&[full], &rules);
        assert_eq!(out[0].score, 75);
        assert_eq!(out[0].category, ScoreCategory::Hot);

        let partial = lead(2, Some("a@b.co"), Some("1234567"), None, "Acme");
        let out = qualify(&[partial], &rules);
        assert_eq!(out[0].score, 55);
        assert_eq!(out[0].category, ScoreCategory::Warm);

        let bare = lead(3, None, None, None, "Acme");
        let out = qualify(&[bare], &rules);
        assert_eq!(out[0].score, 0);
        assert_eq!(out[0].category, ScoreCategory::Cold);
    }

    #[test]
    fn custom_rules_apply_and_score_clamps() {
        let mut rules = HashMap::new();
        rules.insert(
            "saas".to_string(),
            QualifierConfig::parse(
                r#"{"weights": {"email": 90, "phone": 90}, "thresholds": {"hot": 95}}"#,
            ),
        );
        let out = qualify(
            &[lead(1, Some("a@b.co"), Some("1234567"), None, "Acme")],
            &rules,
        );
        assert_eq!(out[0].score, 100);
        assert_eq!(out[0].category, ScoreCategory::Hot);
    }

    #[test]
    fn keyword_hits_count_against_company_and_name() {
        let mut rules = HashMap::new();
        rules.insert(
            "saas".to_string(),
            QualifierConfig::parse(r#"{"keywords": ["cloud", "platform"]}"#),
        );
        let out = qualify(
            &[lead(1, Some("a@b.co"), None, None, "Cloud Platform Inc")],
            &rules,
        );
        // email 30 + two keyword hits at 5 each
        assert_eq!(out[0].score, 40);
    }

    #[test]
    fn malformed_rules_fall_back_to_defaults() {
        let parsed = QualifierConfig::parse("{not json");
        assert_eq!(parsed.weights.email, 30);
        assert_eq!(parsed.thresholds.warm, 50);
    }

    #[test]
    fn batch_dedup_keeps_first() {
        let rules = HashMap::new();
        let out = qualify(
            &[
                lead(1, Some("Same@x.co"), Some("1234567"), None, "Acme"),
                lead(2, Some("same@x.co"), Some("1234567"), None, "ACME"),
                lead(3, Some("other@x.co"), Some("1234567"), None, "Acme"),
            ],
            &rules,
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].raw_lead_id, 1);
        assert_eq!(out[1].raw_lead_id, 3);
    }
}
