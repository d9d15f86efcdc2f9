//! Website enrichment probe.
//!
//! One bounded GET against the lead's website, scanning the first bytes for
//! engagement keywords. Network failures never propagate: they degrade the
//! result to `site_ok = false`. Re-running enrichment overwrites the
//! previous values.

use crate::db::models::leads::QualifiedLeadCreate;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROBE_TIMEOUT: Duration = Duration::from_secs(8);
/// Only this prefix of the body is scanned for keywords.
const SCAN_BYTES: usize = 5_000;
const KEYWORDS: [&str; 4] = ["contact", "review", "rating", "about"];

/// Enrichment outputs persisted as `enriched_json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Enrichment {
    pub site_ok: bool,
    pub content_len: usize,
    pub keywords: Vec<String>,
}

/// Prefix `http://` when the website has no scheme.
fn ensure_scheme(website: &str) -> String {
    if website.contains("://") {
        website.to_string()
    } else {
        format!("http://{website}")
    }
}

/// Scan the first [`SCAN_BYTES`] of a body for known keywords.
fn scan_keywords(body: &[u8]) -> Vec<String> {
    let prefix = &body[..body.len().min(SCAN_BYTES)];
    let text = String::from_utf8_lossy(prefix).to_lowercase();
    KEYWORDS
        .iter()
        .filter(|k| text.contains(**k))
        .map(|k| k.to_string())
        .collect()
}

pub struct Enricher {
    client: reqwest::Client,
}

impl Default for Enricher {
    fn default() -> Self {
        Self::new()
    }
}

impl Enricher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Probe a website. Always returns a result; errors degrade it.
    pub async fn probe(&self, website: &str) -> Enrichment {
        let url = ensure_scheme(website);
        let response = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match response {
            Ok(resp) => match resp.bytes().await {
                Ok(body) => Enrichment {
                    site_ok: true,
                    content_len: body.len(),
                    keywords: scan_keywords(&body),
                },
                Err(err) => {
                    tracing::debug!(url, error = %err, "failed to read probe body");
                    Enrichment::default()
                }
            },
            Err(err) => {
                tracing::debug!(url, error = %err, "site probe failed");
                Enrichment::default()
            }
        }
    }

    /// Enrich one qualified candidate in place: fills `summary`,
    /// `enriched_json` and `verified`. A lead without a website gets the
    /// degraded result immediately.
    pub async fn enrich(&self, candidate: &mut QualifiedLeadCreate, website: Option<&str>) {
        let enrichment = match website {
            Some(site) if !site.trim().is_empty() => self.probe(site).await,
            _ => Enrichment::default(),
        };

        candidate.summary = format!(
            "site_ok={}, content_len={}",
            enrichment.site_ok, enrichment.content_len
        );
        candidate.verified = enrichment.site_ok;
        candidate.enriched_json =
            Some(serde_json::to_string(&enrichment).unwrap_or_else(|_| "{}".to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreCategory;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate() -> QualifiedLeadCreate {
        QualifiedLeadCreate {
            raw_lead_id: 1,
            name: None,
            company_name: None,
            phone: None,
            whatsapp: None,
            email: None,
            score: 75,
            category: ScoreCategory::Hot,
            industry: Some("saas".into()),
            summary: String::new(),
            enriched_json: None,
            verified: false,
        }
    }

    #[test]
    fn scheme_is_prefixed_when_missing() {
        assert_eq!(ensure_scheme("example.com"), "http://example.com");
        assert_eq!(ensure_scheme("https://example.com"), "https://example.com");
    }

    #[test]
    fn keyword_scan_only_sees_the_prefix() {
        let mut body = b"our contact page and ratings".to_vec();
        assert_eq!(scan_keywords(&body), vec!["contact", "rating"]);

        // Push a keyword past the scan window; it must not be found.
        body = vec![b' '; SCAN_BYTES];
        body.extend_from_slice(b"about us");
        assert!(scan_keywords(&body).is_empty());
    }

    #[tokio::test]
    async fn successful_probe_marks_verified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Contact us for a review"))
            .mount(&server)
            .await;

        let enricher = Enricher::new();
        let mut cand = candidate();
        enricher.enrich(&mut cand, Some(&server.uri())).await;

        assert!(cand.verified);
        assert_eq!(cand.summary, "site_ok=true, content_len=23");
        let enrichment: Enrichment =
            serde_json::from_str(cand.enriched_json.as_deref().unwrap()).unwrap();
        assert_eq!(enrichment.keywords, vec!["contact", "review"]);
    }

    #[tokio::test]
    async fn http_error_degrades_instead_of_failing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let enricher = Enricher::new();
        let mut cand = candidate();
        enricher.enrich(&mut cand, Some(&server.uri())).await;

        assert!(!cand.verified);
        assert_eq!(cand.summary, "site_ok=false, content_len=0");
    }

    #[tokio::test]
    async fn missing_website_degrades_immediately() {
        let enricher = Enricher::new();
        let mut cand = candidate();
        enricher.enrich(&mut cand, None).await;
        assert!(!cand.verified);
        assert_eq!(
            cand.enriched_json.as_deref(),
            Some(r#"{"site_ok":false,"content_len":0,"keywords":[]}"#)
        );
    }
}
