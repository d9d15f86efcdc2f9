//! Google Maps Places ingester.
//!
//! Text search for the configured query, then a details lookup per place.
//! Non-`OK`/`ZERO_RESULTS` statuses retry up to three times with 500 ms
//! spacing before the last response is taken as-is.

use crate::config::GoogleMapsConfig;
use crate::db::handlers::{LeadSources, RawLeads};
use crate::db::models::leads::RawLeadCreate;
use crate::errors::{Error, Result};
use crate::ingest::{Ingester, Platform};
use crate::types::RawLeadId;
use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{info, instrument};

const API_RETRIES: u32 = 3;
const API_RETRY_DELAY: Duration = Duration::from_millis(500);
const API_TIMEOUT: Duration = Duration::from_secs(15);
/// At most this many places are detailed per cycle.
const MAX_RESULTS: usize = 50;

pub struct GoogleMapsIngester {
    client: reqwest::Client,
    config: GoogleMapsConfig,
    base_url: String,
}

impl GoogleMapsIngester {
    pub fn new(config: GoogleMapsConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            base_url: "https://maps.googleapis.com/maps/api/place".to_string(),
        }
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// One Places API call with the status-driven retry loop.
    async fn api_get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::ConfigMissing {
                name: "GOOGLE_MAPS_API_KEY".to_string(),
            })?;

        let url = format!("{}/{path}/json", self.base_url);
        let mut last: Option<Value> = None;
        for attempt in 0..API_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(API_RETRY_DELAY).await;
            }
            let response = self
                .client
                .get(&url)
                .query(params)
                .query(&[("key", key)])
                .timeout(API_TIMEOUT)
                .send()
                .await
                .map_err(|err| {
                    if err.is_timeout() {
                        Error::ExternalTimeout {
                            service: "google_maps".to_string(),
                        }
                    } else {
                        Error::ExternalHttp {
                            service: "google_maps".to_string(),
                            message: err.to_string(),
                        }
                    }
                })?;
            let body: Value = response.json().await.map_err(|err| Error::ExternalHttp {
                service: "google_maps".to_string(),
                message: err.to_string(),
            })?;

            match body.get("status").and_then(Value::as_str) {
                Some("OK") | Some("ZERO_RESULTS") => return Ok(body),
                status => {
                    tracing::warn!(?status, attempt, "maps API returned retryable status");
                    last = Some(body);
                }
            }
        }
        Ok(last.unwrap_or_else(|| serde_json::json!({ "status": "ERROR" })))
    }
}

#[async_trait]
impl Ingester for GoogleMapsIngester {
    fn platform(&self) -> Platform {
        Platform::GoogleMaps
    }

    #[instrument(skip_all, err)]
    async fn run(&self, pool: &SqlitePool) -> Result<Vec<RawLeadId>> {
        let query = match &self.config.location {
            Some(location) if !self.config.search_term.is_empty() => {
                format!("{} in {location}", self.config.search_term)
            }
            Some(location) => location.clone(),
            None => self.config.search_term.clone(),
        };

        let search = self.api_get("textsearch", &[("query", query.as_str())]).await?;
        let results = search
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut batch = Vec::new();
        for item in results.iter().take(MAX_RESULTS) {
            let Some(place_id) = item.get("place_id").and_then(Value::as_str) else {
                continue;
            };
            let details = self
                .api_get(
                    "details",
                    &[
                        ("place_id", place_id),
                        ("fields", "name,formatted_phone_number,website,types"),
                    ],
                )
                .await?;
            let detail = details.get("result").cloned().unwrap_or(Value::Null);

            let types = detail
                .get("types")
                .and_then(Value::as_array)
                .map(|t| {
                    t.iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(",")
                })
                .unwrap_or_default();
            let industry = self.config.industry.clone().unwrap_or(types);

            batch.push((
                RawLeadCreate {
                    name: None,
                    company_name: detail.get("name").and_then(Value::as_str).map(String::from),
                    email: None,
                    phone: detail
                        .get("formatted_phone_number")
                        .and_then(Value::as_str)
                        .map(String::from),
                    website: detail.get("website").and_then(Value::as_str).map(String::from),
                    industry: Some(industry),
                    raw_data: Some(
                        serde_json::json!({ "search": item, "details": detail }).to_string(),
                    ),
                },
                None,
            ));
        }

        let source_id = LeadSources::ensure(
            pool,
            "google_maps",
            self.config.industry.as_deref().unwrap_or(""),
            "maps",
            "https://maps.googleapis.com",
        )
        .await?;
        let ids = RawLeads::insert_batch(pool, source_id, &batch).await?;
        info!(captured = ids.len(), "maps ingestion cycle complete");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(key: Option<&str>) -> GoogleMapsConfig {
        GoogleMapsConfig {
            api_key: key.map(String::from),
            search_term: "plumbers".into(),
            location: Some("Austin".into()),
            industry: Some("plumbing".into()),
        }
    }

    #[tokio::test]
    async fn missing_api_key_is_a_config_error() {
        let pool = crate::db::connect_memory().await.unwrap();
        let err = GoogleMapsIngester::new(config(None)).run(&pool).await.unwrap_err();
        assert_eq!(err.kind(), "config_missing");
    }

    #[tokio::test]
    async fn search_and_details_produce_raw_leads() {
        let server = MockServer::start().await;
        Mock::given(path("/textsearch/json"))
            .and(query_param("query", "plumbers in Austin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [{ "place_id": "p1" }, { "place_id": "p2" }]
            })))
            .mount(&server)
            .await;
        Mock::given(path("/details/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "result": {
                    "name": "Pipes R Us",
                    "formatted_phone_number": "+1 555 777 0000",
                    "website": "https://pipes.example",
                    "types": ["plumber", "store"]
                }
            })))
            .mount(&server)
            .await;

        let pool = crate::db::connect_memory().await.unwrap();
        let ingester = GoogleMapsIngester::new(config(Some("k"))).with_base_url(server.uri());
        let ids = ingester.run(&pool).await.unwrap();
        assert_eq!(ids.len(), 2);

        let lead = RawLeads::get(&pool, ids[0]).await.unwrap().unwrap();
        assert_eq!(lead.company_name.as_deref(), Some("Pipes R Us"));
        assert_eq!(lead.industry.as_deref(), Some("plumbing"));
        assert_eq!(lead.website.as_deref(), Some("https://pipes.example"));
    }

    #[tokio::test]
    async fn retryable_status_is_retried_three_times() {
        let server = MockServer::start().await;
        Mock::given(path("/textsearch/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OVER_QUERY_LIMIT",
                "results": []
            })))
            .expect(3)
            .mount(&server)
            .await;

        let pool = crate::db::connect_memory().await.unwrap();
        let ingester = GoogleMapsIngester::new(config(Some("k"))).with_base_url(server.uri());
        // The last response is taken as-is: no results, no leads, no error.
        let ids = ingester.run(&pool).await.unwrap();
        assert!(ids.is_empty());
    }
}
