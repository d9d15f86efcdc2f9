//! Shared helpers for the end-to-end scenarios.
#![allow(dead_code)]

use leadflow::db::handlers::{Clients, LeadSources, QualifiedLeads, RawLeads, Repository};
use leadflow::db::models::clients::{BusinessClient, ClientCreate};
use leadflow::db::models::leads::{QualifiedLeadCreate, RawLeadCreate};
use leadflow::delivery::DeliveryEngine;
use leadflow::delivery::senders::LeadSender;
use leadflow::metrics::DeliveryMetrics;
use leadflow::types::{QualifiedLeadId, ScoreCategory};
use sqlx::SqlitePool;
use std::sync::Arc;

pub async fn memory_pool() -> SqlitePool {
    leadflow::db::connect_memory().await.expect("in-memory store")
}

pub async fn seed_client(pool: &SqlitePool, name: &str, industry: &str, whatsapp: Option<&str>) -> BusinessClient {
    let mut conn = pool.acquire().await.unwrap();
    Clients::new(&mut conn)
        .create(&ClientCreate {
            business_name: name.to_string(),
            industry: industry.to_string(),
            email: Some(format!("{name}@client.example")),
            phone: None,
            whatsapp: whatsapp.map(String::from),
        })
        .await
        .unwrap()
}

/// Seed `count` hot qualified leads in one industry, with distinct emails and
/// phones. Returns their ids in insertion order.
pub async fn seed_hot_leads(pool: &SqlitePool, industry: &str, count: usize) -> Vec<QualifiedLeadId> {
    let source_name = format!("{industry}_maps");
    let source = LeadSources::ensure(pool, &source_name, industry, "maps", "").await.unwrap();

    let items: Vec<_> = (0..count)
        .map(|i| {
            (
                RawLeadCreate {
                    name: Some(format!("L{i}")),
                    company_name: Some(format!("{industry} Co {i}")),
                    email: Some(format!("{i}@{industry}.example.com")),
                    phone: Some(format!("+1{i:07}")),
                    website: Some("https://example.com".to_string()),
                    industry: Some(industry.to_string()),
                    raw_data: Some("{}".to_string()),
                },
                None,
            )
        })
        .collect();
    let raw_ids = RawLeads::insert_batch(pool, source, &items).await.unwrap();

    let mut lead_ids = Vec::with_capacity(count);
    for (i, raw_id) in raw_ids.iter().enumerate() {
        let (id, _) = QualifiedLeads::upsert_for_raw(
            pool,
            &QualifiedLeadCreate {
                raw_lead_id: *raw_id,
                name: Some(format!("L{i}")),
                company_name: Some(format!("{industry} Co {i}")),
                phone: Some(format!("+1{i:07}")),
                whatsapp: None,
                email: Some(format!("{i}@{industry}.example.com")),
                score: 80,
                category: ScoreCategory::Hot,
                industry: Some(industry.to_string()),
                summary: String::new(),
                enriched_json: Some("{}".to_string()),
                verified: true,
            },
        )
        .await
        .unwrap();
        lead_ids.push(id);
    }
    lead_ids
}

pub fn engine_with_senders(
    pool: &SqlitePool,
    metrics: &DeliveryMetrics,
    email: Arc<dyn LeadSender>,
    whatsapp: Arc<dyn LeadSender>,
) -> DeliveryEngine {
    DeliveryEngine::new(pool.clone(), metrics.clone(), email, whatsapp)
}

/// Engine whose senders always succeed.
pub fn engine(pool: &SqlitePool, metrics: &DeliveryMetrics) -> DeliveryEngine {
    use leadflow::delivery::senders::testing::MockSender;
    engine_with_senders(
        pool,
        metrics,
        Arc::new(MockSender::default()),
        Arc::new(MockSender::default()),
    )
}
