//! Store queries for pipeline conversion and engagement aggregates.
//!
//! All three aggregates are computed on demand from the stored entities.
//! Every ratio is numerator/denominator with 0.0 on an empty denominator.

use crate::db::errors::Result;
use crate::db::handlers::Suppressions;
use crate::db::models::analytics::{DeliveryConversion, EngagementStats, PlatformConversion};
use crate::types::ClientId;
use sqlx::{FromRow, SqlitePool};
use std::collections::{HashMap, HashSet};

#[derive(FromRow)]
struct PlatformCountRow {
    platform_type: String,
    count: i64,
}

#[derive(FromRow)]
struct ClientPlatformCountRow {
    business_client_id: ClientId,
    platform_type: String,
    count: i64,
}

#[derive(FromRow)]
struct EngagementRow {
    business_client_id: ClientId,
    platform_type: String,
    delivery_method: String,
    opened: bool,
    email: Option<String>,
    phone: Option<String>,
}

fn rate(numerator: i64, denominator: i64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

pub struct Analytics;

impl Analytics {
    /// raw -> qualified conversion grouped by platform type.
    pub async fn lead_to_qualified_by_platform(
        pool: &SqlitePool,
    ) -> Result<HashMap<String, PlatformConversion>> {
        let raw = sqlx::query_as::<_, PlatformCountRow>(
            "SELECT s.platform_type AS platform_type, COUNT(*) AS count
             FROM raw_leads r JOIN lead_sources s ON s.id = r.source_id
             GROUP BY s.platform_type",
        )
        .fetch_all(pool)
        .await?;

        let qualified = sqlx::query_as::<_, PlatformCountRow>(
            "SELECT s.platform_type AS platform_type, COUNT(*) AS count
             FROM qualified_leads q
             JOIN raw_leads r ON r.id = q.raw_lead_id
             JOIN lead_sources s ON s.id = r.source_id
             GROUP BY s.platform_type",
        )
        .fetch_all(pool)
        .await?;
        let qualified: HashMap<String, i64> =
            qualified.into_iter().map(|r| (r.platform_type, r.count)).collect();

        Ok(raw
            .into_iter()
            .map(|row| {
                let q = qualified.get(&row.platform_type).copied().unwrap_or(0);
                (
                    row.platform_type,
                    PlatformConversion {
                        raw: row.count,
                        qualified: q,
                        rate: rate(q, row.count),
                    },
                )
            })
            .collect())
    }

    /// qualified -> delivered conversion grouped by (client, platform type).
    /// The denominator is the platform's total qualified count.
    pub async fn qualified_to_delivered_by_client_platform(
        pool: &SqlitePool,
    ) -> Result<HashMap<ClientId, HashMap<String, DeliveryConversion>>> {
        let qualified = sqlx::query_as::<_, PlatformCountRow>(
            "SELECT s.platform_type AS platform_type, COUNT(*) AS count
             FROM qualified_leads q
             JOIN raw_leads r ON r.id = q.raw_lead_id
             JOIN lead_sources s ON s.id = r.source_id
             GROUP BY s.platform_type",
        )
        .fetch_all(pool)
        .await?;
        let qualified: HashMap<String, i64> =
            qualified.into_iter().map(|r| (r.platform_type, r.count)).collect();

        let delivered = sqlx::query_as::<_, ClientPlatformCountRow>(
            "SELECT d.business_client_id AS business_client_id,
                    s.platform_type AS platform_type,
                    COUNT(*) AS count
             FROM delivered_leads d
             JOIN qualified_leads q ON q.id = d.qualified_lead_id
             JOIN raw_leads r ON r.id = q.raw_lead_id
             JOIN lead_sources s ON s.id = r.source_id
             GROUP BY d.business_client_id, s.platform_type",
        )
        .fetch_all(pool)
        .await?;

        let mut out: HashMap<ClientId, HashMap<String, DeliveryConversion>> = HashMap::new();
        for row in delivered {
            let denom = qualified.get(&row.platform_type).copied().unwrap_or(0);
            out.entry(row.business_client_id).or_default().insert(
                row.platform_type,
                DeliveryConversion {
                    qualified: denom,
                    delivered: row.count,
                    rate: rate(row.count, denom),
                },
            );
        }
        Ok(out)
    }

    /// delivered -> opened/bounced rates grouped by
    /// (client, platform type, method).
    ///
    /// Bounces are matched by (method, lowercased target) across all time
    /// against the set of targets delivered in the group.
    pub async fn engagement_by_client_platform_method(
        pool: &SqlitePool,
    ) -> Result<HashMap<ClientId, HashMap<String, HashMap<String, EngagementStats>>>> {
        let rows = sqlx::query_as::<_, EngagementRow>(
            "SELECT d.business_client_id AS business_client_id,
                    s.platform_type AS platform_type,
                    d.delivery_method AS delivery_method,
                    d.opened AS opened,
                    q.email AS email,
                    q.phone AS phone
             FROM delivered_leads d
             JOIN qualified_leads q ON q.id = d.qualified_lead_id
             JOIN raw_leads r ON r.id = q.raw_lead_id
             JOIN lead_sources s ON s.id = r.source_id",
        )
        .fetch_all(pool)
        .await?;

        type GroupKey = (ClientId, String, String);
        let mut delivered: HashMap<GroupKey, i64> = HashMap::new();
        let mut opened: HashMap<GroupKey, i64> = HashMap::new();
        let mut targets: HashMap<GroupKey, HashSet<(String, String)>> = HashMap::new();

        for row in rows {
            let key = (
                row.business_client_id,
                row.platform_type.clone(),
                row.delivery_method.clone(),
            );
            *delivered.entry(key.clone()).or_default() += 1;
            if row.opened {
                *opened.entry(key.clone()).or_default() += 1;
            }
            match row.delivery_method.as_str() {
                "email" => {
                    if let Some(email) = &row.email {
                        targets
                            .entry(key)
                            .or_default()
                            .insert(("email".to_string(), email.to_lowercase()));
                    }
                }
                "whatsapp" => {
                    if let Some(phone) = &row.phone {
                        targets
                            .entry(key)
                            .or_default()
                            .insert(("whatsapp".to_string(), phone.to_lowercase()));
                    }
                }
                _ => {}
            }
        }

        let bounce_counts = Suppressions::bounce_counts(pool).await?;

        let mut out: HashMap<ClientId, HashMap<String, HashMap<String, EngagementStats>>> =
            HashMap::new();
        for (key, dcount) in delivered {
            let ocount = opened.get(&key).copied().unwrap_or(0);
            let bcount = targets
                .get(&key)
                .map(|set| {
                    set.iter()
                        .map(|t| bounce_counts.get(t).copied().unwrap_or(0))
                        .sum()
                })
                .unwrap_or(0);
            let (client_id, platform, method) = key;
            out.entry(client_id).or_default().entry(platform).or_default().insert(
                method,
                EngagementStats {
                    delivered: dcount,
                    opened: ocount,
                    bounced: bcount,
                    open_rate: rate(ocount, dcount),
                    bounce_rate: rate(bcount, dcount),
                },
            );
        }
        Ok(out)
    }
}
