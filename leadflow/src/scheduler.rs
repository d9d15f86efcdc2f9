//! Periodic tickers driving the ingestion cycles.
//!
//! A ticker enqueues one cycle job per tick and never executes business
//! logic itself. Ticks are not skipped when a prior cycle is still running;
//! intervals are expected to be conservative. The shared stop token halts
//! enqueueing; in-flight cycles complete on their own.

use crate::config::Config;
use crate::db::handlers::{Clients, IndustryRules, QualifiedLeads, RawLeads};
use crate::delivery::DeliveryEngine;
use crate::ingest::google_maps::GoogleMapsIngester;
use crate::ingest::social::SocialIngester;
use crate::ingest::{Ingester, Platform};
use crate::jobs::{Job, JobQueue};
use crate::pipeline::{Enricher, QualifierConfig, qualify, validate};
use crate::types::RawLeadId;
use crate::{billing, pipeline};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Everything a cycle needs, shared across tickers and jobs.
pub struct PipelineContext {
    pub pool: SqlitePool,
    pub config: Config,
    pub engine: Arc<DeliveryEngine>,
    pub enricher: Enricher,
}

pub struct Scheduler {
    queue: JobQueue,
    stop: CancellationToken,
}

impl Scheduler {
    pub fn new(queue: JobQueue, stop: CancellationToken) -> Self {
        Self { queue, stop }
    }

    /// Spawn one ticker per configured ingestion platform.
    pub fn start(&self, ctx: Arc<PipelineContext>) -> Vec<JoinHandle<()>> {
        let scheduler_config = &ctx.config.scheduler;
        if !scheduler_config.enabled {
            info!("ingestion tickers disabled by configuration");
            return Vec::new();
        }
        vec![
            self.spawn_ticker(
                ctx.clone(),
                Platform::LinkedIn,
                Duration::from_secs(scheduler_config.linkedin_interval_secs),
            ),
            self.spawn_ticker(
                ctx.clone(),
                Platform::Instagram,
                Duration::from_secs(scheduler_config.instagram_interval_secs),
            ),
        ]
    }

    fn spawn_ticker(
        &self,
        ctx: Arc<PipelineContext>,
        platform: Platform,
        interval: Duration,
    ) -> JoinHandle<()> {
        let queue = self.queue.clone();
        let stop = self.stop.clone();
        tokio::spawn(async move {
            info!(%platform, interval_secs = interval.as_secs(), "ticker started");
            loop {
                if stop.is_cancelled() {
                    break;
                }
                let job_ctx = ctx.clone();
                let job = Job::new(format!("{platform}-cycle"), move || {
                    run_ingestion_cycle(job_ctx.clone(), platform)
                });
                if let Err(err) = queue.enqueue(job).await {
                    warn!(%platform, error = %err, "could not enqueue cycle, ticker exiting");
                    break;
                }

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = stop.cancelled() => break,
                }
            }
            info!(%platform, "ticker stopped");
        })
    }
}

/// One full cycle: ingest, validate, qualify, enrich, persist, fan out.
#[instrument(skip(ctx), err)]
pub async fn run_ingestion_cycle(ctx: Arc<PipelineContext>, platform: Platform) -> anyhow::Result<()> {
    let ingester: Box<dyn Ingester> = match platform {
        Platform::LinkedIn => Box::new(SocialIngester::linkedin(ctx.config.ingest.linkedin.clone())),
        Platform::Instagram => {
            Box::new(SocialIngester::instagram(ctx.config.ingest.instagram.clone()))
        }
        Platform::GoogleMaps => {
            Box::new(GoogleMapsIngester::new(ctx.config.ingest.google_maps.clone()))
        }
    };

    let raw_ids = ingester.run(&ctx.pool).await?;
    let qualified_ids = process_raw_leads(&ctx, &raw_ids).await?;
    if qualified_ids.is_empty() {
        return Ok(());
    }

    // Fan out to every live client that is currently active.
    for client in Clients::fetch_all(&ctx.pool).await? {
        if !billing::is_client_active(&ctx.pool, client.id).await? {
            continue;
        }
        ctx.engine.deliver_whatsapp(client.id, &qualified_ids).await?;
        ctx.engine.deliver_email(client.id, &qualified_ids, None).await?;
    }
    Ok(())
}

/// Validate, qualify, enrich and persist a batch of raw leads. Returns the
/// qualified lead ids, existing or new.
pub async fn process_raw_leads(
    ctx: &PipelineContext,
    raw_ids: &[RawLeadId],
) -> anyhow::Result<Vec<i64>> {
    if raw_ids.is_empty() {
        return Ok(Vec::new());
    }
    let raws = RawLeads::get_bulk(&ctx.pool, raw_ids).await?;
    let validated: Vec<pipeline::ValidatedLead> = raws.iter().map(validate).collect();

    // Load and parse each distinct industry's scoring rules once.
    let mut industries: Vec<String> = validated
        .iter()
        .filter_map(|lead| lead.industry.clone())
        .collect();
    industries.sort();
    industries.dedup();
    let rules: HashMap<String, QualifierConfig> =
        IndustryRules::scoring_rules_for(&ctx.pool, &industries)
            .await?
            .into_iter()
            .map(|(industry, raw)| (industry, QualifierConfig::parse(&raw)))
            .collect();

    let websites: HashMap<RawLeadId, Option<String>> = validated
        .iter()
        .map(|lead| (lead.raw_lead_id, lead.website.clone()))
        .collect();

    let mut candidates = qualify(&validated, &rules);
    let mut qualified_ids = Vec::with_capacity(candidates.len());
    for candidate in &mut candidates {
        // Skip the probe entirely when a qualified lead already exists.
        if let Some(existing) =
            QualifiedLeads::get_by_raw(&ctx.pool, candidate.raw_lead_id).await?
        {
            qualified_ids.push(existing.id);
            continue;
        }
        let website = websites
            .get(&candidate.raw_lead_id)
            .and_then(|w| w.as_deref());
        ctx.enricher.enrich(candidate, website).await;
        let (id, _) = QualifiedLeads::upsert_for_raw(&ctx.pool, candidate).await?;
        qualified_ids.push(id);
    }
    Ok(qualified_ids)
}
