//! The delivery engine: the per-(client, channel) gate in front of every
//! send.
//!
//! Each candidate passes, in order: client resolution, opt-out suppression,
//! activity, the monthly cap (subscription or pay-per-lead), the trial
//! override, and finally the send attempt. Candidates are processed
//! sequentially within one invocation so cap counters advanced by earlier
//! candidates are visible to later ones; invocations for the same client
//! serialize on a per-client lock, and monthly counts are re-read at the
//! start of each invocation.

pub mod senders;

use crate::db::handlers::{Clients, Deliveries, Payments, QualifiedLeads, Suppressions};
use crate::db::models::leads::QualifiedLead;
use crate::errors::{Error, Result};
use crate::metrics::DeliveryMetrics;
use crate::types::{ClientId, DeliveryMethod, QualifiedLeadId};
use crate::{billing, pricing};
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use dashmap::DashMap;
use senders::LeadSender;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Terminal state of one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Delivered,
    Skipped,
    Failed,
}

/// Machine-readable reasons for the skip branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OptOut,
    Inactive,
    CapReachedSubscription,
    CapReachedPpl,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::OptOut => "opt_out",
            SkipReason::Inactive => "inactive",
            SkipReason::CapReachedSubscription => "cap_reached_subscription",
            SkipReason::CapReachedPpl => "cap_reached_ppl",
        }
    }
}

/// Outcome record for one candidate.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DeliveryOutcome {
    pub lead_id: QualifiedLeadId,
    pub status: DeliveryStatus,
    pub reason: Option<String>,
    pub price: Option<f64>,
}

impl DeliveryOutcome {
    fn delivered(lead_id: QualifiedLeadId, price: f64) -> Self {
        Self {
            lead_id,
            status: DeliveryStatus::Delivered,
            reason: None,
            price: Some(price),
        }
    }

    fn skipped(lead_id: QualifiedLeadId, reason: SkipReason) -> Self {
        Self {
            lead_id,
            status: DeliveryStatus::Skipped,
            reason: Some(reason.as_str().to_string()),
            price: None,
        }
    }

    fn failed(lead_id: QualifiedLeadId, error: &str) -> Self {
        Self {
            lead_id,
            status: DeliveryStatus::Failed,
            reason: Some(format!("error:{error}")),
            price: None,
        }
    }
}

/// Calendar month containing `now`, as `[first_of_month, first_of_next)`.
pub(crate) fn month_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .unwrap();
    let (year, month) = if now.month() == 12 {
        (now.year() + 1, 1)
    } else {
        (now.year(), now.month() + 1)
    };
    let end = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap();
    (start, end)
}

pub struct DeliveryEngine {
    pool: SqlitePool,
    metrics: DeliveryMetrics,
    email_sender: Arc<dyn LeadSender>,
    whatsapp_sender: Arc<dyn LeadSender>,
    client_locks: DashMap<ClientId, Arc<tokio::sync::Mutex<()>>>,
}

impl DeliveryEngine {
    pub fn new(
        pool: SqlitePool,
        metrics: DeliveryMetrics,
        email_sender: Arc<dyn LeadSender>,
        whatsapp_sender: Arc<dyn LeadSender>,
    ) -> Self {
        Self {
            pool,
            metrics,
            email_sender,
            whatsapp_sender,
            client_locks: DashMap::new(),
        }
    }

    /// Deliver leads to a client over WhatsApp. Empty `qualified_ids` selects
    /// hot/warm leads in the client's industry.
    pub async fn deliver_whatsapp(
        &self,
        client_id: ClientId,
        qualified_ids: &[QualifiedLeadId],
    ) -> Result<Vec<DeliveryOutcome>> {
        self.deliver(client_id, DeliveryMethod::WhatsApp, qualified_ids, None)
            .await
    }

    /// Deliver leads to a client over email, with an optional message
    /// template (`{name}`, `{company_name}`, `{email}`, `{phone}`
    /// placeholders).
    pub async fn deliver_email(
        &self,
        client_id: ClientId,
        qualified_ids: &[QualifiedLeadId],
        template: Option<&str>,
    ) -> Result<Vec<DeliveryOutcome>> {
        self.deliver(client_id, DeliveryMethod::Email, qualified_ids, template)
            .await
    }

    /// Record a dashboard delivery: idempotent, no send attempt, exempt from
    /// the gate.
    pub async fn record_dashboard_delivery(
        &self,
        qualified_lead_id: QualifiedLeadId,
        client_id: ClientId,
    ) -> Result<Option<crate::types::DeliveryId>> {
        let recorded =
            Deliveries::record(&self.pool, qualified_lead_id, client_id, DeliveryMethod::Dashboard)
                .await?;
        Ok(recorded.map(|r| r.id))
    }

    #[instrument(skip(self, qualified_ids, template), err)]
    async fn deliver(
        &self,
        client_id: ClientId,
        method: DeliveryMethod,
        qualified_ids: &[QualifiedLeadId],
        template: Option<&str>,
    ) -> Result<Vec<DeliveryOutcome>> {
        if method == DeliveryMethod::Dashboard {
            return Err(Error::BadRequest {
                message: "dashboard deliveries are recorded, not sent".to_string(),
            });
        }

        // Invocations for the same client serialize; counters are re-read
        // below once the lock is held.
        let lock = self
            .client_locks
            .entry(client_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let now = Utc::now();
        let (month_start, month_end) = month_window(now);

        let Some(client) = Clients::fetch(&self.pool, client_id).await? else {
            tracing::info!(client_id, "delivery skipped: client missing or deleted");
            return Ok(Vec::new());
        };

        let active = billing::is_client_active(&self.pool, client_id).await?;
        let plan = client.subscription_plan.as_deref().and_then(pricing::plan);

        // Trial window state, pre-read once per invocation.
        let mut trial_active = false;
        let mut trial_used: i64 = 0;
        if let Some(trial) = Payments::trial_payment(&self.pool, client_id).await? {
            let deadline = trial.payment_date + Duration::days(pricing::TRIAL_CONFIG.days_valid);
            if now <= deadline {
                trial_active = true;
                trial_used = Deliveries::count_in_trial_window(
                    &self.pool,
                    client_id,
                    trial.payment_date,
                    deadline,
                )
                .await?;
            }
        }

        let candidates: Vec<QualifiedLead> = if qualified_ids.is_empty() {
            QualifiedLeads::list_candidates(&self.pool, &client.industry).await?
        } else {
            QualifiedLeads::get_bulk(&self.pool, qualified_ids).await?
        };

        let mut delivered_this_month =
            Deliveries::count_for_month(&self.pool, client_id, month_start, month_end).await?;
        // Pay-per-lead counts, loaded lazily per tier within this invocation.
        let mut tier_counts: HashMap<crate::types::Tier, i64> = HashMap::new();

        let mut outcomes = Vec::with_capacity(candidates.len());
        for lead in &candidates {
            let industry = lead.industry.clone().unwrap_or_default();

            // Channel-specific target: the lead's email, or the client's
            // WhatsApp number falling back to the lead's phone.
            let raw_target = match method {
                DeliveryMethod::Email => lead.email.clone().unwrap_or_default(),
                _ => client
                    .whatsapp
                    .clone()
                    .or_else(|| lead.phone.clone())
                    .unwrap_or_default(),
            };
            let target = raw_target.trim().to_lowercase();

            if !target.is_empty()
                && Suppressions::is_opted_out(&self.pool, method, &target).await?
            {
                outcomes.push(DeliveryOutcome::skipped(lead.id, SkipReason::OptOut));
                continue;
            }

            if !active && !trial_active && plan.is_none() {
                outcomes.push(DeliveryOutcome::skipped(lead.id, SkipReason::Inactive));
                self.metrics.inc_skipped_inactive(client_id, method, &industry);
                continue;
            }

            let tier = pricing::tier_for(&industry);
            let mut price;
            if let Some(plan) = plan {
                if delivered_this_month >= plan.lead_cap {
                    outcomes.push(DeliveryOutcome::skipped(
                        lead.id,
                        SkipReason::CapReachedSubscription,
                    ));
                    self.metrics.inc_skipped_cap(client_id, method, &industry);
                    continue;
                }
                price = pricing::discounted_lead_price(tier, plan);
            } else {
                if !tier_counts.contains_key(&tier) {
                    let count = Deliveries::count_for_month_industry(
                        &self.pool,
                        client_id,
                        &industry,
                        month_start,
                        month_end,
                    )
                    .await?;
                    tier_counts.insert(tier, count);
                }
                if tier_counts[&tier] >= pricing::pay_per_lead_cap(tier) {
                    outcomes.push(DeliveryOutcome::skipped(lead.id, SkipReason::CapReachedPpl));
                    self.metrics.inc_skipped_cap(client_id, method, &industry);
                    continue;
                }
                price = pricing::lead_price(tier);
            }

            if trial_active && trial_used < pricing::TRIAL_CONFIG.leads {
                price = 0.0;
                trial_used += 1;
                self.metrics.inc_trial_used(client_id, method, &industry);
            }

            let sender: &Arc<dyn LeadSender> = match method {
                DeliveryMethod::Email => &self.email_sender,
                _ => &self.whatsapp_sender,
            };
            let body = render_message(lead, template);
            match sender.send(&raw_target, "New qualified lead", &body).await {
                Ok(()) => {
                    // Duplicate inserts resolve to the existing row; the send
                    // above is never retried for them.
                    Deliveries::record(&self.pool, lead.id, client_id, method).await?;
                    delivered_this_month += 1;
                    if plan.is_none() {
                        *tier_counts.entry(tier).or_insert(0) += 1;
                    }
                    outcomes.push(DeliveryOutcome::delivered(lead.id, price));
                    self.metrics.inc_delivered(client_id, method, &industry);
                }
                Err(err) => {
                    let reason = err.to_string();
                    if let Err(db_err) =
                        Suppressions::add_bounce(&self.pool, method, &target, &reason).await
                    {
                        tracing::error!(error = %db_err, "failed to record bounce");
                    }
                    outcomes.push(DeliveryOutcome::failed(lead.id, &reason));
                }
            }
        }

        let delivered = outcomes
            .iter()
            .filter(|o| o.status == DeliveryStatus::Delivered)
            .count();
        tracing::info!(
            client_id,
            method = %method,
            processed = candidates.len(),
            delivered,
            trial_used,
            "delivery pass complete"
        );
        Ok(outcomes)
    }
}

/// Render the outbound message body. Without a template, a terse default.
fn render_message(lead: &QualifiedLead, template: Option<&str>) -> String {
    let name = lead.name.as_deref().unwrap_or("");
    let company = lead.company_name.as_deref().unwrap_or("");
    match template {
        Some(template) => template
            .replace("{name}", name)
            .replace("{company_name}", company)
            .replace("{email}", lead.email.as_deref().unwrap_or(""))
            .replace("{phone}", lead.phone.as_deref().unwrap_or("")),
        None if company.is_empty() => "New qualified lead".to_string(),
        None => format!("New qualified lead: {company}"),
    }
}
