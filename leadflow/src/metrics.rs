//! Delivery counters and their text exposition.
//!
//! Four counter families keyed by `(client_id, method, industry)`, backing
//! the `GET /metrics` scrape endpoint. Increment and read paths go through
//! the registry, which handles the locking; `render` produces the standard
//! `text/plain; version=0.0.4` exposition.

use crate::types::{ClientId, DeliveryMethod};
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

const LABELS: [&str; 3] = ["client_id", "method", "industry"];

#[derive(Clone)]
pub struct DeliveryMetrics {
    delivered: IntCounterVec,
    skipped_cap: IntCounterVec,
    skipped_inactive: IntCounterVec,
    trial_used: IntCounterVec,
    registry: Registry,
}

impl DeliveryMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let make = |name: &str, help: &str| -> Result<IntCounterVec, prometheus::Error> {
            let counter = IntCounterVec::new(Opts::new(name, help), &LABELS)?;
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        };

        Ok(Self {
            delivered: make("leadgen_delivered_total", "Leads delivered to clients")?,
            skipped_cap: make("leadgen_skipped_cap_total", "Deliveries skipped by a monthly cap")?,
            skipped_inactive: make(
                "leadgen_skipped_inactive_total",
                "Deliveries skipped because the client is inactive",
            )?,
            trial_used: make("leadgen_trial_used_total", "Leads delivered under a trial pack")?,
            registry,
        })
    }

    fn labels<'a>(client_id: &'a str, method: DeliveryMethod, industry: &'a str) -> [&'a str; 3] {
        [client_id, method.as_str(), industry]
    }

    pub fn inc_delivered(&self, client_id: ClientId, method: DeliveryMethod, industry: &str) {
        let id = client_id.to_string();
        self.delivered
            .with_label_values(&Self::labels(&id, method, industry))
            .inc();
    }

    pub fn inc_skipped_cap(&self, client_id: ClientId, method: DeliveryMethod, industry: &str) {
        let id = client_id.to_string();
        self.skipped_cap
            .with_label_values(&Self::labels(&id, method, industry))
            .inc();
    }

    pub fn inc_skipped_inactive(&self, client_id: ClientId, method: DeliveryMethod, industry: &str) {
        let id = client_id.to_string();
        self.skipped_inactive
            .with_label_values(&Self::labels(&id, method, industry))
            .inc();
    }

    pub fn inc_trial_used(&self, client_id: ClientId, method: DeliveryMethod, industry: &str) {
        let id = client_id.to_string();
        self.trial_used
            .with_label_values(&Self::labels(&id, method, industry))
            .inc();
    }

    /// Current value of one counter family for a label set. Reads go through
    /// the registry's own synchronization and never block writers for long.
    pub fn value(
        &self,
        family: CounterFamily,
        client_id: ClientId,
        method: DeliveryMethod,
        industry: &str,
    ) -> u64 {
        let id = client_id.to_string();
        let labels = Self::labels(&id, method, industry);
        let counter = match family {
            CounterFamily::Delivered => &self.delivered,
            CounterFamily::SkippedCap => &self.skipped_cap,
            CounterFamily::SkippedInactive => &self.skipped_inactive,
            CounterFamily::TrialUsed => &self.trial_used,
        };
        counter.with_label_values(&labels).get()
    }

    /// Render the full exposition text for the scrape endpoint.
    pub fn render(&self) -> String {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(err) = encoder.encode(&families, &mut buffer) {
            tracing::error!(error = %err, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// The four delivery counter families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterFamily {
    Delivered,
    SkippedCap,
    SkippedInactive,
    TrialUsed,
}
