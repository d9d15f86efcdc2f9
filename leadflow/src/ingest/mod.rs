//! Platform ingesters.
//!
//! Each ingester ensures its LeadSource row, captures a batch of raw leads
//! with source attribution, and inserts the batch transactionally. Pacing
//! between items derives from the configured `rate_per_minute`.

pub mod google_maps;
pub mod social;

use crate::errors::Result;
use crate::types::RawLeadId;
use async_trait::async_trait;
use sqlx::SqlitePool;

/// External platform a cycle ingests from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    LinkedIn,
    Instagram,
    GoogleMaps,
}

impl Platform {
    pub fn name(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "linkedin",
            Platform::Instagram => "instagram",
            Platform::GoogleMaps => "google_maps",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An adapter that captures one batch of raw leads.
#[async_trait]
pub trait Ingester: Send + Sync {
    fn platform(&self) -> Platform;

    /// Run one capture cycle and return the inserted raw lead ids.
    async fn run(&self, pool: &SqlitePool) -> Result<Vec<RawLeadId>>;
}

/// Seconds to sleep between items for a given rate limit.
pub(crate) fn pacing_delay(rate_per_minute: u32) -> std::time::Duration {
    std::time::Duration::from_secs_f64(60.0 / rate_per_minute.max(1) as f64)
}
