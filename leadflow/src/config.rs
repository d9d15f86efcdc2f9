//! Application configuration management.
//!
//! Configuration merges, later sources overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. YAML config file (default `config.yaml`, `-f` flag or `LEADFLOW_CONFIG`)
//! 3. `LEADFLOW_`-prefixed environment variables, `__` for nesting
//!    (e.g. `LEADFLOW_DATABASE__URL`)
//! 4. Well-known bare environment variables (`DATABASE_URL`, `DB_*`,
//!    `WORKER_COUNT`, `METRICS_PORT`, `WEBHOOK_PORT`, scrape intervals,
//!    rate limits and sender credentials)

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Yaml},
};
use serde::{Deserialize, Serialize};

/// Simple CLI args - just for specifying the config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "LEADFLOW_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Host the webhook server binds to
    pub webhook_host: String,
    /// Port for the inbound provider webhooks
    pub webhook_port: u16,
    /// Host the metrics scrape endpoint binds to
    pub metrics_host: String,
    /// Port for the metrics scrape endpoint
    pub metrics_port: u16,
    /// Worker pool size
    pub worker_count: usize,
    /// Bounded job queue capacity
    pub queue_capacity: usize,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub ingest: IngestConfig,
    pub senders: SendersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webhook_host: "0.0.0.0".to_string(),
            webhook_port: 8080,
            metrics_host: "127.0.0.1".to_string(),
            metrics_port: 8000,
            worker_count: 2,
            queue_capacity: 256,
            database: DatabaseConfig::default(),
            scheduler: SchedulerConfig::default(),
            ingest: IngestConfig::default(),
            senders: SendersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Store URL. Defaults to a local file store; `DATABASE_URL` overrides
    /// it, and `DB_HOST`/`DB_PORT`/`DB_NAME`/`DB_USER`/`DB_PASS` compose a
    /// server URL for external deployments.
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://leadflow.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Master switch for the ingestion tickers
    pub enabled: bool,
    /// Seconds between LinkedIn ingestion cycles
    pub linkedin_interval_secs: u64,
    /// Seconds between Instagram ingestion cycles
    pub instagram_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            linkedin_interval_secs: 3600,
            instagram_interval_secs: 3600,
        }
    }
}

/// Per-platform ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlatformIngestConfig {
    /// Search query / campaign tag attached to captured leads
    pub query: String,
    /// Max items per cycle
    pub limit: usize,
    /// Pacing: one item per `60/rate_per_minute` seconds
    pub rate_per_minute: u32,
    /// Optional JSON fixture file consumed instead of a live fetch
    pub import_path: Option<String>,
}

impl PlatformIngestConfig {
    fn with_query(query: &str) -> Self {
        Self {
            query: query.to_string(),
            limit: 25,
            rate_per_minute: 60,
            import_path: None,
        }
    }
}

impl Default for PlatformIngestConfig {
    fn default() -> Self {
        Self::with_query("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct GoogleMapsConfig {
    pub api_key: Option<String>,
    pub search_term: String,
    pub location: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    pub linkedin: PlatformIngestConfig,
    pub instagram: PlatformIngestConfig,
    pub google_maps: GoogleMapsConfig,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            linkedin: PlatformIngestConfig::with_query("saas"),
            instagram: PlatformIngestConfig::with_query("restaurants"),
            google_maps: GoogleMapsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub whatsapp_from: Option<String>,
    /// Public URL of the Twilio webhook endpoint, used for signature
    /// verification. Falls back to reconstructing from the Host header.
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SendgridConfig {
    /// Base64 Ed25519 public key for event webhook signatures
    pub event_public_key: Option<String>,
    /// Bearer token fallback when no signature key is configured
    pub webhook_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EmailTransportConfig {
    Smtp {
        host: String,
        port: u16,
        username: String,
        password: String,
        use_tls: bool,
    },
    /// Development transport: messages are written to a directory.
    File { path: String },
}

impl Default for EmailTransportConfig {
    fn default() -> Self {
        EmailTransportConfig::File {
            path: "./outbox".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailConfig {
    pub from_email: String,
    pub from_name: String,
    pub transport: EmailTransportConfig,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from_email: "leads@leadflow.local".to_string(),
            from_name: "LeadFlow".to_string(),
            transport: EmailTransportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SendersConfig {
    pub twilio: TwilioConfig,
    pub sendgrid: SendgridConfig,
    pub email: EmailConfig,
}

impl Config {
    /// Load configuration from defaults, file, env and the bare well-known
    /// environment variables.
    pub fn load(args: &Args) -> Result<Config, figment::Error> {
        let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Yaml::file(&args.config))
            .merge(Env::prefixed("LEADFLOW_").split("__"))
            .extract()?;
        config.apply_bare_env();
        Ok(config)
    }

    /// Overrides from the bare (unprefixed) environment variables the
    /// deployment surface documents.
    fn apply_bare_env(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(url) = var("DATABASE_URL") {
            self.database.url = url;
        } else if let Some(host) = var("DB_HOST") {
            let port = var("DB_PORT").unwrap_or_else(|| "5432".to_string());
            let name = var("DB_NAME").unwrap_or_else(|| "leadflow".to_string());
            let user = var("DB_USER").unwrap_or_else(|| "leadflow".to_string());
            let pass = var("DB_PASS").unwrap_or_default();
            self.database.url = format!("postgres://{user}:{pass}@{host}:{port}/{name}");
        }

        if let Some(count) = var("WORKER_COUNT").and_then(|v| v.parse().ok()) {
            self.worker_count = count;
        }
        if let Some(port) = var("METRICS_PORT").and_then(|v| v.parse().ok()) {
            self.metrics_port = port;
        }
        if let Some(port) = var("WEBHOOK_PORT").and_then(|v| v.parse().ok()) {
            self.webhook_port = port;
        }

        if let Some(interval) = var("LINKEDIN_SCRAPE_INTERVAL").and_then(|v| v.parse().ok()) {
            self.scheduler.linkedin_interval_secs = interval;
        }
        if let Some(interval) = var("INSTAGRAM_SCRAPE_INTERVAL").and_then(|v| v.parse().ok()) {
            self.scheduler.instagram_interval_secs = interval;
        }
        if let Some(rpm) = var("LINKEDIN_RATE_LIMIT_PER_MINUTE").and_then(|v| v.parse().ok()) {
            self.ingest.linkedin.rate_per_minute = rpm;
        }
        if let Some(rpm) = var("INSTAGRAM_RATE_LIMIT_PER_MINUTE").and_then(|v| v.parse().ok()) {
            self.ingest.instagram.rate_per_minute = rpm;
        }
        if let Some(query) = var("LINKEDIN_QUERY") {
            self.ingest.linkedin.query = query;
        }
        if let Some(query) = var("INSTAGRAM_QUERY") {
            self.ingest.instagram.query = query;
        }
        if let Some(limit) = var("LINKEDIN_LIMIT").and_then(|v| v.parse().ok()) {
            self.ingest.linkedin.limit = limit;
        }
        if let Some(limit) = var("INSTAGRAM_LIMIT").and_then(|v| v.parse().ok()) {
            self.ingest.instagram.limit = limit;
        }
        if let Some(key) = var("GOOGLE_MAPS_API_KEY") {
            self.ingest.google_maps.api_key = Some(key);
        }

        if let Some(sid) = var("TWILIO_ACCOUNT_SID") {
            self.senders.twilio.account_sid = Some(sid);
        }
        if let Some(token) = var("TWILIO_AUTH_TOKEN") {
            self.senders.twilio.auth_token = Some(token);
        }
        if let Some(from) = var("TWILIO_WHATSAPP_FROM") {
            self.senders.twilio.whatsapp_from = Some(from);
        }
        if let Some(url) = var("TWILIO_WEBHOOK_URL") {
            self.senders.twilio.webhook_url = Some(url);
        }
        if let Some(key) = var("SENDGRID_EVENT_PUBLIC_KEY") {
            self.senders.sendgrid.event_public_key = Some(key);
        }
        if let Some(token) = var("SENDGRID_WEBHOOK_TOKEN") {
            self.senders.sendgrid.webhook_token = Some(token);
        }
    }
}
