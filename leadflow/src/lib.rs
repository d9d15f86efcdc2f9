//! # leadflow: lead pipeline and delivery engine
//!
//! `leadflow` ingests business contacts from external platforms, promotes
//! them through a raw → validated → qualified → enriched pipeline, and
//! delivers the survivors to subscribed businesses under per-plan quota and
//! pricing rules, while observing opt-outs, bounces and webhook-driven
//! delivery status.
//!
//! ## Overview
//!
//! Ingesters ([`ingest`]) capture raw leads per platform with source
//! attribution. The processing stages ([`pipeline`]) scrub fields, score and
//! categorize each lead against per-industry rules, and probe the lead's
//! website with a bounded HTTP GET. Surviving leads become qualified leads,
//! at most one per raw capture.
//!
//! The delivery engine ([`delivery`]) is the heart of the system: for each
//! (client, channel) invocation it walks a fixed gate (client resolution,
//! opt-out suppression, activity, the monthly cap for the subscription or
//! pay-per-lead tier, the trial override) and only then attempts the send.
//! Successful sends are recorded idempotently under a UNIQUE
//! (lead, client, channel) key; failed sends become bounce records. Every
//! outcome increments a counter in the metrics registry ([`metrics`]).
//!
//! Periodic tickers ([`scheduler`]) enqueue ingestion cycles onto a bounded
//! job queue drained by a small worker pool with exponential-backoff retries
//! and a dead-letter list ([`jobs`]). Provider webhooks ([`webhooks`])
//! reconcile opens, bounces and opt-outs against prior deliveries after
//! signature verification. Billing ([`billing`]) owns subscription
//! activation, grace-period expiry and invoice drafting.
//!
//! ## Quick start
//!
//! ```no_run
//! use clap::Parser;
//! use leadflow::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = leadflow::config::Args::parse();
//!     let config = Config::load(&args)?;
//!     leadflow::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await
//! }
//! ```

pub mod billing;
pub mod config;
pub mod db;
pub mod delivery;
pub mod errors;
pub mod ingest;
pub mod jobs;
pub mod metrics;
pub mod pipeline;
pub mod pricing;
pub mod scheduler;
pub mod telemetry;
pub mod types;
pub mod webhooks;

pub use config::Config;

use crate::delivery::DeliveryEngine;
use crate::delivery::senders::{EmailLeadSender, LeadSender, TwilioWhatsAppSender};
use crate::jobs::WorkerPool;
use crate::metrics::DeliveryMetrics;
use crate::pipeline::Enricher;
use crate::scheduler::{PipelineContext, Scheduler};
use anyhow::Context;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Router, http};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub metrics: DeliveryMetrics,
}

/// Router for the inbound provider webhooks.
pub fn build_webhook_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/webhook/sendgrid", post(webhooks::sendgrid_webhook))
        .route("/webhook/twilio", post(webhooks::twilio_webhook))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(http::header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        state.metrics.render(),
    )
}

/// Router for the metrics scrape endpoint.
pub fn build_metrics_router(state: AppState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Main application struct that owns all resources and lifecycle.
///
/// `new` connects the store (an unreachable store is an init failure; the
/// binary logs and exits non-zero), wires the delivery engine and senders,
/// and starts the background services under one shared stop token. `serve`
/// binds the webhook and metrics listeners and runs until the shutdown
/// signal fires; workers then stop and the process exits cleanly.
pub struct Application {
    state: AppState,
    workers: WorkerPool,
    scheduler_handles: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl Application {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database.url).await?;
        let metrics = DeliveryMetrics::new().context("create metrics registry")?;

        let email_sender: Arc<dyn LeadSender> =
            Arc::new(EmailLeadSender::new(&config.senders).context("create email sender")?);
        let whatsapp_sender: Arc<dyn LeadSender> = Arc::new(TwilioWhatsAppSender::new(&config.senders));
        let engine = Arc::new(DeliveryEngine::new(
            pool.clone(),
            metrics.clone(),
            email_sender,
            whatsapp_sender,
        ));

        let shutdown = CancellationToken::new();
        let (queue, workers) = WorkerPool::start(config.worker_count, config.queue_capacity, shutdown.clone());

        let ctx = Arc::new(PipelineContext {
            pool: pool.clone(),
            config: config.clone(),
            engine,
            enricher: Enricher::new(),
        });
        let scheduler = Scheduler::new(queue, shutdown.clone());
        let scheduler_handles = scheduler.start(ctx);

        Ok(Self {
            state: AppState {
                pool,
                config,
                metrics,
            },
            workers,
            scheduler_handles,
            shutdown,
        })
    }

    /// Run both HTTP surfaces until the shutdown future resolves.
    pub async fn serve(self, shutdown_signal: impl Future<Output = ()> + Send) -> anyhow::Result<()> {
        let webhook_addr = format!(
            "{}:{}",
            self.state.config.webhook_host, self.state.config.webhook_port
        );
        let metrics_addr = format!(
            "{}:{}",
            self.state.config.metrics_host, self.state.config.metrics_port
        );

        let webhook_listener = TcpListener::bind(&webhook_addr)
            .await
            .with_context(|| format!("bind webhook listener on {webhook_addr}"))?;
        let metrics_listener = TcpListener::bind(&metrics_addr)
            .await
            .with_context(|| format!("bind metrics listener on {metrics_addr}"))?;
        info!(webhook = %webhook_addr, metrics = %metrics_addr, "listening");

        let token = self.shutdown.clone();
        let webhook_server = axum::serve(webhook_listener, build_webhook_router(self.state.clone()))
            .with_graceful_shutdown(token.clone().cancelled_owned());
        let metrics_server = axum::serve(metrics_listener, build_metrics_router(self.state.clone()))
            .with_graceful_shutdown(token.clone().cancelled_owned());
        let mut webhook_task = tokio::spawn(async move { webhook_server.await });
        let mut metrics_task = tokio::spawn(async move { metrics_server.await });

        tokio::pin!(shutdown_signal);
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("shutdown signal received");
            }
            result = &mut webhook_task => {
                result??;
                anyhow::bail!("webhook server exited unexpectedly");
            }
            result = &mut metrics_task => {
                result??;
                anyhow::bail!("metrics server exited unexpectedly");
            }
        }

        // Stop enqueueing, let in-flight work drain, close the listeners.
        self.shutdown.cancel();
        self.workers.stop_workers();
        let _ = webhook_task.await;
        let _ = metrics_task.await;
        for handle in self.scheduler_handles {
            let _ = handle.await;
        }
        info!("shutdown complete");
        Ok(())
    }
}
