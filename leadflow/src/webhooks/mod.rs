//! Inbound provider webhooks.
//!
//! Both endpoints verify the request signature before any side effect; a
//! failed check returns 403 without a store write. Event reconciliation is
//! best-effort: an open event without a matching delivery is dropped
//! silently, opt-outs and bounces are always recorded.

pub mod verify;

use crate::AppState;
use crate::db::handlers::{Deliveries, Suppressions};
use crate::errors::{Error, Result};
use crate::types::DeliveryMethod;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::instrument;

/// One SendGrid event. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
pub struct SendgridEvent {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

fn header<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /webhook/sendgrid` - JSON array of events, Ed25519-signed with a
/// bearer-token fallback.
#[instrument(skip_all)]
pub async fn sendgrid_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let sendgrid = &state.config.senders.sendgrid;

    let mut verified = false;
    if let Some(public_key) = &sendgrid.event_public_key {
        let signature = header(&headers, "X-Twilio-Email-Event-Webhook-Signature");
        let timestamp = header(&headers, "X-Twilio-Email-Event-Webhook-Timestamp");
        if let (Some(signature), Some(timestamp)) = (signature, timestamp) {
            verified = verify::verify_sendgrid_signature(public_key, timestamp, &body, signature);
        }
    }
    if !verified {
        if let Some(token) = &sendgrid.webhook_token {
            verified = verify::verify_bearer_token(token, header(&headers, "Authorization"));
        }
    }
    if !verified {
        return Err(Error::SignatureInvalid);
    }

    let events: Vec<SendgridEvent> =
        serde_json::from_slice(&body).map_err(|err| Error::BadRequest {
            message: format!("invalid event payload: {err}"),
        })?;
    handle_sendgrid_events(&state.pool, &events).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Apply a batch of SendGrid events against the store.
pub async fn handle_sendgrid_events(pool: &SqlitePool, events: &[SendgridEvent]) -> Result<()> {
    for event in events {
        let Some(email) = event.email.as_deref().map(|e| e.trim().to_lowercase()) else {
            continue;
        };
        if email.is_empty() {
            continue;
        }
        let kind = event.event.as_deref().unwrap_or("").to_lowercase();
        match kind.as_str() {
            "delivered" | "open" => {
                Deliveries::mark_opened(pool, DeliveryMethod::Email, &email).await?;
            }
            "unsubscribe" | "unsubscribed" => {
                Suppressions::add_opt_out(pool, DeliveryMethod::Email, &email).await?;
            }
            "bounce" => {
                let reason = event.reason.as_deref().unwrap_or("bounce");
                Suppressions::add_bounce(pool, DeliveryMethod::Email, &email, reason).await?;
            }
            _ => {}
        }
    }
    Ok(())
}

/// `POST /webhook/twilio` - form-encoded status callback, HMAC-SHA1 signed.
#[instrument(skip_all)]
pub async fn twilio_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let twilio = &state.config.senders.twilio;

    // The signature covers the public URL Twilio was configured with; fall
    // back to reconstructing it from the Host header.
    let url = twilio.webhook_url.clone().unwrap_or_else(|| {
        let host = header(&headers, "host").unwrap_or_default();
        format!("http://{host}/webhook/twilio")
    });
    let params: Vec<(String, String)> = url::form_urlencoded::parse(&body)
        .into_owned()
        .collect();

    let signature = header(&headers, "X-Twilio-Signature").unwrap_or_default();
    let token = twilio.auth_token.as_deref().unwrap_or_default();
    if !verify::verify_twilio_signature(token, &url, &params, signature) {
        return Err(Error::SignatureInvalid);
    }

    handle_twilio_event(&state.pool, &params).await?;
    Ok(Json(json!({ "ok": true })))
}

/// Apply one Twilio status callback against the store.
pub async fn handle_twilio_event(pool: &SqlitePool, params: &[(String, String)]) -> Result<()> {
    let get = |name: &str| {
        params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    };

    let status = get("MessageStatus").unwrap_or_default().to_lowercase();
    let mut to = get("To").unwrap_or_default().trim().to_lowercase();
    if let Some(stripped) = to.strip_prefix("whatsapp:") {
        to = stripped.to_string();
    }
    if to.is_empty() {
        return Err(Error::BadRequest {
            message: "missing To parameter".to_string(),
        });
    }

    match status.as_str() {
        "delivered" | "read" => {
            Deliveries::mark_opened(pool, DeliveryMethod::WhatsApp, &to).await?;
        }
        "undelivered" | "failed" => {
            Suppressions::add_bounce(pool, DeliveryMethod::WhatsApp, &to, &status).await?;
        }
        "stopped" | "optout" => {
            Suppressions::add_opt_out(pool, DeliveryMethod::WhatsApp, &to).await?;
        }
        _ => {}
    }
    Ok(())
}
