//! Channel senders: the pluggable capability the delivery engine uses to
//! actually transmit a lead. A sender either succeeds or reports a
//! [`SendError`]; the engine turns errors into bounce records.

use crate::config::{EmailTransportConfig, SendersConfig};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SendError {
    #[error("send rejected with status {status}")]
    Rejected { status: u16 },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid target address: {0}")]
    InvalidTarget(String),
}

/// A channel capable of transmitting one lead notification.
#[async_trait]
pub trait LeadSender: Send + Sync {
    async fn send(&self, target: &str, subject: &str, body: &str) -> Result<(), SendError>;
}

/// WhatsApp sender over the Twilio Messages API.
///
/// Without credentials configured the send is simulated (logged, reported as
/// success) so pipelines keep moving in development environments.
pub struct TwilioWhatsAppSender {
    client: reqwest::Client,
    account_sid: Option<String>,
    auth_token: Option<String>,
    from_number: Option<String>,
}

impl TwilioWhatsAppSender {
    pub fn new(config: &SendersConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            account_sid: config.twilio.account_sid.clone(),
            auth_token: config.twilio.auth_token.clone(),
            from_number: config.twilio.whatsapp_from.clone(),
        }
    }
}

#[async_trait]
impl LeadSender for TwilioWhatsAppSender {
    async fn send(&self, target: &str, _subject: &str, body: &str) -> Result<(), SendError> {
        let (Some(sid), Some(token), Some(from)) =
            (&self.account_sid, &self.auth_token, &self.from_number)
        else {
            tracing::debug!(target, "twilio credentials absent, send simulated");
            return Ok(());
        };

        let url = format!("https://api.twilio.com/2010-04-01/Accounts/{sid}/Messages.json");
        let params = [
            ("From", format!("whatsapp:{from}")),
            ("To", format!("whatsapp:{target}")),
            ("Body", body.to_string()),
        ];

        let response = self
            .client
            .post(&url)
            .basic_auth(sid, Some(token))
            .form(&params)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
            .map_err(|err| SendError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SendError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

/// Email sender over lettre. SMTP when configured, otherwise a file
/// transport that drops messages into a local directory.
pub struct EmailLeadSender {
    transport: EmailTransport,
    from: Mailbox,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailLeadSender {
    pub fn new(config: &SendersConfig) -> anyhow::Result<Self> {
        let email = &config.email;
        let transport = match &email.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled");
                }
                let builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?
                } else {
                    AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
                }
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));
                EmailTransport::Smtp(builder.build())
            }
            EmailTransportConfig::File { path } => {
                let dir = Path::new(path);
                if !dir.exists() {
                    std::fs::create_dir_all(dir)?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(dir))
            }
        };

        let from_address = email
            .from_email
            .parse()
            .map_err(|err| anyhow::anyhow!("invalid from_email: {err}"))?;
        Ok(Self {
            transport,
            from: Mailbox::new(Some(email.from_name.clone()), from_address),
        })
    }
}

#[async_trait]
impl LeadSender for EmailLeadSender {
    async fn send(&self, target: &str, subject: &str, body: &str) -> Result<(), SendError> {
        let to_address = target
            .parse()
            .map_err(|_| SendError::InvalidTarget(target.to_string()))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(Mailbox::new(None, to_address))
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|err| SendError::Transport(err.to_string()))?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => smtp
                .send(message)
                .await
                .map(|_| ())
                .map_err(|err| SendError::Transport(err.to_string())),
            EmailTransport::File(file) => file
                .send(message)
                .await
                .map(|_| ())
                .map_err(|err| SendError::Transport(err.to_string())),
        }
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every send; configurable to fail on specific targets.
    #[derive(Default)]
    pub struct MockSender {
        pub sent: Mutex<Vec<String>>,
        pub fail_targets: Vec<String>,
    }

    impl MockSender {
        pub fn failing_on(targets: &[&str]) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_targets: targets.iter().map(|t| t.to_string()).collect(),
            }
        }
    }

    #[async_trait]
    impl LeadSender for MockSender {
        async fn send(&self, target: &str, _subject: &str, _body: &str) -> Result<(), SendError> {
            if self.fail_targets.iter().any(|t| t == target) {
                return Err(SendError::Rejected { status: 550 });
            }
            self.sent.lock().unwrap().push(target.to_string());
            Ok(())
        }
    }
}
