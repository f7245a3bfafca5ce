use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::Mutex;

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail seam.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> anyhow::Result<()>;
}

/// Delivers mail through an authenticated STARTTLS relay.
pub struct SmtpMailer {
    from: Mailbox,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let from: Mailbox = config.from.parse()?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .build();

        Ok(Self { from, transport })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email.to.parse()?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)?;

        self.transport.send(message).await?;
        tracing::info!(to = %email.to, "Mail delivered");
        Ok(())
    }
}

/// Development fallback: records that a message would have gone out.
///
/// The body is never logged since reset mails carry a live credential.
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        tracing::warn!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            "SMTP is not configured; mail was not delivered"
        );
        Ok(())
    }
}

/// SMTP when an account is configured, otherwise the log-only fallback.
pub fn from_config(config: &MailConfig) -> anyhow::Result<Arc<dyn Mailer>> {
    if config.smtp_enabled() {
        tracing::info!(host = %config.smtp_host, port = config.smtp_port, "Outbound mail via SMTP");
        Ok(Arc::new(SmtpMailer::new(config)?))
    } else {
        tracing::warn!("No SMTP account configured; outbound mail is disabled");
        Ok(Arc::new(LogMailer::new(config.from.clone())))
    }
}

/// Keeps every message in memory; used by tests.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Email>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Email> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        self.sent.lock().await.push(email);
        Ok(())
    }
}

pub fn password_reset_email(to: &str, reset_url: &str, valid_minutes: i64) -> Email {
    Email {
        to: to.to_string(),
        subject: format!("Reset your password (valid for {} minutes)", valid_minutes),
        body: format!(
            "Forgot your password? Submit a request to reset it at: {}\n\
             If you didn't forget your password, please ignore this email.",
            reset_url
        ),
    }
}
