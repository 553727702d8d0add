use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use crate::config::{AppConfig, Env};

/// OutgoingMail
///
/// A single HTML message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build mail: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("smtp delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("{0}")]
    Simulated(String),
}

// 1. Mailer Contract
/// Mailer
///
/// Outbound mail used by the verification and password-reset flows. Swapped for
/// `MockMailer` in tests so no SMTP server is needed.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

// 2. The Real Implementation (SMTP)
/// SmtpMailer
///
/// Delivers through an SMTP relay with `lettre`. Local runs talk plaintext to a
/// development catcher (e.g. MailHog on port 1025); production uses implicit TLS.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &AppConfig) -> Result<Self, MailError> {
        let builder = match config.env {
            Env::Local => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host),
            Env::Production => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)?,
        }
        .port(config.smtp_port);

        let builder = if config.smtp_user.is_empty() {
            builder
        } else {
            builder.credentials(Credentials::new(
                config.smtp_user.clone(),
                config.smtp_pass.clone(),
            ))
        };

        Ok(Self {
            transport: builder.build(),
            from: config.mail_from.parse()?,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(mail.to.parse()?)
            .subject(mail.subject)
            .header(ContentType::TEXT_HTML)
            .body(mail.html)?;
        self.transport.send(message).await?;
        tracing::info!(to = %mail.to, "mail delivered");
        Ok(())
    }
}

// 3. The Mock Implementation (For Tests)
/// MockMailer
///
/// Records every message instead of delivering it. `new_failing` simulates a
/// relay outage.
#[derive(Default)]
pub struct MockMailer {
    pub should_fail: bool,
    sent: Mutex<Vec<OutgoingMail>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for MockMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        if self.should_fail {
            return Err(MailError::Simulated(
                "Mock Mailer Error: Simulation requested".to_string(),
            ));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(mail);
        }
        Ok(())
    }
}

/// MailerState
///
/// The concrete type used to share the mailer across the application state.
pub type MailerState = Arc<dyn Mailer>;
