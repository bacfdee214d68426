//! Outbound mail sinks.

use crate::config::SmtpConfig;
use crate::errors::LendingError;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// A plain-text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_mail(&self, mail: &Mail) -> Result<(), LendingError>;
}

/// Unauthenticated, unencrypted SMTP relay (e.g. a local MailHog).
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Self {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .build();
        Self { transport }
    }
}

fn mailbox(field: &str, value: &str) -> Result<Mailbox, LendingError> {
    value
        .parse()
        .map_err(|e| LendingError::Internal(format!("invalid {field} address: {e}")))
}

#[async_trait]
impl MailSender for SmtpMailer {
    async fn send_mail(&self, mail: &Mail) -> Result<(), LendingError> {
        let message = Message::builder()
            .from(mailbox("from", &mail.from)?)
            .to(mailbox("to", &mail.to)?)
            .subject(mail.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| LendingError::Internal(format!("failed to build mail: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| LendingError::Internal(format!("SMTP send failed: {e}")))?;

        Ok(())
    }
}

/// Logs messages instead of sending them. Used when SMTP is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send_mail(&self, mail: &Mail) -> Result<(), LendingError> {
        tracing::info!(
            target: "lending.notify",
            subject = %mail.subject,
            "Mail delivery disabled, message logged only"
        );
        Ok(())
    }
}
