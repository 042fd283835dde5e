//! `EMAIL_SEND`: plain-text mail over SMTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tracing::debug;
use ulid::Ulid;

use crate::domain::ExecutionError;
use crate::typed::{Handler, JobContext, TypedJob};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EmailSend {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSendResult {
    pub message_id: String,
}

impl TypedJob for EmailSend {
    const TYPE: &'static str = "EMAIL_SEND";
    type Output = EmailSendResult;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP error: {0}")]
    Smtp(String),
}

impl From<MailError> for ExecutionError {
    fn from(err: MailError) -> Self {
        match err {
            MailError::InvalidAddress(_) | MailError::Build(_) => {
                ExecutionError::permanent(err.to_string())
            }
            MailError::Smtp(_) => ExecutionError::infrastructure(err.to_string()),
        }
    }
}

/// Sends one message and returns its `Message-ID`.
#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, email: &EmailSend) -> Result<String, MailError>;
}

#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub host: String,
    pub port: u16,
    pub from: String,
    pub timeout: Duration,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            host: "mailhog".to_string(),
            port: 1025,
            from: "noreply@example.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// SMTP mailer on lettre. No TLS and no authentication: it talks to a local
/// relay or mail catcher.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &MailerConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(config.from.clone()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            transport: Arc::new(transport),
            from,
        })
    }

    fn build_message(&self, email: &EmailSend, message_id: &str) -> Result<Message, MailError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|_| MailError::InvalidAddress(email.to.clone()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&email.subject)
            .message_id(Some(message_id.to_string()))
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &EmailSend) -> Result<String, MailError> {
        let message_id = format!("<{}@lanework>", Ulid::new());
        let message = self.build_message(email, &message_id)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;

        Ok(message_id)
    }
}

pub struct EmailSendHandler<M: Mailer> {
    mailer: M,
}

impl<M: Mailer> EmailSendHandler<M> {
    pub fn new(mailer: M) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl<M: Mailer> Handler<EmailSend> for EmailSendHandler<M> {
    async fn handle(&self, job: EmailSend, ctx: &JobContext) -> Result<EmailSendResult, ExecutionError> {
        let message_id = self.mailer.send(&job).await?;
        debug!(job_id = %ctx.job_id, %message_id, "mail accepted by relay");
        Ok(EmailSendResult { message_id })
    }
}
