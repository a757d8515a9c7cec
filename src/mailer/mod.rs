use crate::config::MailConfig;
use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::path::PathBuf;
use tracing::info;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone)]
pub struct Email {
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<PathBuf>,
}

/// Outbound report delivery.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<()>;
}

pub struct SmtpMailer {
    config: MailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        }
        .with_context(|| format!("Invalid SMTP relay {}", config.smtp_host))?;

        let transport = builder
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            config: config.clone(),
            transport,
        })
    }

    pub fn build_message(&self, email: &Email) -> Result<Message> {
        if self.config.recipients.is_empty() {
            bail!("No recipients configured (mail.recipients)");
        }

        let from = Mailbox::new(
            Some(self.config.sender_name.clone()),
            self.config
                .sender_email
                .parse()
                .with_context(|| format!("Invalid sender address {:?}", self.config.sender_email))?,
        );

        let mut builder = Message::builder().from(from).subject(&email.subject);
        for rcpt in &self.config.recipients {
            let mailbox: Mailbox = rcpt
                .parse()
                .with_context(|| format!("Invalid recipient address {:?}", rcpt))?;
            builder = builder.to(mailbox);
        }

        let mut body = MultiPart::mixed().singlepart(SinglePart::html(email.html_body.clone()));

        if let Some(path) = &email.attachment {
            let bytes = std::fs::read(path)
                .with_context(|| format!("Failed to read attachment {:?}", path))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "attachment.xlsx".to_string());
            let content_type =
                ContentType::parse(XLSX_MIME).map_err(|e| anyhow!("content type: {}", e))?;
            body = body.singlepart(Attachment::new(filename).body(bytes, content_type));
        }

        builder.multipart(body).context("Failed to assemble email")
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &Email) -> Result<()> {
        let message = self.build_message(email)?;
        self.transport
            .send(message)
            .await
            .with_context(|| format!("SMTP delivery via {} failed", self.config.smtp_host))?;
        info!(
            recipients = self.config.recipients.len(),
            subject = %email.subject,
            "Report email sent"
        );
        Ok(())
    }
}
