//! Notification sinks
//!
//! `SmtpNotifier` delivers through an SMTP relay with lettre. `LogNotifier`
//! only writes the message to the log and is used when mail is disabled.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment as MailAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tourdesk_core::config::MailConfig;
use tourdesk_core::error::AppError;
use tourdesk_core::traits::{EmailMessage, NotificationSink};
use tracing::{debug, info, instrument};

/// Port that expects TLS from the first byte
const IMPLICIT_TLS_PORT: u16 = 465;

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &MailConfig) -> Result<Self, AppError> {
        let builder = if config.smtp_port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
        }
        .map_err(|e| AppError::Config(format!("SMTP relay error: {}", e)))?
        .port(config.smtp_port);

        let builder = match (&config.smtp_username, &config.smtp_password) {
            (Some(user), Some(password)) => {
                builder.credentials(Credentials::new(user.clone(), password.clone()))
            }
            _ => builder,
        };

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid from address: {}", e)))?;

        info!(
            "SMTP notifier using {}:{} as {}",
            config.smtp_host, config.smtp_port, config.from_email
        );
        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    fn build(&self, message: EmailMessage) -> Result<Message, AppError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| AppError::Notification(format!("Invalid recipient {}: {}", message.to, e)))?;

        let builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject);

        let built = if message.attachments.is_empty() {
            builder
                .header(ContentType::TEXT_PLAIN)
                .body(message.body)
        } else {
            let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(message.body));
            for attachment in message.attachments {
                let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                    AppError::Notification(format!(
                        "Bad content type {}: {}",
                        attachment.content_type, e
                    ))
                })?;
                parts = parts.singlepart(
                    MailAttachment::new(attachment.filename).body(attachment.data, content_type),
                );
            }
            builder.multipart(parts)
        };

        built.map_err(|e| AppError::Notification(format!("Failed to build email: {}", e)))
    }
}

#[async_trait]
impl NotificationSink for SmtpNotifier {
    #[instrument(skip(self, message), fields(to = %message.to, subject = %message.subject))]
    async fn send(&self, message: EmailMessage) -> Result<(), AppError> {
        let email = self.build(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::Notification(format!("SMTP delivery failed: {}", e)))?;
        debug!("Email handed to relay");
        Ok(())
    }
}

/// Writes messages to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), AppError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            attachments = message.attachments.len(),
            "Mail disabled, not sending"
        );
        debug!("{}", message.body);
        Ok(())
    }
}
