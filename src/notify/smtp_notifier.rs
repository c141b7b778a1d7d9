use crate::app_config::Email as EmailConfig;
use crate::notify::{Email, Notifier, NotifyError};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, instrument};

/// Delivers e-mails through an SMTP relay using STARTTLS.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(config.smtp_host())?.port(config.smtp_port());
        if !config.username().is_empty() {
            builder = builder.credentials(Credentials::new(config.username().to_string(), config.password().to_string()));
        }

        Ok(SmtpNotifier {
            transport: builder.build(),
            from: config.from().parse()?,
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip_all, fields(recipient = %email.recipient))]
    async fn send(&self, email: &Email) -> Result<(), NotifyError> {
        let message = build_message(&self.from, email)?;
        let response = self.transport.send(message).await?;
        debug!(code = %response.code(), "SMTP relay accepted the message");
        Ok(())
    }
}

fn build_message(from: &Mailbox, email: &Email) -> Result<Message, NotifyError> {
    let builder = Message::builder()
        .from(from.clone())
        .to(email.recipient.parse()?)
        .subject(&email.subject);

    let message = match &email.attachment {
        Some(attachment) => builder.multipart(
            MultiPart::mixed().singlepart(SinglePart::plain(email.body.clone())).singlepart(
                Attachment::new(attachment.file_name.clone()).body(attachment.content.clone(), ContentType::parse(&attachment.content_type)?),
            ),
        )?,
        None => builder.body(email.body.clone())?,
    };
    Ok(message)
}
