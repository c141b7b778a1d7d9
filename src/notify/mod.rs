mod email;
mod smtp_notifier;

pub use email::{Email, EmailAttachment, split_recipients};
pub use smtp_notifier::SmtpNotifier;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, instrument, warn};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("invalid content type: {0}")]
    ContentType(#[from] lettre::message::header::ContentTypeErr),
    #[error("could not build the message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), NotifyError>;
}

/// Sends `email` to every recipient in turn and returns how many deliveries succeeded.
///
/// A failed delivery is logged and does not stop the remaining ones.
#[instrument(skip_all, fields(subject = %email.subject))]
pub async fn notify_all(notifier: &dyn Notifier, recipients: &[String], email: &Email) -> usize {
    let mut sent = 0;
    for recipient in recipients.iter().flat_map(|recipients| split_recipients(recipients)) {
        info!("📧 Sending e-mail to {}...", recipient);
        match notifier.send(&email.to(&recipient)).await {
            Ok(()) => {
                info!("📧 Sending e-mail to {}... OK", recipient);
                sent += 1;
            }
            Err(e) => warn!("📧 Sending e-mail to {}... failed, {}", recipient, e),
        }
    }
    sent
}
