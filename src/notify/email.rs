/// A plain-text e-mail with an optional attachment.
#[derive(Clone, PartialEq, Debug)]
pub struct Email {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachment: Option<EmailAttachment>,
}

#[derive(Clone, PartialEq, Debug)]
pub struct EmailAttachment {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Email {
    /// Creates an e-mail without a recipient, see [`Email::to`].
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Email {
            recipient: String::new(),
            subject: subject.into(),
            body: body.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: EmailAttachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    /// Returns a copy addressed to `recipient`.
    pub fn to(&self, recipient: &str) -> Self {
        Email {
            recipient: recipient.to_string(),
            ..self.clone()
        }
    }
}

/// Splits a `,` or `;` separated recipient list, dropping blank entries.
pub fn split_recipients(value: &str) -> Vec<String> {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|recipient| !recipient.is_empty())
        .map(str::to_string)
        .collect()
}
