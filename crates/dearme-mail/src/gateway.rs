use async_trait::async_trait;
use thiserror::Error;

/// A file attached to an outgoing email, already base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub content_base64: String,
}

/// One transactional email. Every address in `to` receives the same message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: Vec<String>,
    pub subject: String,
    pub html_body: String,
    pub attachment: Option<Attachment>,
}

impl OutboundEmail {
    pub fn new(to: Vec<String>, subject: impl Into<String>, html_body: impl Into<String>) -> Self {
        Self {
            to,
            subject: subject.into(),
            html_body: html_body.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no recipients")]
    NoRecipients,

    #[error("gateway rejected the message: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("gateway rate limit hit")]
    RateLimited,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

/// Outbound notification channel. Implementations must be safe to call
/// from several tasks at once.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), GatewayError>;
}
