//! Outbound email interface.
//!
//! Email delivery is an external collaborator: the welcome mail is sent
//! fire-and-forget after a successful registration, and a delivery failure
//! must never fail the registration itself.

use async_trait::async_trait;
use tracing::debug;

/// A message handed to the delivery collaborator.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Errors from the delivery collaborator.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Interface for outbound email delivery.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<(), EmailError>;
}

/// Sender that drops messages on the floor (default for embedded use).
#[derive(Debug, Default)]
pub struct NoopEmailSender;

#[async_trait]
impl EmailSender for NoopEmailSender {
    async fn send(&self, email: OutboundEmail) -> Result<(), EmailError> {
        debug!(to = %email.to, subject = %email.subject, "email delivery disabled, dropping");
        Ok(())
    }
}
