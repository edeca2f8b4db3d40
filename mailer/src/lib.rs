//! Outbound notification mail for submitted proposals.
//!
//! A [`Notifier`] turns one [`Notification`] into exactly one message handed to
//! the relay. Delivery is attempted once; failures are returned to the caller.

use std::future::Future;

mod message;
mod smtp;

pub use message::{SUBJECT, build_message, render_body};
pub use smtp::{RelayConfig, SmtpNotifier};

/// What the recipient of a proposal gets told.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification<'a> {
    /// Destination address.
    pub email: &'a str,
    /// Sender display name.
    pub from: &'a str,
    pub message: &'a str,
    /// Recipient label, appended to the link base URL.
    pub to_label: &'a str,
}

/// The relay's final reply for an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub code: String,
    pub message: Vec<String>,
}

impl std::fmt::Display for DeliveryReceipt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.message.join(" "))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Invalid recipient address {address}: {reason}")]
    InvalidRecipient { address: String, reason: String },

    #[error("Invalid sender address {address}: {reason}")]
    InvalidSender { address: String, reason: String },

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("Relay rejected message: {0}")]
    Relay(#[from] lettre::transport::smtp::Error),
}

pub trait Notifier: Send + Sync + 'static {
    fn send(
        &self,
        notification: &Notification<'_>,
    ) -> impl Future<Output = Result<DeliveryReceipt, DeliveryError>> + Send;
}
