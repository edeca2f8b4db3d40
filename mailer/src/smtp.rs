use crate::message::{build_message, parse_address};
use crate::{DeliveryError, DeliveryReceipt, Notification, Notifier};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Tokio1Executor};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    /// Implicit TLS port, 465 for most relays.
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Envelope sender; usually the relay account itself.
    pub sender: String,
    pub link_base_url: String,
}

/// Sends notifications through an authenticated relay over implicit TLS.
///
/// The transport is built once and reused for every submission.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Address,
    link_base_url: String,
}

impl SmtpNotifier {
    pub fn new(config: &RelayConfig) -> Result<Self, DeliveryError> {
        let sender = parse_address(&config.sender).map_err(|reason| {
            DeliveryError::InvalidSender {
                address: config.sender.clone(),
                reason,
            }
        })?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            sender,
            link_base_url: config.link_base_url.clone(),
        })
    }
}

impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        notification: &Notification<'_>,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let message = build_message(notification, &self.sender, &self.link_base_url)?;

        let response = self.transport.send(message).await?;
        let receipt = DeliveryReceipt {
            code: response.code().to_string(),
            message: response.message().map(str::to_string).collect(),
        };

        tracing::info!(to = %notification.email, response = %receipt, "Email sent");
        Ok(receipt)
    }
}
