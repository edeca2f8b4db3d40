use crate::{DeliveryError, Notification};
use email_address::EmailAddress;
use lettre::Address;
use lettre::Message;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use std::str::FromStr;

pub const SUBJECT: &str = "A Heartfelt Confession: Your Admirer Has a Message for You";

/// Plaintext body of the notification, ending with the link to the recipient's page.
pub fn render_body(notification: &Notification<'_>, link_base: &str) -> String {
    let link = format!(
        "{}/{}",
        link_base.trim_end_matches('/'),
        notification.to_label
    );

    format!(
        "A Very Warm Valentine's Day,\n\
         On this day of love and affection, {from}  want to take a moment to express just how much you mean to them. Kindly Read their message\n\
         Message: {message}. .............\n\
         Take a moment to see this beautiful message for you. {link}\n",
        from = notification.from,
        message = notification.message,
    )
}

/// Builds the single message sent for a proposal. The sender's display name is
/// the proposal's `from`; the address is the relay account's.
pub fn build_message(
    notification: &Notification<'_>,
    sender: &Address,
    link_base: &str,
) -> Result<Message, DeliveryError> {
    let recipient =
        parse_address(notification.email).map_err(|reason| DeliveryError::InvalidRecipient {
            address: notification.email.to_string(),
            reason,
        })?;

    let message = Message::builder()
        .from(Mailbox::new(
            Some(notification.from.to_string()),
            sender.clone(),
        ))
        .to(Mailbox::new(None, recipient))
        .subject(SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(render_body(notification, link_base))?;

    Ok(message)
}

pub(crate) fn parse_address(raw: &str) -> Result<Address, String> {
    let email = EmailAddress::from_str(raw.trim()).map_err(|e| e.to_string())?;
    Address::new(email.local_part(), email.domain()).map_err(|e| e.to_string())
}
