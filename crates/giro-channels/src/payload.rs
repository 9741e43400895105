//! WhatsApp Cloud API webhook payload parsing.
//!
//! One webhook receives traffic for both phone numbers; the receiving
//! `phone_number_id` in each change's metadata decides which chat surface a
//! message belongs to. Docs:
//! <https://developers.facebook.com/docs/whatsapp/cloud-api/webhooks/payload-examples>

use chrono::{DateTime, Utc};
use giro_core::{
    config::WhatsAppConfig,
    message::{ChatKind, InboundMessage},
};
use serde::Deserialize;
use tracing::{debug, warn};

// --- Cloud API webhook types ---

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    pub value: ChangeValue,
}

#[derive(Debug, Deserialize)]
pub struct ChangeValue {
    pub metadata: Option<Metadata>,
    /// Absent on status-only notifications (sent/delivered/read receipts).
    #[serde(default)]
    pub messages: Vec<WaMessage>,
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
    pub phone_number_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WaMessage {
    pub id: String,
    pub from: String,
    /// Epoch seconds, as a string.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub text: Option<TextBody>,
}

#[derive(Debug, Deserialize)]
pub struct TextBody {
    pub body: String,
}

/// Unwrap a webhook payload into inbound text messages.
///
/// Non-text messages, status notifications, and traffic for unknown phone
/// numbers are skipped; the webhook still gets its 200 either way.
pub fn extract_messages(payload: &WebhookPayload, config: &WhatsAppConfig) -> Vec<InboundMessage> {
    let mut out = Vec::new();

    for entry in &payload.entry {
        for change in &entry.changes {
            let Some(metadata) = &change.value.metadata else {
                continue;
            };
            let kind = if metadata.phone_number_id == config.user_number_id {
                ChatKind::User
            } else if metadata.phone_number_id == config.business_number_id {
                ChatKind::Business
            } else {
                warn!(
                    "webhook change for unknown phone_number_id {}",
                    metadata.phone_number_id
                );
                continue;
            };

            for msg in &change.value.messages {
                if msg.kind != "text" {
                    debug!("skipping non-text message {} ({})", msg.id, msg.kind);
                    continue;
                }
                let Some(text) = &msg.text else {
                    debug!("text message {} with no body", msg.id);
                    continue;
                };

                let received_at = msg
                    .timestamp
                    .parse::<i64>()
                    .ok()
                    .and_then(|secs| DateTime::from_timestamp(secs, 0))
                    .unwrap_or_else(Utc::now);

                out.push(InboundMessage {
                    external_id: msg.id.clone(),
                    channel_key: msg.from.clone(),
                    kind,
                    text: text.body.clone(),
                    received_at,
                });
            }
        }
    }

    out
}
