//! WhatsApp Cloud API transport.
//!
//! Outbound only: inbound traffic arrives over the webhook and is parsed by
//! [`payload`](crate::payload). Docs:
//! <https://developers.facebook.com/docs/whatsapp/cloud-api/reference/messages>

use async_trait::async_trait;
use giro_core::{
    config::WhatsAppConfig,
    error::GiroError,
    message::ChatKind,
    traits::Transport,
};
use tracing::debug;

/// Longest text body the Cloud API accepts per message.
const MAX_MESSAGE_LEN: usize = 4096;

/// Transport over the WhatsApp Cloud API.
pub struct WhatsAppTransport {
    config: WhatsAppConfig,
    client: reqwest::Client,
}

impl WhatsAppTransport {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// The sending phone number for a chat surface.
    fn number_id(&self, kind: ChatKind) -> &str {
        match kind {
            ChatKind::User => &self.config.user_number_id,
            ChatKind::Business => &self.config.business_number_id,
        }
    }
}

#[async_trait]
impl Transport for WhatsAppTransport {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send_text(&self, kind: ChatKind, target: &str, text: &str) -> Result<(), GiroError> {
        let url = format!(
            "{}/{}/messages",
            self.config.api_base_url,
            self.number_id(kind)
        );

        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let body = serde_json::json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": target,
                "type": "text",
                "text": { "preview_url": false, "body": chunk },
            });

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.config.api_token)
                .json(&body)
                .send()
                .await
                .map_err(|e| GiroError::Channel(format!("whatsapp send failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let error_text = resp.text().await.unwrap_or_default();
                return Err(GiroError::Channel(format!(
                    "whatsapp send returned {status}: {error_text}"
                )));
            }
            debug!("sent {} chars to {target} ({})", chunk.len(), kind.as_str());
        }

        Ok(())
    }
}

/// Split a message into chunks below `max_len` bytes, preferring newline
/// breaks. Every cut lands on a UTF-8 char boundary, so multi-byte content
/// (accented text, emoji) never produces an invalid slice.
fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let end = floor_char_boundary(text, (start + max_len).min(text.len()));
        let break_at = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .map(|i| start + i + 1)
                .unwrap_or(end)
        } else {
            end
        };
        chunks.push(&text[start..break_at]);
        start = break_at;
    }

    chunks
}

/// Largest index not past `index` that lies on a char boundary.
/// Stable stand-in for `str::floor_char_boundary`.
fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    let mut i = index;
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}
