use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which conversational surface a message arrived on.
///
/// The webhook receives traffic for two WhatsApp numbers: the public
/// recommendation chat and the business registration chat. The mapping from
/// receiving phone-number id to kind is resolved once at parse time and
/// carried as a tag from there on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    User,
    Business,
}

impl ChatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Business => "business",
        }
    }
}

/// An inbound text message, already unwrapped from the webhook envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Gateway-assigned message id (format "wamid.*"). Dedup key.
    pub external_id: String,
    /// Sender's channel address (phone number).
    pub channel_key: String,
    pub kind: ChatKind,
    pub text: String,
    /// Gateway-side receive time, from the webhook payload.
    pub received_at: DateTime<Utc>,
}

/// How a turn was (or was not) answered.
///
/// A closed enum returned from every stage, never thrown, so the journey's
/// branching stays total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Recommendation answer backed by retrieval.
    Ai,
    /// The model refused the query as invalid or out of domain.
    Blocked,
    /// Plain conversational answer, no retrieval involved.
    Conversational,
    /// The answer could not be elaborated (e.g. stale delivery).
    Failed,
    /// A canned template message.
    Template,
    /// Nothing was sent back.
    Unanswered,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Blocked => "blocked",
            Self::Conversational => "conversational",
            Self::Failed => "failed",
            Self::Template => "template",
            Self::Unanswered => "unanswered",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ai" => Some(Self::Ai),
            "blocked" => Some(Self::Blocked),
            "conversational" => Some(Self::Conversational),
            "failed" => Some(Self::Failed),
            "template" => Some(Self::Template),
            "unanswered" => Some(Self::Unanswered),
            _ => None,
        }
    }
}

/// The produced reply for one turn: text (absent for deliberate silence),
/// its outcome classification, and the item ids referenced in the reply.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: Option<String>,
    pub outcome: Outcome,
    pub item_ids: Vec<i64>,
}

impl Answer {
    pub fn template(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            outcome: Outcome::Template,
            item_ids: Vec::new(),
        }
    }

    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            outcome: Outcome::Failed,
            item_ids: Vec::new(),
        }
    }

    pub fn unanswered() -> Self {
        Self {
            text: None,
            outcome: Outcome::Unanswered,
            item_ids: Vec::new(),
        }
    }
}

/// Speaker role in assembled conversation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Human,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Assistant => "ai",
        }
    }
}

/// One line of conversation context, oldest first when assembled.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub role: Role,
    pub text: String,
}

impl ContextEntry {
    pub fn human(text: impl Into<String>) -> Self {
        Self {
            role: Role::Human,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}
