//! The business registration agent: plain conversation, no tools.

use async_trait::async_trait;
use giro_core::{
    error::GiroError,
    message::{Answer, ChatKind, ContextEntry, Outcome, Role},
    traits::Reasoner,
};

use crate::openai::{ChatClient, ChatMessage};
use crate::prompts::REGISTER_SYSTEM;

pub struct RegisterAgent {
    client: ChatClient,
}

impl RegisterAgent {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Reasoner for RegisterAgent {
    fn name(&self) -> &str {
        "register"
    }

    async fn answer(
        &self,
        _kind: ChatKind,
        context: &[ContextEntry],
        text: &str,
    ) -> Result<Answer, GiroError> {
        let mut messages = vec![ChatMessage::system(REGISTER_SYSTEM)];
        for entry in context {
            messages.push(match entry.role {
                Role::Human => ChatMessage::user(entry.text.clone()),
                Role::Assistant => ChatMessage::assistant(entry.text.clone()),
            });
        }
        messages.push(ChatMessage::user(text));

        let reply = self.client.chat(&messages, None).await?;
        let content = reply
            .content
            .ok_or_else(|| GiroError::Agent("empty registration reply".to_string()))?;

        Ok(Answer {
            text: Some(content.trim().to_string()),
            outcome: Outcome::Conversational,
            item_ids: Vec::new(),
        })
    }
}
