use crate::{
    error::GiroError,
    filter::Filter,
    message::{Answer, ChatKind, ContextEntry},
};
use async_trait::async_trait;

/// Reasoning collaborator — the brain.
///
/// Elaborates one turn into an [`Answer`] given the assembled conversation
/// context. Implementations decide internally whether a turn is a
/// recommendation search, plain conversation, or a refusal; the journey only
/// sees the classified result.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Human-readable reasoner name.
    fn name(&self) -> &str;

    /// Produce the reply for `text`, with `context` oldest-first.
    async fn answer(
        &self,
        kind: ChatKind,
        context: &[ContextEntry],
        text: &str,
    ) -> Result<Answer, GiroError>;
}

/// Messaging transport — the nervous system.
///
/// Delivers outbound text over the channel the turn arrived on.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Human-readable transport name.
    fn name(&self) -> &str;

    /// Deliver `text` to `target` on the chat surface `kind`.
    async fn send_text(&self, kind: ChatKind, target: &str, text: &str) -> Result<(), GiroError>;
}

/// One semantic search hit: the catalog id of an item plus its score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub item_id: i64,
    pub score: f32,
}

/// Semantic retrieval collaborator.
///
/// Searches the item index with a free-text query constrained by a compiled
/// metadata [`Filter`].
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        filter: &Filter,
        top_k: usize,
    ) -> Result<Vec<SearchHit>, GiroError>;
}
