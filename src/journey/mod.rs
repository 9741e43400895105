//! Journey — the per-message orchestrator connecting the webhook, memory,
//! limits, reasoners, and the transport.
//!
//! Includes: idempotent intake, identity lifecycle, weekly rate limits,
//! delivery staleness, context assembly, and finalization.

mod identity;
mod limits;
mod pipeline;

use giro_core::{
    config::{ConversationConfig, LimitsConfig},
    templates::Templates,
    traits::{Reasoner, Transport},
};
use giro_memory::Store;
use std::sync::Arc;

/// Orchestrates one message's journey from claim to finalization.
pub struct Journey {
    pub(crate) store: Store,
    pub(crate) transport: Arc<dyn Transport>,
    /// Reasoner for the public recommendation chat.
    pub(crate) recommend: Arc<dyn Reasoner>,
    /// Reasoner for the business registration chat.
    pub(crate) register: Arc<dyn Reasoner>,
    pub(crate) templates: Templates,
    pub(crate) limits: LimitsConfig,
    pub(crate) conversation: ConversationConfig,
}

impl Journey {
    pub fn new(
        store: Store,
        transport: Arc<dyn Transport>,
        recommend: Arc<dyn Reasoner>,
        register: Arc<dyn Reasoner>,
        templates: Templates,
        limits: LimitsConfig,
        conversation: ConversationConfig,
    ) -> Self {
        Self {
            store,
            transport,
            recommend,
            register,
            templates,
            limits,
            conversation,
        }
    }
}

#[cfg(test)]
mod tests;
