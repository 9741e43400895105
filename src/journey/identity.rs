//! Identity resolution for arriving messages.

use super::Journey;
use giro_core::{
    error::GiroError,
    message::{Answer, ChatKind, InboundMessage},
};
use giro_memory::Identity;
use tracing::info;

/// What identity resolution decided for this sender.
pub(super) enum Arrival {
    /// Seen before: continue the journey.
    Known(Identity),
    /// First contact: greet (or refuse at capacity) and finish the turn.
    New(Identity, Answer),
}

impl Journey {
    /// Look up the sender's identity for this chat surface, creating it on
    /// first contact. The same phone number is a distinct identity on each
    /// surface.
    pub(super) async fn resolve_identity(
        &self,
        msg: &InboundMessage,
    ) -> Result<Arrival, GiroError> {
        if let Some(identity) = self.store.find_identity(msg.kind, &msg.channel_key).await? {
            return Ok(Arrival::Known(identity));
        }

        // Capacity applies to the public chat only: business onboarding is
        // never turned away.
        if msg.kind == ChatKind::User {
            let population = self.store.identity_count(msg.kind).await?;
            if population >= self.limits.max_identity_capacity {
                info!(
                    "capacity reached ({population}), refusing new sender on {}",
                    msg.kind.as_str()
                );
                let identity = self
                    .store
                    .create_identity(msg.kind, &msg.channel_key, true)
                    .await?;
                return Ok(Arrival::New(
                    identity,
                    Answer::template(self.templates.capacity_reached.clone()),
                ));
            }
        }

        let identity = self
            .store
            .create_identity(msg.kind, &msg.channel_key, false)
            .await?;
        info!(
            "new identity {} on {} chat",
            identity.id,
            msg.kind.as_str()
        );

        let welcome = match msg.kind {
            ChatKind::User => self.templates.welcome.clone(),
            ChatKind::Business => self.templates.business_welcome.clone(),
        };
        Ok(Arrival::New(identity, Answer::template(welcome)))
    }
}
