//! The message journey — the main handle_message flow.

use super::identity::Arrival;
use super::limits::Gate;
use super::Journey;
use chrono::{Duration, Utc};
use giro_core::{
    error::GiroError,
    message::{Answer, ChatKind, InboundMessage},
};
use giro_memory::ClaimResult;
use tracing::{error, info, warn};

impl Journey {
    /// Process a single inbound message through the full journey.
    ///
    /// Never returns an error to the webhook: failures are logged and the
    /// claim is released so the gateway's retry can reprocess the message.
    pub async fn handle_message(&self, msg: InboundMessage) {
        let preview = if msg.text.chars().count() > 60 {
            let truncated: String = msg.text.chars().take(60).collect();
            format!("{truncated}...")
        } else {
            msg.text.clone()
        };
        info!("[{}] {}: {preview}", msg.kind.as_str(), msg.channel_key);

        // --- 1. INTAKE CLAIM ---
        let turn_id = match self.store.claim_turn(&msg).await {
            Ok(ClaimResult::Claimed(id)) => id,
            Ok(ClaimResult::AlreadyProcessed) => {
                info!("duplicate delivery of {}, dropping", msg.external_id);
                return;
            }
            Err(e) => {
                error!("intake claim failed for {}: {e}", msg.external_id);
                return;
            }
        };

        match self.run_claimed(turn_id, &msg).await {
            Ok(()) => {}
            // A catalog/index desync fails identically on every retry; the
            // pending claim stays, so redeliveries drop as duplicates until
            // an operator intervenes.
            Err(GiroError::DataIntegrity(detail)) => {
                error!("fatal desync on {}: {detail}", msg.external_id);
            }
            Err(e) => {
                error!("journey failed for {}: {e}", msg.external_id);
                // Give the turn back so the gateway's retry gets a clean claim.
                if let Err(release_err) = self.store.release_turn(turn_id).await {
                    error!("failed to release turn {turn_id}: {release_err}");
                }
            }
        }
    }

    /// The fallible part of the journey, run while holding the claim.
    async fn run_claimed(&self, turn_id: i64, msg: &InboundMessage) -> Result<(), GiroError> {
        let now = Utc::now();

        // --- 2. IDENTITY ---
        let identity = match self.resolve_identity(msg).await? {
            Arrival::Known(identity) => identity,
            Arrival::New(identity, greeting) => {
                return self.finish(turn_id, identity.id, msg, &greeting).await;
            }
        };

        // --- 3. BLOCK LIFECYCLE ---
        if let Gate::Finish(answer) = self.check_block(&identity, now).await? {
            return self.finish(turn_id, identity.id, msg, &answer).await;
        }

        // --- 4. DELIVERY STALENESS ---
        let age = now - msg.received_at;
        if age > Duration::seconds(self.conversation.delivery_staleness_secs) {
            warn!(
                "message {} is {}s old, apologizing instead of answering",
                msg.external_id,
                age.num_seconds()
            );
            let answer = Answer::failed(self.templates.not_delivered.clone());
            return self.finish(turn_id, identity.id, msg, &answer).await;
        }

        // --- 5. WEEKLY LIMITS ---
        if let Gate::Finish(answer) = self.check_limits(&identity, now).await? {
            return self.finish(turn_id, identity.id, msg, &answer).await;
        }

        // --- 6. CONTEXT ---
        let context = self.store.assemble_context(identity.id, now).await?;

        // --- 7. REASONING ---
        let reasoner = match msg.kind {
            ChatKind::User => &self.recommend,
            ChatKind::Business => &self.register,
        };
        let answer = reasoner.answer(msg.kind, &context, &msg.text).await?;

        // --- 8. DELIVERY AND FINALIZATION ---
        self.finish(turn_id, identity.id, msg, &answer).await
    }

    /// Deliver the answer (when it has text) and record the turn. Delivery
    /// comes first: a failed send must leave the turn unfinalized.
    async fn finish(
        &self,
        turn_id: i64,
        identity_id: i64,
        msg: &InboundMessage,
        answer: &Answer,
    ) -> Result<(), GiroError> {
        if let Some(text) = &answer.text {
            self.transport
                .send_text(msg.kind, &msg.channel_key, text)
                .await?;
        }
        self.store.finalize_turn(turn_id, identity_id, answer).await?;
        info!(
            "turn {turn_id} finalized as {} for identity {identity_id}",
            answer.outcome.as_str()
        );
        Ok(())
    }
}
