//! Block lifecycle and weekly rate limits.
//!
//! Counts are recomputed from the turn log on every decision; nothing is
//! cached, so a crash or redeploy cannot lose limit state. The block expiry
//! anchors to the first counted turn: the window reopens exactly one week
//! after the turn that opened it.

use super::Journey;
use chrono::{DateTime, Duration, Utc};
use giro_core::{
    error::GiroError,
    message::{Answer, ChatKind, Outcome},
    templates::Templates,
};
use giro_memory::Identity;
use tracing::info;

/// Length of the rolling limit window.
const WINDOW_DAYS: i64 = 7;

/// Date format users see in limit messages.
const EXPIRY_FORMAT: &str = "%d/%m/%Y";

/// What the limit gate decided.
pub(super) enum Gate {
    /// Under every limit: carry on to the reasoner.
    Proceed,
    /// The turn ends here with this answer (silent when its text is absent).
    Finish(Answer),
}

impl Journey {
    /// Passive side of the block lifecycle: expiry is only ever evaluated
    /// when a blocked identity speaks.
    pub(super) async fn check_block(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<Gate, GiroError> {
        if !identity.is_blocked {
            return Ok(Gate::Proceed);
        }
        match identity.block_expires_at {
            // An indefinite block (capacity refusal, manual) stays silent.
            None => Ok(Gate::Finish(Answer::unanswered())),
            Some(expires) if expires > now => Ok(Gate::Finish(Answer::unanswered())),
            Some(_) => {
                info!("block expired for identity {}, unblocking", identity.id);
                self.store.unblock_identity(identity.id).await?;
                // This message triggered the unblock; the next one gets a
                // real answer.
                Ok(Gate::Finish(Answer::template(
                    self.templates.unblocked.clone(),
                )))
            }
        }
    }

    /// Active weekly limits for one identity.
    pub(super) async fn check_limits(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<Gate, GiroError> {
        if identity.is_admin {
            return Ok(Gate::Proceed);
        }

        // Limits guard the retrieval budget; the business chat has none.
        if identity.kind == ChatKind::Business {
            return Ok(Gate::Proceed);
        }

        let since = now - Duration::days(WINDOW_DAYS);

        // The answer limit is checked first: a sender who exhausted both
        // budgets is told about the answers, not the refusals.
        let (answers, earliest) = self
            .store
            .count_outcomes_since(identity.id, &[Outcome::Ai], since)
            .await?;
        if answers >= self.limits.weekly_answer_limit {
            let until = block_until(earliest, now);
            info!(
                "identity {} hit answer limit ({answers}), blocked until {until}",
                identity.id
            );
            self.store.block_identity(identity.id, Some(until)).await?;
            return Ok(Gate::Finish(Answer::template(Templates::render_limit(
                &self.templates.weekly_answer_limit,
                self.limits.weekly_answer_limit,
                &until.format(EXPIRY_FORMAT).to_string(),
            ))));
        }

        let (refusals, earliest) = self
            .store
            .count_outcomes_since(identity.id, &[Outcome::Blocked], since)
            .await?;
        if refusals >= self.limits.weekly_block_limit {
            let until = block_until(earliest, now);
            info!(
                "identity {} hit refusal limit ({refusals}), blocked until {until}",
                identity.id
            );
            self.store.block_identity(identity.id, Some(until)).await?;
            return Ok(Gate::Finish(Answer::template(Templates::render_limit(
                &self.templates.weekly_block_limit,
                self.limits.weekly_block_limit,
                &until.format(EXPIRY_FORMAT).to_string(),
            ))));
        }

        Ok(Gate::Proceed)
    }
}

/// One week after the first counted turn, never in the past.
fn block_until(earliest: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    earliest.unwrap_or(now) + Duration::days(WINDOW_DAYS)
}
