//! Turn intake, finalization, and rolling outcome counts.
//!
//! The gateway retries webhook deliveries, so the same message can arrive
//! more than once. Intake inserts the turn owned by the sentinel identity;
//! the UNIQUE external_id constraint makes every duplicate a no-op, and the
//! row is only reassigned to its real identity at finalization.

use super::{parse_ts, Store, SENTINEL_IDENTITY_ID};
use chrono::{DateTime, Utc};
use giro_core::{
    error::GiroError,
    message::{Answer, InboundMessage, Outcome},
};

/// What the intake claim decided for an arriving message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimResult {
    /// First arrival: the turn row was created with this id.
    Claimed(i64),
    /// A turn with this external id already exists. Drop the delivery.
    AlreadyProcessed,
}

impl Store {
    /// Claim an arriving message, exactly once per external id.
    pub async fn claim_turn(&self, msg: &InboundMessage) -> Result<ClaimResult, GiroError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO turns (external_id, identity_id, kind, inbound, received_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&msg.external_id)
        .bind(SENTINEL_IDENTITY_ID)
        .bind(msg.kind.as_str())
        .bind(&msg.text)
        .bind(msg.received_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| GiroError::Memory(format!("turn claim failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(ClaimResult::AlreadyProcessed);
        }
        Ok(ClaimResult::Claimed(result.last_insert_rowid()))
    }

    /// Delete a claimed turn so the gateway's retry can reprocess it.
    /// Only sentinel-owned rows are deletable: a finalized turn stays.
    pub async fn release_turn(&self, turn_id: i64) -> Result<(), GiroError> {
        sqlx::query("DELETE FROM turns WHERE id = ? AND identity_id = ?")
            .bind(turn_id)
            .bind(SENTINEL_IDENTITY_ID)
            .execute(&self.pool)
            .await
            .map_err(|e| GiroError::Memory(format!("turn release failed: {e}")))?;
        Ok(())
    }

    /// Record the turn's result and hand ownership from the sentinel to the
    /// real identity.
    pub async fn finalize_turn(
        &self,
        turn_id: i64,
        identity_id: i64,
        answer: &Answer,
    ) -> Result<(), GiroError> {
        let item_ids = if answer.item_ids.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&answer.item_ids)?)
        };

        sqlx::query(
            "UPDATE turns SET identity_id = ?, outbound = ?, outcome = ?, item_ids = ?, \
             finalized_at = ? WHERE id = ?",
        )
        .bind(identity_id)
        .bind(&answer.text)
        .bind(answer.outcome.as_str())
        .bind(item_ids)
        .bind(Utc::now().to_rfc3339())
        .bind(turn_id)
        .execute(&self.pool)
        .await
        .map_err(|e| GiroError::Memory(format!("turn finalize failed: {e}")))?;
        Ok(())
    }

    /// Count an identity's turns with any of `outcomes` received at or after
    /// `since`, and return the receive time of the earliest counted turn.
    ///
    /// The earliest timestamp anchors the block expiry: the window reopens
    /// seven days after the first counted turn, not after the latest.
    pub async fn count_outcomes_since(
        &self,
        identity_id: i64,
        outcomes: &[Outcome],
        since: DateTime<Utc>,
    ) -> Result<(i64, Option<DateTime<Utc>>), GiroError> {
        let placeholders = vec!["?"; outcomes.len()].join(", ");
        let sql = format!(
            "SELECT COUNT(*), MIN(received_at) FROM turns \
             WHERE identity_id = ? AND received_at >= ? AND outcome IN ({placeholders})"
        );

        let mut query = sqlx::query_as::<_, (i64, Option<String>)>(&sql)
            .bind(identity_id)
            .bind(since.to_rfc3339());
        for outcome in outcomes {
            query = query.bind(outcome.as_str());
        }

        let (count, earliest) = query
            .fetch_one(&self.pool)
            .await
            .map_err(|e| GiroError::Memory(format!("outcome count failed: {e}")))?;

        let earliest = earliest.as_deref().map(parse_ts).transpose()?;
        Ok((count, earliest))
    }
}
