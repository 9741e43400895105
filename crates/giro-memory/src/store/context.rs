//! Conversation context assembly.

use super::{Store, SENTINEL_IDENTITY_ID};
use chrono::{DateTime, Duration, Utc};
use giro_core::{
    error::GiroError,
    message::{ContextEntry, Outcome},
};

impl Store {
    /// Assemble the reasoner's context for one identity: the most recent
    /// finalized turns inside the trailing window, oldest first.
    ///
    /// Each turn contributes its inbound line; the reply line is added only
    /// when the turn actually produced one, so deliberate silences leave the
    /// question visible without fabricating an empty answer.
    pub async fn assemble_context(
        &self,
        identity_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<ContextEntry>, GiroError> {
        // The sentinel owns only unfinalized claims; it has no history.
        if identity_id == SENTINEL_IDENTITY_ID {
            return Ok(Vec::new());
        }

        let since = now - Duration::hours(self.context_window_hours);

        let rows: Vec<(String, Option<String>, String)> = sqlx::query_as(
            "SELECT inbound, outbound, outcome FROM turns \
             WHERE identity_id = ? AND received_at >= ? AND finalized_at IS NOT NULL \
             ORDER BY received_at DESC LIMIT ?",
        )
        .bind(identity_id)
        .bind(since.to_rfc3339())
        .bind(self.max_context_turns)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| GiroError::Memory(format!("context query failed: {e}")))?;

        let mut entries = Vec::with_capacity(rows.len() * 2);
        for (inbound, outbound, outcome) in rows.into_iter().rev() {
            entries.push(ContextEntry::human(inbound));
            let answered = Outcome::parse(&outcome) != Some(Outcome::Unanswered);
            if answered {
                if let Some(text) = outbound {
                    entries.push(ContextEntry::assistant(text));
                }
            }
        }
        Ok(entries)
    }
}
