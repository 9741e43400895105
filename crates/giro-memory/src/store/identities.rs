//! Identity lookup, creation, and block lifecycle.

use super::{parse_ts, Store, SENTINEL_IDENTITY_ID};
use chrono::{DateTime, Utc};
use giro_core::{error::GiroError, message::ChatKind};

/// One known correspondent on one chat surface.
#[derive(Debug, Clone)]
pub struct Identity {
    pub id: i64,
    pub kind: ChatKind,
    pub channel_key: String,
    pub is_blocked: bool,
    /// When a temporary block lapses. `None` on a blocked identity means
    /// the block is indefinite (capacity overflow, manual block).
    pub block_expires_at: Option<DateTime<Utc>>,
    pub is_admin: bool,
}

type IdentityRow = (i64, String, String, bool, Option<String>, bool);

fn from_row(row: IdentityRow) -> Result<Identity, GiroError> {
    let (id, kind, channel_key, is_blocked, block_expires_at, is_admin) = row;
    let kind = match kind.as_str() {
        "user" => ChatKind::User,
        "business" => ChatKind::Business,
        other => {
            return Err(GiroError::Memory(format!(
                "identity {id} has unknown kind '{other}'"
            )))
        }
    };
    let block_expires_at = block_expires_at.as_deref().map(parse_ts).transpose()?;
    Ok(Identity {
        id,
        kind,
        channel_key,
        is_blocked,
        block_expires_at,
        is_admin,
    })
}

const IDENTITY_COLUMNS: &str =
    "id, kind, channel_key, is_blocked, block_expires_at, is_admin";

impl Store {
    /// Find the identity for a (kind, channel key) pair.
    pub async fn find_identity(
        &self,
        kind: ChatKind,
        channel_key: &str,
    ) -> Result<Option<Identity>, GiroError> {
        let row: Option<IdentityRow> = sqlx::query_as(&format!(
            "SELECT {IDENTITY_COLUMNS} FROM identities \
             WHERE kind = ? AND channel_key = ? AND id != ?"
        ))
        .bind(kind.as_str())
        .bind(channel_key)
        .bind(SENTINEL_IDENTITY_ID)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GiroError::Memory(format!("identity lookup failed: {e}")))?;

        row.map(from_row).transpose()
    }

    /// Create an identity. `blocked` marks it refused-at-the-door, which is
    /// how arrivals past the capacity cap are recorded.
    pub async fn create_identity(
        &self,
        kind: ChatKind,
        channel_key: &str,
        blocked: bool,
    ) -> Result<Identity, GiroError> {
        let result = sqlx::query(
            "INSERT INTO identities (kind, channel_key, is_blocked) VALUES (?, ?, ?)",
        )
        .bind(kind.as_str())
        .bind(channel_key)
        .bind(blocked)
        .execute(&self.pool)
        .await
        .map_err(|e| GiroError::Memory(format!("identity insert failed: {e}")))?;

        Ok(Identity {
            id: result.last_insert_rowid(),
            kind,
            channel_key: channel_key.to_string(),
            is_blocked: blocked,
            block_expires_at: None,
            is_admin: false,
        })
    }

    /// Count identities of one kind, excluding the intake sentinel.
    pub async fn identity_count(&self, kind: ChatKind) -> Result<i64, GiroError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM identities WHERE kind = ? AND id != ?")
                .bind(kind.as_str())
                .bind(SENTINEL_IDENTITY_ID)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| GiroError::Memory(format!("identity count failed: {e}")))?;
        Ok(count)
    }

    /// Block an identity until `expires_at` (`None` for indefinite).
    pub async fn block_identity(
        &self,
        identity_id: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), GiroError> {
        sqlx::query("UPDATE identities SET is_blocked = 1, block_expires_at = ? WHERE id = ?")
            .bind(expires_at.map(|t| t.to_rfc3339()))
            .bind(identity_id)
            .execute(&self.pool)
            .await
            .map_err(|e| GiroError::Memory(format!("block update failed: {e}")))?;
        Ok(())
    }

    /// Clear an identity's block and its expiry.
    pub async fn unblock_identity(&self, identity_id: i64) -> Result<(), GiroError> {
        sqlx::query(
            "UPDATE identities SET is_blocked = 0, block_expires_at = NULL WHERE id = ?",
        )
        .bind(identity_id)
        .execute(&self.pool)
        .await
        .map_err(|e| GiroError::Memory(format!("unblock update failed: {e}")))?;
        Ok(())
    }
}
