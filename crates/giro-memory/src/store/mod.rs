//! SQLite-backed persistent store.
//!
//! Split into focused submodules:
//! - `identities` — identity lookup, creation, block lifecycle
//! - `turns` — intake claim/release, finalization, rolling outcome counts
//! - `items` — the item catalog backing retrieval hits
//! - `context` — conversation context assembly for the reasoner

mod context;
mod identities;
mod items;
mod turns;

pub use identities::Identity;
pub use items::Item;
pub use turns::ClaimResult;

use chrono::{DateTime, Utc};
use giro_core::{
    config::{shellexpand, ConversationConfig, MemoryConfig},
    error::GiroError,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

/// Reserved identity owning turns between intake claim and finalization.
pub const SENTINEL_IDENTITY_ID: i64 = 1;

/// Persistent store backed by SQLite.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    context_window_hours: i64,
    max_context_turns: i64,
}

impl Store {
    /// Create a new store, running migrations on first use.
    pub async fn new(
        config: &MemoryConfig,
        conversation: &ConversationConfig,
    ) -> Result<Self, GiroError> {
        let db_path = shellexpand(&config.db_path);
        let in_memory = db_path == ":memory:";

        // Ensure parent directory exists.
        if !in_memory {
            if let Some(parent) = std::path::Path::new(&db_path).parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| GiroError::Memory(format!("failed to create data dir: {e}")))?;
            }
        }

        let mut opts = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(|e| GiroError::Memory(format!("invalid db path: {e}")))?
            .create_if_missing(true);
        if !in_memory {
            opts = opts.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        }

        // An in-memory database exists per connection, so the pool must
        // not open a second one.
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 4 })
            .connect_with(opts)
            .await
            .map_err(|e| GiroError::Memory(format!("failed to connect to sqlite: {e}")))?;

        Self::run_migrations(&pool).await?;

        info!("Store initialized at {db_path}");

        Ok(Self {
            pool,
            context_window_hours: conversation.context_window_hours,
            max_context_turns: conversation.max_context_turns,
        })
    }

    /// Get a reference to the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run SQL migrations, tracking which have already been applied.
    async fn run_migrations(pool: &SqlitePool) -> Result<(), GiroError> {
        sqlx::raw_sql(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name TEXT PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );",
        )
        .execute(pool)
        .await
        .map_err(|e| GiroError::Memory(format!("failed to create migrations table: {e}")))?;

        let migrations: &[(&str, &str)] =
            &[("001_init", include_str!("../../migrations/001_init.sql"))];

        for (name, sql) in migrations {
            let applied: Option<(String,)> =
                sqlx::query_as("SELECT name FROM _migrations WHERE name = ?")
                    .bind(name)
                    .fetch_optional(pool)
                    .await
                    .map_err(|e| {
                        GiroError::Memory(format!("failed to check migration {name}: {e}"))
                    })?;

            if applied.is_some() {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(pool)
                .await
                .map_err(|e| GiroError::Memory(format!("migration {name} failed: {e}")))?;

            sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
                .bind(name)
                .execute(pool)
                .await
                .map_err(|e| {
                    GiroError::Memory(format!("failed to record migration {name}: {e}"))
                })?;
        }
        Ok(())
    }
}

/// Parse an RFC 3339 timestamp column back into `DateTime<Utc>`.
pub(crate) fn parse_ts(s: &str) -> Result<DateTime<Utc>, GiroError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| GiroError::Memory(format!("bad timestamp '{s}': {e}")))
}
