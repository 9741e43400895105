//! # giro-memory
//!
//! SQLite-backed persistence for Giro: identities, turns (with the intake
//! claim that makes webhook delivery idempotent), the item catalog, and
//! conversation context assembly.

pub mod store;

pub use store::{ClaimResult, Identity, Item, Store, SENTINEL_IDENTITY_ID};
