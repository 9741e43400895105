//! # giro-core
//!
//! Core types, traits, configuration, and error handling for the Giro
//! assistant: message and outcome vocabulary, the query filter compiler, and
//! the seams toward the reasoning, retrieval, and messaging collaborators.

pub mod config;
pub mod error;
pub mod filter;
pub mod message;
pub mod templates;
pub mod traits;
