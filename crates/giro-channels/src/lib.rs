//! # giro-channels
//!
//! WhatsApp Cloud API integration: webhook payload parsing on the way in,
//! the [`Transport`](giro_core::traits::Transport) implementation on the way
//! out.

pub mod payload;
pub mod whatsapp;

pub use whatsapp::WhatsAppTransport;
