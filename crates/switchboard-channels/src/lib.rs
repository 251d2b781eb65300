//! Switchboard Channels - Transport Adapters
//!
//! This crate connects the message engine to the outside world:
//! - Telegram (via teloxide): the remote messenger and update normalisation
//! - Webhooks: request context for external event notifications

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod telegram;
pub mod webhook;

pub use error::{Error, Result};

// Re-export Telegram adapter
pub use telegram::{
    normalize_update, InteractionHandler, Normalized, TelegramAdapter, TelegramConfig,
};

// Re-export webhook context
pub use webhook::WebhookContext;
