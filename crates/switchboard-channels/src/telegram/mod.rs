//! Telegram - teloxide adapter
//!
//! This module provides the Telegram implementation of the remote messenger
//! and the update loop feeding the message engine.

mod adapter;
mod config;
mod handler;
mod markup;
mod normalize;

#[cfg(test)]
mod tests;

// Re-export all public types
pub use adapter::TelegramAdapter;
pub use config::TelegramConfig;
pub use handler::InteractionHandler;
pub use markup::classify;
pub use normalize::{normalize_update, Normalized};
