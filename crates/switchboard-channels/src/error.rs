//! Error types for switchboard-channels

use thiserror::Error;

/// Channel error type
#[derive(Debug, Error)]
pub enum Error {
    /// Telegram error
    #[error("telegram error: {0}")]
    Telegram(String),

    /// Invalid adapter configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Webhook body could not be decoded
    #[error("webhook payload error: {0}")]
    Payload(String),

    /// Engine or store error
    #[error(transparent)]
    Core(#[from] switchboard_core::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
