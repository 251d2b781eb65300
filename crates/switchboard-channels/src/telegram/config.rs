//! Telegram configuration types

use crate::error::{Error, Result};
use serde::Deserialize;

/// Telegram bot configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot token (`<bot id>:<secret>`)
    pub bot_token: String,
    /// Alternative Bot API server
    #[serde(default)]
    pub api_url: Option<String>,
    /// Cache time for inline query answers (seconds)
    #[serde(default = "default_inline_cache_time")]
    pub inline_cache_time: u32,
}

fn default_inline_cache_time() -> u32 {
    300
}

impl TelegramConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| Error::Config("TELEGRAM_BOT_TOKEN not set".to_string()))?;

        let api_url = std::env::var("TELEGRAM_API_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let inline_cache_time = std::env::var("TELEGRAM_INLINE_CACHE_TIME")
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or_else(default_inline_cache_time);

        let config = Self {
            bot_token,
            api_url,
            inline_cache_time,
        };
        config.bot_id()?;
        Ok(config)
    }

    /// Create with a bot token
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_url: None,
            inline_cache_time: default_inline_cache_time(),
        }
    }

    /// Set an alternative Bot API server
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Set the inline answer cache time
    #[must_use]
    pub fn with_inline_cache_time(mut self, secs: u32) -> Self {
        self.inline_cache_time = secs;
        self
    }

    /// Bot id, taken from the token prefix
    pub fn bot_id(&self) -> Result<i64> {
        self.bot_token
            .split_once(':')
            .and_then(|(id, _)| id.parse().ok())
            .ok_or_else(|| Error::Config("bot token must look like <bot id>:<secret>".to_string()))
    }
}
