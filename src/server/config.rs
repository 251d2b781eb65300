//! Server configuration types
//!
//! Contains all configuration structures for the Switchboard service.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use switchboard_channels::TelegramConfig;
use switchboard_core::{EngineConfig, StoreConfig};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub telegram: TelegramAppConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Telegram bot settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramAppConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Empty: read TELEGRAM_BOT_TOKEN
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub api_url: Option<String>,
    /// Poll for updates; off when another process receives them
    #[serde(default = "default_true")]
    pub polling: bool,
    #[serde(default = "default_inline_cache_time")]
    pub inline_cache_time: u32,
}

fn default_true() -> bool {
    true
}

fn default_inline_cache_time() -> u32 {
    300
}

impl Default for TelegramAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: String::new(),
            api_url: None,
            polling: true,
            inline_cache_time: default_inline_cache_time(),
        }
    }
}

impl TelegramAppConfig {
    /// Adapter configuration, falling back to the environment for the token
    pub fn resolve(&self) -> Result<TelegramConfig> {
        let mut config = if self.bot_token.trim().is_empty() {
            TelegramConfig::from_env().context("Telegram bot token not configured")?
        } else {
            TelegramConfig::new(self.bot_token.trim())
        };
        if let Some(url) = &self.api_url {
            config = config.with_api_url(url);
        }
        Ok(config.with_inline_cache_time(self.inline_cache_time))
    }
}

/// Webhook endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Shared secret; hooks are rejected while unset
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_secret_header")]
    pub secret_header: String,
}

fn default_secret_header() -> String {
    "x-hook-secret".to_string()
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            secret: None,
            secret_header: default_secret_header(),
        }
    }
}
