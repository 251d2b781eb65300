//! Engine and store configuration

use crate::error::{Error, Result};
use crate::store::{MemoryStore, SqliteStore, Store};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Message engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Most recent messages touched by one correlated bulk edit
    #[serde(default = "default_max_messages_per_event")]
    pub max_messages_per_event: usize,
    /// Callback toast shown when the remote copy can no longer be edited
    #[serde(default = "default_outdated_notice")]
    pub outdated_notice: String,
}

fn default_max_messages_per_event() -> usize {
    10
}

fn default_outdated_notice() -> String {
    "Message may be outdated. The bot can't edit messages created before the chat was converted to a supergroup.".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_messages_per_event: default_max_messages_per_event(),
            outdated_notice: default_outdated_notice(),
        }
    }
}

impl EngineConfig {
    /// Reject settings the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_messages_per_event == 0 {
            return Err(Error::InvalidConfig(
                "max_messages_per_event must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend type: "sqlite" (default) or "memory"
    #[serde(default = "default_backend")]
    pub backend: String,
    /// SQLite database path; defaults to ~/.switchboard/switchboard.db
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
}

fn default_backend() -> String {
    "sqlite".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            sqlite_path: None,
        }
    }
}

impl StoreConfig {
    /// Open the configured backend
    pub async fn open(&self) -> Result<Arc<dyn Store>> {
        match self.backend.as_str() {
            "sqlite" => {
                let store = match &self.sqlite_path {
                    Some(path) => SqliteStore::new(path).await?,
                    None => SqliteStore::new_default().await?,
                };
                Ok(Arc::new(store))
            }
            "memory" => Ok(Arc::new(MemoryStore::new())),
            other => Err(Error::InvalidConfig(format!(
                "Unknown store backend: '{}'. Use 'sqlite' or 'memory'.",
                other
            ))),
        }
    }
}
