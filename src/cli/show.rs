//! `switchboard show`

use crate::server::config::AppConfig;
use anyhow::{Context, Result};
use switchboard_core::{MessageId, MessageStore};

/// Print the stored message `id` as JSON
pub async fn run(config: &AppConfig, id: i64) -> Result<()> {
    let store = config
        .store
        .open()
        .await
        .context("Failed to open message store")?;

    let message = store
        .get_message(MessageId(id))
        .await
        .context("Failed to read message")?
        .with_context(|| format!("Message {} not found", id))?;

    println!("{}", serde_json::to_string_pretty(&message)?);
    Ok(())
}
