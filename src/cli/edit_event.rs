//! `switchboard edit-event`

use crate::server::build_runtime;
use crate::server::config::AppConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use switchboard_core::{EventEdit, RemoteMessenger, RequestContext};

/// Apply a text edit to the newest messages of `event_id`
pub async fn run(
    config: &AppConfig,
    event_id: &str,
    text: String,
    from_state: Option<String>,
) -> Result<()> {
    let runtime = build_runtime(config).await?;
    let bot_id = runtime.adapter.bot_id();

    let remote: Arc<dyn RemoteMessenger> = runtime.adapter.clone();
    let ctx = RequestContext::new("cli", bot_id, remote);
    let edit = EventEdit {
        from_state,
        ..EventEdit::text(text)
    };

    let summary = runtime
        .engine
        .edit_all_with_event_id(&ctx, bot_id, event_id, &edit)
        .await
        .context("Failed to edit event messages")?;

    println!(
        "{} message(s): {} applied, {} skipped, {} reverted, {} failed",
        summary.attempted, summary.applied, summary.skipped, summary.reverted, summary.failed
    );
    Ok(())
}
