//! Event-correlated bulk edits
//!
//! Messages sent with the same `event_id` (for example every notification
//! about one CI build) can be edited together when the event changes. Only
//! the newest few are touched so a hot event id cannot fan out unbounded.

use crate::context::RequestContext;
use crate::editor::{MessageEngine, UpdateOutcome};
use crate::error::Result;
use crate::keyboard::InlineKeyboard;
use crate::store::MessageStore;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Edit applied to every message of an event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEdit {
    /// New text
    pub text: String,
    /// Only edit messages whose keyboard is in this state
    #[serde(default)]
    pub from_state: Option<String>,
    /// New inline keyboard; `None` keeps the current one
    #[serde(default)]
    pub keyboard: Option<InlineKeyboard>,
}

impl EventEdit {
    /// Text-only edit
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            from_state: None,
            keyboard: None,
        }
    }
}

/// Per-message results of a bulk edit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkEditSummary {
    /// Messages selected
    pub attempted: usize,
    /// Edited locally and remotely
    pub applied: usize,
    /// Skipped: keyboard in another state, or text already current
    pub skipped: usize,
    /// Remote refused; store restored
    pub reverted: usize,
    /// Errors
    pub failed: usize,
}

impl MessageEngine {
    /// Apply `edit` to the newest messages of `bot_id` tagged with `event_id`
    ///
    /// Per-message failures are logged and counted; only the selection itself
    /// can fail.
    #[instrument(skip_all, parent = ctx.span(), fields(bot_id = bot_id, event_id = %event_id))]
    pub async fn edit_all_with_event_id(
        &self,
        ctx: &RequestContext,
        bot_id: i64,
        event_id: &str,
        edit: &EventEdit,
    ) -> Result<BulkEditSummary> {
        let messages = self
            .store()
            .recent_by_event(bot_id, event_id, self.config().max_messages_per_event)
            .await?;

        let mut summary = BulkEditSummary {
            attempted: messages.len(),
            ..Default::default()
        };

        for msg in &messages {
            let result = match &edit.keyboard {
                Some(keyboard) => {
                    let expected = edit.from_state.as_deref().or(msg.keyboard_state());
                    self.edit_text_and_keyboard(ctx, msg, expected, edit.text.clone(), keyboard.clone())
                        .await
                }
                None => {
                    if edit
                        .from_state
                        .as_deref()
                        .is_some_and(|state| msg.keyboard_state() != Some(state))
                    {
                        summary.skipped += 1;
                        continue;
                    }
                    if msg.text == edit.text {
                        summary.skipped += 1;
                        continue;
                    }
                    self.edit_text(ctx, msg, edit.text.clone()).await
                }
            };

            match result {
                Ok(UpdateOutcome::Applied) => summary.applied += 1,
                Ok(UpdateOutcome::NoOp) => summary.skipped += 1,
                Ok(UpdateOutcome::Reverted { cause }) => {
                    warn!(message_id = ?msg.id, chat_id = msg.chat_id, error = %cause, "Correlated edit reverted");
                    summary.reverted += 1;
                }
                Err(e) => {
                    warn!(message_id = ?msg.id, chat_id = msg.chat_id, error = %e, "Correlated edit failed");
                    summary.failed += 1;
                }
            }
        }

        info!(
            attempted = summary.attempted,
            applied = summary.applied,
            skipped = summary.skipped,
            reverted = summary.reverted,
            failed = summary.failed,
            "Event edit finished"
        );
        Ok(summary)
    }
}
