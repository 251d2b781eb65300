//! Inline mode
//!
//! Messages sent through inline mode have no chat message id; Telegram only
//! reports an `inline_message_id`, and only after a user picked a result.
//! Results that carry a keyboard are therefore stored when the query is
//! answered, keyed by result id and the asking user, and bound to their
//! inline message id once the chosen-result update arrives. From then on
//! button presses and edits find them like any other sent message.

use crate::context::RequestContext;
use crate::editor::MessageEngine;
use crate::error::{Error, Result};
use crate::message::{OutgoingMessage, RemoteRef};
use crate::remote::InlineResult;
use crate::store::{MessageStore, Store};
use tracing::{debug, info, instrument};

fn offered_message(bot_id: i64, user_id: i64, result: &InlineResult) -> OutgoingMessage {
    let mut msg = OutgoingMessage::new(bot_id, 0, result.text.clone())
        .with_parse_mode(result.parse_mode);
    msg.from_id = user_id;
    msg.keyboard = result.keyboard.clone();
    msg.inline_result_id = Some(result.id.clone());
    msg
}

impl MessageEngine {
    /// Answer the inline query of `ctx`, storing every result with a keyboard
    #[instrument(skip_all, parent = ctx.span(), fields(results = results.len()))]
    pub async fn answer_inline_query(
        &self,
        ctx: &RequestContext,
        results: Vec<InlineResult>,
        cache_time: u32,
        next_offset: Option<String>,
    ) -> Result<()> {
        ctx.trigger().inline_query().ok_or(Error::NoInlineQuery)?;
        for keyboard in results.iter().filter_map(|r| r.keyboard.as_ref()) {
            keyboard.validate()?;
        }

        // Stored first: the pick can arrive right after the answer
        match ctx.user() {
            Some(user) => {
                let mut stored = 0;
                for result in results.iter().filter(|r| r.keyboard.is_some()) {
                    self.store()
                        .insert_message(&offered_message(ctx.bot_id(), user.id, result))
                        .await?;
                    stored += 1;
                }
                debug!(stored, "Inline results with keyboard stored");
            }
            None => debug!("Inline query without user, results not stored"),
        }

        ctx.answer_inline_query(results, cache_time, next_offset)
            .await
    }
}

/// Bind the stored result `result_id` offered to `user_id` to the inline
/// message it became
///
/// Repeated calls return the already bound message. `None` when the result
/// was never stored, e.g. because it had no keyboard.
pub async fn bind_chosen_result(
    store: &dyn Store,
    bot_id: i64,
    user_id: i64,
    result_id: &str,
    inline_message_id: &str,
) -> Result<Option<OutgoingMessage>> {
    let remote = RemoteRef::Inline {
        inline_message_id: inline_message_id.to_string(),
    };
    if let Some(bound) = store.find_by_remote(bot_id, &remote).await? {
        return Ok(Some(bound));
    }

    let Some(mut msg) = store.find_inline_result(bot_id, user_id, result_id).await? else {
        debug!(result_id, "Chosen inline result is not stored");
        return Ok(None);
    };
    let Some(id) = msg.id else {
        return Ok(None);
    };

    store.set_remote(id, &remote).await?;
    msg.remote = remote;
    info!(message_id = %id, result_id, "Inline message bound");
    Ok(Some(msg))
}
