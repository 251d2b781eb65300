//! Active reply keyboard lookup
//!
//! A user's own (selective) records win over the chat-wide ones. Having no
//! keyboard at all is normal and reported as `None`.

use crate::context::RequestContext;
use crate::editor::MessageEngine;
use crate::error::Result;
use crate::event::IncomingMessage;
use crate::keyboard::ChatKeyboard;
use crate::store::{KeyboardStore, Store};
use tracing::debug;

/// Reply keyboard button matched by an incoming text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardAnswer {
    /// Payload attached to the button
    pub data: String,
    /// Text of the button
    pub button_text: String,
}

/// Reply keyboard currently shown to `user_id` in `chat_id` by `bot_id`
pub async fn resolve_active_keyboard(
    store: &dyn Store,
    user_id: i64,
    chat_id: i64,
    bot_id: i64,
) -> Result<Option<ChatKeyboard>> {
    let matches = |kb: &ChatKeyboard| kb.chat_id == chat_id && kb.bot_id == bot_id;

    if let Some(record) = store
        .user_keyboards(user_id)
        .await?
        .into_iter()
        .find(|kb| matches(kb))
    {
        return Ok(Some(record));
    }

    Ok(store
        .chat_keyboards(chat_id)
        .await?
        .into_iter()
        .find(|kb| matches(kb)))
}

/// Match an incoming text against a stored keyboard
///
/// In groups the text only counts as a button press if it replies to the
/// message that carried the keyboard.
pub fn match_reply(
    record: &ChatKeyboard,
    message: &IncomingMessage,
    is_group: bool,
) -> Option<KeyboardAnswer> {
    if is_group && message.reply_to_msg_id.map(i64::from) != Some(record.msg_id) {
        return None;
    }

    record.payload_for(&message.text).map(|data| KeyboardAnswer {
        data: data.to_string(),
        button_text: message.text.clone(),
    })
}

impl MessageEngine {
    /// Reply keyboard button pressed by the message that triggered `ctx`
    pub async fn keyboard_answer(&self, ctx: &RequestContext) -> Result<Option<KeyboardAnswer>> {
        let (Some(message), Some(user)) = (ctx.trigger().message(), ctx.user()) else {
            return Ok(None);
        };
        let chat_id = message.chat_id;

        let Some(record) =
            resolve_active_keyboard(self.store(), user.id, chat_id, ctx.bot_id()).await?
        else {
            return Ok(None);
        };

        let answer = match_reply(&record, message, chat_id < 0);
        if let Some(answer) = &answer {
            debug!(parent: ctx.span(), data = %answer.data, "Reply keyboard button pressed");
        }
        Ok(answer)
    }
}
