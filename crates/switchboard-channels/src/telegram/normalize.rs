//! Telegram update normalisation
//!
//! Turns a Bot API `Update` into the engine's trigger, user and chat. Button
//! presses are resolved against the store so the callback carries the stored
//! message, chosen inline results are bound to their inline message, and
//! senders are remembered so later `@mentions` resolve.

use std::sync::Arc;
use switchboard_core::context::RequestContext;
use switchboard_core::event::{
    Callback, Chat, ChosenInlineResult, IncomingMessage, InlineQuery, Trigger, User,
};
use switchboard_core::inline::bind_chosen_result;
use switchboard_core::message::{OutgoingMessage, RemoteRef};
use switchboard_core::remote::RemoteMessenger;
use switchboard_core::store::{KeyboardStore, MessageStore, Store};
use teloxide::types::{
    CallbackQuery as TelegramCallback, Message as TelegramMessage, Update, UpdateKind,
    User as TelegramUser,
};
use tracing::debug;

/// Engine view of one update
#[derive(Debug)]
pub struct Normalized {
    /// Who caused the update
    pub user: Option<User>,
    /// Where it happened; `None` for inline mode
    pub chat: Option<Chat>,
    /// What happened
    pub trigger: Trigger,
}

impl Normalized {
    /// Request context for handling this update
    pub fn into_context(
        self,
        service: &str,
        bot_id: i64,
        remote: Arc<dyn RemoteMessenger>,
    ) -> RequestContext {
        let mut ctx = RequestContext::new(service, bot_id, remote);
        if let Some(user) = self.user {
            ctx = ctx.with_user(user);
        }
        if let Some(chat) = self.chat {
            ctx = ctx.with_chat(chat);
        }
        ctx.with_trigger(self.trigger)
    }
}

fn user(from: &TelegramUser) -> User {
    User {
        id: from.id.0 as i64,
        username: from.username.clone(),
        first_name: from.first_name.clone(),
        language_code: from.language_code.clone(),
    }
}

fn chat(msg: &TelegramMessage) -> Chat {
    Chat {
        id: msg.chat.id.0,
        title: msg.chat.title().map(str::to_string),
    }
}

/// Normalise `update`; `None` for update kinds the engine does not handle
pub async fn normalize_update(
    store: &dyn Store,
    bot_id: i64,
    update: &Update,
) -> switchboard_core::Result<Option<Normalized>> {
    let normalized = match &update.kind {
        UpdateKind::Message(msg) => {
            let Some(from) = msg.from.as_ref() else {
                return Ok(None);
            };
            let text = msg.text().or_else(|| msg.caption()).unwrap_or("");
            Normalized {
                user: Some(user(from)),
                chat: Some(chat(msg)),
                trigger: Trigger::Message(IncomingMessage {
                    msg_id: msg.id.0,
                    chat_id: msg.chat.id.0,
                    from_id: from.id.0 as i64,
                    text: text.to_string(),
                    reply_to_msg_id: msg.reply_to_message().map(|r| r.id.0),
                }),
            }
        }
        UpdateKind::CallbackQuery(q) => {
            let chat = q.message.as_ref().map(|m| Chat {
                id: m.chat().id.0,
                title: m.chat().title().map(str::to_string),
            });
            Normalized {
                user: Some(user(&q.from)),
                chat,
                trigger: Trigger::Callback(callback(store, bot_id, q).await?),
            }
        }
        UpdateKind::InlineQuery(q) => Normalized {
            user: Some(user(&q.from)),
            chat: None,
            trigger: Trigger::InlineQuery(InlineQuery {
                id: q.id.to_string(),
                query: q.query.clone(),
                offset: q.offset.clone(),
            }),
        },
        UpdateKind::ChosenInlineResult(r) => {
            let result_id = r.result_id.to_string();
            let message = match &r.inline_message_id {
                Some(id) => {
                    let user_id = r.from.id.0 as i64;
                    bind_chosen_result(store, bot_id, user_id, &result_id, &id.to_string())
                        .await?
                }
                None => None,
            };
            Normalized {
                user: Some(user(&r.from)),
                chat: None,
                trigger: Trigger::ChosenInlineResult(ChosenInlineResult {
                    result_id,
                    query: r.query.clone(),
                    inline_message_id: r.inline_message_id.as_ref().map(|id| id.to_string()),
                    message,
                }),
            }
        }
        _ => {
            debug!(update_id = ?update.id, "Ignoring update kind");
            return Ok(None);
        }
    };

    if let Some(user) = &normalized.user {
        store.upsert_user(user).await?;
    }
    Ok(Some(normalized))
}

/// Callback carrying the stored message the pressed button belongs to
///
/// Presses on messages the store does not know get a placeholder snapshot
/// without identity: they can still be answered, every edit fails with
/// `MessageNotFound`.
async fn callback(
    store: &dyn Store,
    bot_id: i64,
    q: &TelegramCallback,
) -> switchboard_core::Result<Callback> {
    let data = q.data.clone().unwrap_or_default();

    let remote = match (&q.message, &q.inline_message_id) {
        (Some(m), _) => RemoteRef::Chat {
            chat_id: m.chat().id.0,
            message_id: m.id().0,
        },
        (None, Some(id)) => RemoteRef::Inline {
            inline_message_id: id.to_string(),
        },
        (None, None) => RemoteRef::Unsent,
    };

    let stored = if remote.is_sent() {
        store.find_by_remote(bot_id, &remote).await?
    } else {
        None
    };

    let message = match stored {
        Some(message) => message,
        None => {
            debug!(data = %data, "Callback for a message not in the store");
            let chat_id = match &remote {
                RemoteRef::Chat { chat_id, .. } => *chat_id,
                _ => 0,
            };
            let mut placeholder = OutgoingMessage::new(bot_id, chat_id, "");
            placeholder.remote = remote;
            placeholder
        }
    };

    let sub_state = message
        .keyboard
        .as_ref()
        .and_then(|kb| kb.find(&data).and_then(|(row, col)| kb.button(row, col)))
        .map_or(0, |b| b.sub_state);

    Ok(Callback::new(q.id.to_string(), data, sub_state, message))
}
