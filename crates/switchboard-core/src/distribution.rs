//! Reply keyboard distribution
//!
//! After a message carrying a reply keyboard (or a hide instruction) was
//! accepted by the remote service, the keyboard's checksum map is attached to
//! whoever will see it:
//!
//! | message              | attach to                      | cleared first                    |
//! |----------------------|--------------------------------|----------------------------------|
//! | selective, group     | each targeted user             | their records for the chat       |
//! | non-selective, group | the chat (sole record)         | every user's records for the chat |
//! | direct chat          | the chat                       | the chat's records of this bot   |
//!
//! Each store call is atomic on its own; the sequence is not.

use crate::error::{Error, Result};
use crate::keyboard::ChatKeyboard;
use crate::message::OutgoingMessage;
use crate::store::{KeyboardStore, Store};
use chrono::Utc;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static MENTION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_]{3,32})").ok());

/// `@usernames` mentioned in `text`, without the `@`
pub fn mentioned_usernames(text: &str) -> Vec<String> {
    let Some(re) = MENTION_RE.as_ref() else {
        return Vec::new();
    };
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Users a selective keyboard is addressed to: mentioned usernames, explicit
/// mention ids and the author of the replied-to message
pub async fn resolve_targets(store: &dyn Store, msg: &OutgoingMessage) -> Result<Vec<i64>> {
    let usernames = mentioned_usernames(&msg.text);
    let mut targets = if usernames.is_empty() {
        Vec::new()
    } else {
        store.user_ids_by_usernames(&usernames).await?
    };

    targets.extend(msg.mention_ids.iter().copied());
    targets.extend(msg.reply_to_user_id);
    targets.sort_unstable();
    targets.dedup();
    Ok(targets)
}

/// Attach (or clear) the reply keyboard of a sent message
///
/// Fails with [`Error::NoTargetUsers`] for a selective group keyboard nobody
/// is addressed by.
pub async fn store_keyboard(store: &dyn Store, msg: &OutgoingMessage) -> Result<()> {
    let targets = if msg.selective && msg.is_group() {
        let targets = resolve_targets(store, msg).await?;
        if targets.is_empty() {
            return Err(Error::NoTargetUsers);
        }
        targets
    } else {
        Vec::new()
    };
    apply(store, msg, &targets).await
}

/// Distribution with recipients already resolved
pub(crate) async fn apply(store: &dyn Store, msg: &OutgoingMessage, targets: &[i64]) -> Result<()> {
    let selective_group = msg.selective && msg.is_group();

    if let Some(reply_keyboard) = &msg.reply_keyboard {
        let msg_id = msg.remote.message_id().ok_or(Error::MessageNotFound {
            id: msg.id,
            state: None,
        })?;
        let record = ChatKeyboard {
            chat_id: msg.chat_id,
            bot_id: msg.bot_id,
            msg_id: i64::from(msg_id),
            issued_at: Utc::now(),
            keyboard: reply_keyboard.checksums(),
        };

        if selective_group {
            store
                .pull_user_keyboards(Some(targets), msg.chat_id, None)
                .await?;
            store.push_user_keyboard(targets, &record).await?;
            debug!(chat_id = msg.chat_id, users = targets.len(), "Selective keyboard stored");
        } else if msg.is_group() {
            store.pull_user_keyboards(None, msg.chat_id, None).await?;
            store
                .set_chat_keyboards(msg.chat_id, std::slice::from_ref(&record))
                .await?;
            debug!(chat_id = msg.chat_id, "Group keyboard stored");
        } else {
            store.pull_chat_keyboards(msg.chat_id, msg.bot_id).await?;
            store.push_chat_keyboard(&record).await?;
            debug!(chat_id = msg.chat_id, "Chat keyboard stored");
        }
    } else if msg.keyboard_hide {
        let removed = if selective_group {
            store
                .pull_user_keyboards(Some(targets), msg.chat_id, Some(msg.bot_id))
                .await?
        } else {
            store.pull_chat_keyboards(msg.chat_id, msg.bot_id).await?
        };
        debug!(chat_id = msg.chat_id, removed, "Keyboard records cleared");
    }

    Ok(())
}
