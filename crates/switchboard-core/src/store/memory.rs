//! In-memory store
//!
//! Every operation takes the write lock for its whole duration, which gives
//! the same per-document atomicity the SQLite store gets from conditional
//! statements. Data is lost on restart.

use super::{ButtonEdit, ButtonFace, ButtonUpdate, KeyboardChange, KeyboardStore, MessageStore, SwapOutcome};
use crate::error::{Error, Result};
use crate::event::User;
use crate::keyboard::{ChatKeyboard, InlineKeyboard};
use crate::message::{MessageId, OutgoingMessage, RemoteRef};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct UserDoc {
    username: Option<String>,
    keyboards: Vec<ChatKeyboard>,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    messages: BTreeMap<MessageId, OutgoingMessage>,
    users: HashMap<i64, UserDoc>,
    chats: HashMap<i64, Vec<ChatKeyboard>>,
}

/// Process-local store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored messages
    pub async fn message_count(&self) -> usize {
        self.inner.read().await.messages.len()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, msg: &OutgoingMessage) -> Result<MessageId> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = MessageId(inner.next_id);

        let mut stored = msg.clone();
        stored.id = Some(id);
        inner.messages.insert(id, stored);

        debug!(message_id = %id, chat_id = msg.chat_id, "Message stored");
        Ok(id)
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<OutgoingMessage>> {
        Ok(self.inner.read().await.messages.get(&id).cloned())
    }

    async fn find_by_remote(
        &self,
        bot_id: i64,
        remote: &RemoteRef,
    ) -> Result<Option<OutgoingMessage>> {
        if !remote.is_sent() {
            return Ok(None);
        }
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .values()
            .rev()
            .find(|m| m.bot_id == bot_id && &m.remote == remote)
            .cloned())
    }

    async fn find_inline_result(
        &self,
        bot_id: i64,
        from_id: i64,
        result_id: &str,
    ) -> Result<Option<OutgoingMessage>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .values()
            .rev()
            .find(|m| {
                m.bot_id == bot_id
                    && m.from_id == from_id
                    && !m.remote.is_sent()
                    && m.inline_result_id.as_deref() == Some(result_id)
            })
            .cloned())
    }

    async fn set_remote(&self, id: MessageId, remote: &RemoteRef) -> Result<()> {
        let mut inner = self.inner.write().await;
        let msg = inner.messages.get_mut(&id).ok_or(Error::MessageNotFound {
            id: Some(id),
            state: None,
        })?;
        msg.remote = remote.clone();
        Ok(())
    }

    async fn swap_keyboard(
        &self,
        id: MessageId,
        expected_state: Option<&str>,
        change: KeyboardChange,
    ) -> Result<SwapOutcome> {
        let mut inner = self.inner.write().await;
        let Some(msg) = inner.messages.get_mut(&id) else {
            return Ok(SwapOutcome::NotFound);
        };

        if msg.keyboard_state() != expected_state {
            return Ok(SwapOutcome::StateMismatch {
                current: msg.keyboard_state().map(str::to_string),
            });
        }

        let previous = msg.clone();
        if let Some(keyboard) = change.keyboard {
            msg.keyboard = Some(keyboard);
        }
        if let Some(text) = change.text {
            msg.text = text;
        }
        Ok(SwapOutcome::Swapped { previous })
    }

    async fn update_button(
        &self,
        id: MessageId,
        keyboard_state: &str,
        edit: &ButtonEdit,
    ) -> Result<Option<ButtonUpdate>> {
        let mut inner = self.inner.write().await;
        let Some(msg) = inner.messages.get_mut(&id) else {
            return Ok(None);
        };
        let Some(button) = msg
            .keyboard
            .as_mut()
            .filter(|kb| kb.state == keyboard_state)
            .and_then(|kb| kb.button_mut(edit.row, edit.col))
            .filter(|button| button.data == edit.expected_data)
        else {
            return Ok(None);
        };

        let previous = ButtonFace::from(&*button);
        if edit.expected_face.as_ref().is_some_and(|face| *face != previous) {
            return Ok(None);
        }

        button.text = edit.text.clone();
        if let Some(sub_state) = edit.sub_state {
            button.sub_state = sub_state;
        }
        Ok(Some(ButtonUpdate {
            previous,
            message: msg.clone(),
        }))
    }

    async fn restore(
        &self,
        id: MessageId,
        keyboard: Option<&InlineKeyboard>,
        text: &str,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let msg = inner.messages.get_mut(&id).ok_or(Error::MessageNotFound {
            id: Some(id),
            state: None,
        })?;
        msg.keyboard = keyboard.cloned();
        msg.text = text.to_string();
        Ok(())
    }

    async fn recent_by_event(
        &self,
        bot_id: i64,
        event_id: &str,
        limit: usize,
    ) -> Result<Vec<OutgoingMessage>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .values()
            .rev()
            .filter(|m| m.bot_id == bot_id && m.event_id.as_deref() == Some(event_id))
            .take(limit)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl KeyboardStore for MemoryStore {
    async fn user_keyboards(&self, user_id: i64) -> Result<Vec<ChatKeyboard>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .get(&user_id)
            .map(|u| u.keyboards.clone())
            .unwrap_or_default())
    }

    async fn chat_keyboards(&self, chat_id: i64) -> Result<Vec<ChatKeyboard>> {
        let inner = self.inner.read().await;
        Ok(inner.chats.get(&chat_id).cloned().unwrap_or_default())
    }

    async fn pull_user_keyboards(
        &self,
        user_ids: Option<&[i64]>,
        chat_id: i64,
        bot_id: Option<i64>,
    ) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut removed = 0u64;
        for (id, user) in inner.users.iter_mut() {
            if user_ids.is_some_and(|ids| !ids.contains(id)) {
                continue;
            }
            let before = user.keyboards.len();
            user.keyboards
                .retain(|kb| !(kb.chat_id == chat_id && bot_id.map_or(true, |b| kb.bot_id == b)));
            removed += (before - user.keyboards.len()) as u64;
        }
        Ok(removed)
    }

    async fn push_user_keyboard(&self, user_ids: &[i64], record: &ChatKeyboard) -> Result<()> {
        let mut inner = self.inner.write().await;
        for id in user_ids {
            inner
                .users
                .entry(*id)
                .or_default()
                .keyboards
                .push(record.clone());
        }
        Ok(())
    }

    async fn set_chat_keyboards(&self, chat_id: i64, records: &[ChatKeyboard]) -> Result<()> {
        self.inner
            .write()
            .await
            .chats
            .insert(chat_id, records.to_vec());
        Ok(())
    }

    async fn pull_chat_keyboards(&self, chat_id: i64, bot_id: i64) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let Some(records) = inner.chats.get_mut(&chat_id) else {
            return Ok(0);
        };
        let before = records.len();
        records.retain(|kb| kb.bot_id != bot_id);
        Ok((before - records.len()) as u64)
    }

    async fn push_chat_keyboard(&self, record: &ChatKeyboard) -> Result<()> {
        self.inner
            .write()
            .await
            .chats
            .entry(record.chat_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.inner.write().await;
        let doc = inner.users.entry(user.id).or_default();
        if user.username.is_some() {
            doc.username = user.username.clone();
        }
        Ok(())
    }

    async fn user_ids_by_usernames(&self, usernames: &[String]) -> Result<Vec<i64>> {
        let wanted: Vec<String> = usernames
            .iter()
            .map(|u| u.trim_start_matches('@').to_lowercase())
            .collect();
        let inner = self.inner.read().await;
        let mut ids: Vec<i64> = inner
            .users
            .iter()
            .filter(|(_, u)| {
                u.username
                    .as_ref()
                    .is_some_and(|name| wanted.contains(&name.to_lowercase()))
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}
