//! Message and keyboard storage
//!
//! The store is the only synchronisation point between concurrent requests.
//! Every keyboard mutation is expressed as "update where identity matches AND
//! keyboard state matches", never as a blind overwrite; implementations must
//! guarantee at most one winner among concurrent updates with the same
//! predicate.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`]: process-local, for tests and development
//! - [`SqliteStore`]: durable, the default

mod memory;
mod sqlite;

#[cfg(test)]
mod tests;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::event::User;
use crate::keyboard::{Button, ChatKeyboard, InlineKeyboard};
use crate::message::{MessageId, OutgoingMessage, RemoteRef};
use async_trait::async_trait;

/// Fields replaced by a conditional swap; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyboardChange {
    /// New inline keyboard
    pub keyboard: Option<InlineKeyboard>,
    /// New text
    pub text: Option<String>,
}

/// Result of [`MessageStore::swap_keyboard`]
#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome {
    /// No message with this identity
    NotFound,
    /// The keyboard state already moved on
    StateMismatch {
        /// State label found in the store
        current: Option<String>,
    },
    /// Applied
    Swapped {
        /// The message as it was before the swap
        previous: OutgoingMessage,
    },
}

/// What a button shows: label and sub-state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonFace {
    /// Label
    pub text: String,
    /// Sub-state
    pub sub_state: u8,
}

impl From<&Button> for ButtonFace {
    fn from(button: &Button) -> Self {
        Self {
            text: button.text.clone(),
            sub_state: button.sub_state,
        }
    }
}

/// Point update of a single button
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonEdit {
    /// Row of the button
    pub row: usize,
    /// Column of the button
    pub col: usize,
    /// Data the button must still carry at `(row, col)`
    pub expected_data: String,
    /// Face the button must currently show; `None` accepts any
    pub expected_face: Option<ButtonFace>,
    /// New label
    pub text: String,
    /// New sub-state; `None` keeps it
    pub sub_state: Option<u8>,
}

/// Result of an applied [`MessageStore::update_button`]
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonUpdate {
    /// Face of the button right before the edit
    pub previous: ButtonFace,
    /// The message as stored after the edit
    pub message: OutgoingMessage,
}

/// Persisted outgoing messages
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Store a new message and return its identity
    async fn insert_message(&self, msg: &OutgoingMessage) -> Result<MessageId>;

    /// Message by identity
    async fn get_message(&self, id: MessageId) -> Result<Option<OutgoingMessage>>;

    /// Message by its remote identifiers
    async fn find_by_remote(
        &self,
        bot_id: i64,
        remote: &RemoteRef,
    ) -> Result<Option<OutgoingMessage>>;

    /// Newest unsent message of `bot_id` offered to `from_id` as inline query
    /// result `result_id`
    async fn find_inline_result(
        &self,
        bot_id: i64,
        from_id: i64,
        result_id: &str,
    ) -> Result<Option<OutgoingMessage>>;

    /// Record the remote identifiers of a stored message
    async fn set_remote(&self, id: MessageId, remote: &RemoteRef) -> Result<()>;

    /// Apply `change` only if the keyboard state equals `expected_state`
    ///
    /// `expected_state == None` matches a message without inline keyboard.
    async fn swap_keyboard(
        &self,
        id: MessageId,
        expected_state: Option<&str>,
        change: KeyboardChange,
    ) -> Result<SwapOutcome>;

    /// Point update of one button, conditioned on the keyboard state and on
    /// the button at the edited position
    ///
    /// Read and write happen atomically: the returned message includes every
    /// other cell as stored at the moment of the write. `None` when a
    /// condition did not hold.
    async fn update_button(
        &self,
        id: MessageId,
        keyboard_state: &str,
        edit: &ButtonEdit,
    ) -> Result<Option<ButtonUpdate>>;

    /// Unconditionally put back keyboard and text
    async fn restore(
        &self,
        id: MessageId,
        keyboard: Option<&InlineKeyboard>,
        text: &str,
    ) -> Result<()>;

    /// Newest `limit` messages of `bot_id` tagged with `event_id`, newest first
    async fn recent_by_event(
        &self,
        bot_id: i64,
        event_id: &str,
        limit: usize,
    ) -> Result<Vec<OutgoingMessage>>;
}

/// Reply keyboard records attached to users and chats
#[async_trait]
pub trait KeyboardStore: Send + Sync {
    /// Records attached to a user (selective keyboards)
    async fn user_keyboards(&self, user_id: i64) -> Result<Vec<ChatKeyboard>>;

    /// Records attached to a chat
    async fn chat_keyboards(&self, chat_id: i64) -> Result<Vec<ChatKeyboard>>;

    /// Remove user records for `chat_id`
    ///
    /// `user_ids == None` affects every user; `bot_id == None` every bot.
    /// Returns the number of removed records.
    async fn pull_user_keyboards(
        &self,
        user_ids: Option<&[i64]>,
        chat_id: i64,
        bot_id: Option<i64>,
    ) -> Result<u64>;

    /// Append `record` to each user's list
    async fn push_user_keyboard(&self, user_ids: &[i64], record: &ChatKeyboard) -> Result<()>;

    /// Replace the chat's records (creates the chat when missing)
    async fn set_chat_keyboards(&self, chat_id: i64, records: &[ChatKeyboard]) -> Result<()>;

    /// Remove the chat's records of `bot_id`
    async fn pull_chat_keyboards(&self, chat_id: i64, bot_id: i64) -> Result<u64>;

    /// Append a record to the chat's list
    async fn push_chat_keyboard(&self, record: &ChatKeyboard) -> Result<()>;

    /// Remember a user so mentions can be resolved
    async fn upsert_user(&self, user: &User) -> Result<()>;

    /// Ids of known users by username (case-insensitive, without `@`)
    async fn user_ids_by_usernames(&self, usernames: &[String]) -> Result<Vec<i64>>;
}

/// Both halves of the document store
pub trait Store: MessageStore + KeyboardStore {}

impl<T: MessageStore + KeyboardStore> Store for T {}
