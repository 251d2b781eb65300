//! Remote messaging service interface
//!
//! The engine only needs a handful of operations from the service that
//! renders the messages. Failures come back already classified so the sync layer can
//! decide between "tell the user" and "just revert".

use crate::keyboard::{InlineKeyboard, ReplyKeyboard};
use crate::message::{OutgoingMessage, ParseMode, RemoteRef};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classified remote failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Bot was blocked, kicked, or the chat is gone
    #[error("chat inaccessible: {0}")]
    ChatInaccessible(String),

    /// The group was upgraded to a supergroup with a new id
    #[error("chat migrated to {new_chat_id}")]
    ChatMigrated {
        /// Id of the supergroup
        new_chat_id: i64,
    },

    /// Flood control triggered
    #[error("rate limited (retry after {retry_after:?}s)")]
    RateLimited {
        /// Seconds until the service accepts requests again
        retry_after: Option<u64>,
    },

    /// Request rejected as malformed
    #[error("validation error: {0}")]
    Validation(String),

    /// No answer in time
    #[error("request timed out")]
    Timeout,

    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl RemoteError {
    /// Conditions that are logged and surfaced as a notice rather than escalated
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RemoteError::ChatInaccessible(_)
                | RemoteError::ChatMigrated { .. }
                | RemoteError::RateLimited { .. }
        )
    }
}

/// Result type for remote calls
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Markup attached to a new message
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SendMarkup {
    /// Nothing
    #[default]
    None,
    /// Inline keyboard
    Inline(InlineKeyboard),
    /// Reply keyboard
    Reply {
        /// Buttons
        keyboard: ReplyKeyboard,
        /// Only mentioned/replied users see it
        selective: bool,
    },
    /// Remove the reply keyboard
    Remove {
        /// Only for mentioned/replied users
        selective: bool,
    },
}

/// New message request
#[derive(Debug, Clone, PartialEq)]
pub struct SendRequest {
    /// Target chat
    pub chat_id: i64,
    /// Text
    pub text: String,
    /// Formatting
    pub parse_mode: ParseMode,
    /// Link previews
    pub web_preview: bool,
    /// Message to reply to
    pub reply_to_msg_id: Option<i32>,
    /// Attached markup
    pub markup: SendMarkup,
}

impl SendRequest {
    /// Build the request for an outgoing message
    #[must_use]
    pub fn from_message(msg: &OutgoingMessage) -> Self {
        let markup = if let Some(kb) = &msg.keyboard {
            SendMarkup::Inline(kb.clone())
        } else if let Some(kb) = &msg.reply_keyboard {
            SendMarkup::Reply {
                keyboard: kb.clone(),
                selective: msg.selective,
            }
        } else if msg.keyboard_hide {
            SendMarkup::Remove {
                selective: msg.selective,
            }
        } else {
            SendMarkup::None
        };

        Self {
            chat_id: msg.chat_id,
            text: msg.text.clone(),
            parse_mode: msg.parse_mode,
            web_preview: msg.web_preview,
            reply_to_msg_id: msg.reply_to_msg_id,
            markup,
        }
    }
}

/// What the service assigned to a new message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Message id inside the chat
    pub message_id: i32,
}

/// Text edit of an existing message
#[derive(Debug, Clone, PartialEq)]
pub struct EditTextRequest {
    /// Message to edit
    pub target: RemoteRef,
    /// New text
    pub text: String,
    /// Formatting
    pub parse_mode: ParseMode,
    /// Link previews
    pub web_preview: bool,
    /// Keyboard to show after the edit; `None` removes it
    pub keyboard: Option<InlineKeyboard>,
}

/// Activity shown in the chat header while the bot prepares a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    /// "typing..."
    Typing,
    /// Sending a photo
    UploadPhoto,
    /// Recording a video
    RecordVideo,
    /// Sending a video
    UploadVideo,
    /// Recording a voice note
    RecordVoice,
    /// Sending a voice note
    UploadVoice,
    /// Sending a file
    UploadDocument,
    /// Looking up a location
    FindLocation,
}

/// Callback acknowledgement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackAnswer {
    /// Callback query id
    pub callback_id: String,
    /// Toast/alert text
    pub text: String,
    /// Show a modal alert instead of a toast
    pub show_alert: bool,
}

/// One article in an inline query answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineResult {
    /// Result id, unique within the answer
    pub id: String,
    /// Title
    pub title: String,
    /// Short description
    #[serde(default)]
    pub description: Option<String>,
    /// Message text sent when chosen
    pub text: String,
    /// Formatting of `text`
    #[serde(default)]
    pub parse_mode: ParseMode,
    /// Inline keyboard of the sent message
    #[serde(default)]
    pub keyboard: Option<InlineKeyboard>,
}

/// Inline query answer
#[derive(Debug, Clone, PartialEq)]
pub struct InlineAnswer {
    /// Inline query id
    pub query_id: String,
    /// Results
    pub results: Vec<InlineResult>,
    /// Seconds the client may cache the answer
    pub cache_time: u32,
    /// Offset for the next page
    pub next_offset: Option<String>,
    /// "Switch to private chat" button: `(text, start parameter)`
    pub switch_pm: Option<(String, String)>,
}

/// Remote messaging service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteMessenger: Send + Sync {
    /// Send a new message
    async fn send_message(&self, request: SendRequest) -> RemoteResult<SentMessage>;

    /// Replace text (and inline keyboard) of a message
    async fn edit_message_text(&self, request: EditTextRequest) -> RemoteResult<()>;

    /// Replace only the inline keyboard of a message
    async fn edit_message_reply_markup(
        &self,
        target: RemoteRef,
        keyboard: InlineKeyboard,
    ) -> RemoteResult<()>;

    /// Acknowledge a button press
    async fn answer_callback_query(&self, answer: CallbackAnswer) -> RemoteResult<()>;

    /// Answer an inline query
    async fn answer_inline_query(&self, answer: InlineAnswer) -> RemoteResult<()>;

    /// Show `action` in the chat until the next message arrives
    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> RemoteResult<()>;
}
