//! Outgoing messages as the bot last sent them

use crate::keyboard::{InlineKeyboard, ReplyKeyboard};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Store-assigned message identity
///
/// Increases monotonically, so "newest first" is ordering by id descending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Text formatting understood by the remote service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// No markup
    #[default]
    Plain,
    /// HTML subset
    Html,
    /// MarkdownV2
    Markdown,
}

impl ParseMode {
    /// Stable name used in storage
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Html => "html",
            Self::Markdown => "markdown",
        }
    }

    /// Parse a stored name; unknown names fall back to plain text
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "html" => Self::Html,
            "markdown" => Self::Markdown,
            _ => Self::Plain,
        }
    }
}

/// Where the message lives on the remote side
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RemoteRef {
    /// Not sent yet
    #[default]
    Unsent,
    /// Sent to a chat
    Chat {
        /// Chat id
        chat_id: i64,
        /// Message id inside the chat
        message_id: i32,
    },
    /// Sent through an inline query result; has no chat
    Inline {
        /// Inline message id
        inline_message_id: String,
    },
}

impl RemoteRef {
    /// Whether the remote service knows this message
    #[must_use]
    pub fn is_sent(&self) -> bool {
        !matches!(self, RemoteRef::Unsent)
    }

    /// Message id inside the chat, when sent to a chat
    #[must_use]
    pub fn message_id(&self) -> Option<i32> {
        match self {
            RemoteRef::Chat { message_id, .. } => Some(*message_id),
            _ => None,
        }
    }

    /// Inline message id, when sent via inline query
    #[must_use]
    pub fn inline_message_id(&self) -> Option<&str> {
        match self {
            RemoteRef::Inline { inline_message_id } => Some(inline_message_id),
            _ => None,
        }
    }
}

/// A message sent (or about to be sent) by the bot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Store identity; `None` until stored
    pub id: Option<MessageId>,
    /// Bot that sends the message
    pub bot_id: i64,
    /// Target chat; negative for groups
    pub chat_id: i64,
    /// Sender shown in the chat
    pub from_id: i64,
    /// Remote identifiers
    #[serde(default)]
    pub remote: RemoteRef,
    /// Message text
    pub text: String,
    /// Text formatting
    #[serde(default)]
    pub parse_mode: ParseMode,
    /// Whether link previews are shown
    #[serde(default = "default_true")]
    pub web_preview: bool,
    /// Inline keyboard
    #[serde(default)]
    pub keyboard: Option<InlineKeyboard>,
    /// Reply keyboard
    #[serde(default)]
    pub reply_keyboard: Option<ReplyKeyboard>,
    /// Remove the current reply keyboard
    #[serde(default)]
    pub keyboard_hide: bool,
    /// Address the reply keyboard to mentioned/replied users only
    #[serde(default)]
    pub selective: bool,
    /// Remote message this one replies to
    #[serde(default)]
    pub reply_to_msg_id: Option<i32>,
    /// Author of the message replied to
    #[serde(default)]
    pub reply_to_user_id: Option<i64>,
    /// Users mentioned without a username
    #[serde(default)]
    pub mention_ids: Vec<i64>,
    /// Correlation id for bulk edits
    #[serde(default)]
    pub event_id: Option<String>,
    /// Inline query result this message was offered as
    #[serde(default)]
    pub inline_result_id: Option<String>,
    /// When the message was created
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl OutgoingMessage {
    /// Create a message from `bot_id` to `chat_id`
    #[must_use]
    pub fn new(bot_id: i64, chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            id: None,
            bot_id,
            chat_id,
            from_id: bot_id,
            remote: RemoteRef::Unsent,
            text: text.into(),
            parse_mode: ParseMode::Plain,
            web_preview: true,
            keyboard: None,
            reply_keyboard: None,
            keyboard_hide: false,
            selective: false,
            reply_to_msg_id: None,
            reply_to_user_id: None,
            mention_ids: Vec::new(),
            event_id: None,
            inline_result_id: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the target chat is a group
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.chat_id < 0
    }

    /// State label of the inline keyboard, if any
    #[must_use]
    pub fn keyboard_state(&self) -> Option<&str> {
        self.keyboard.as_ref().map(|kb| kb.state.as_str())
    }

    /// Set the inline keyboard
    #[must_use]
    pub fn with_keyboard(mut self, keyboard: InlineKeyboard) -> Self {
        self.keyboard = Some(keyboard);
        self
    }

    /// Set the reply keyboard
    #[must_use]
    pub fn with_reply_keyboard(mut self, keyboard: ReplyKeyboard) -> Self {
        self.reply_keyboard = Some(keyboard);
        self
    }

    /// Ask the client to remove the reply keyboard
    #[must_use]
    pub fn hide_keyboard(mut self) -> Self {
        self.keyboard_hide = true;
        self
    }

    /// Address reply keyboard changes to mentioned/replied users only
    #[must_use]
    pub fn selective(mut self) -> Self {
        self.selective = true;
        self
    }

    /// Set the correlation id
    #[must_use]
    pub fn with_event_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = Some(event_id.into());
        self
    }

    /// Set the text formatting
    #[must_use]
    pub fn with_parse_mode(mut self, parse_mode: ParseMode) -> Self {
        self.parse_mode = parse_mode;
        self
    }

    /// Disable link previews
    #[must_use]
    pub fn without_web_preview(mut self) -> Self {
        self.web_preview = false;
        self
    }

    /// Reply to a remote message written by `user_id`
    #[must_use]
    pub fn reply_to(mut self, msg_id: i32, user_id: Option<i64>) -> Self {
        self.reply_to_msg_id = Some(msg_id);
        self.reply_to_user_id = user_id;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_ref_accessors() {
        let chat = RemoteRef::Chat {
            chat_id: -100,
            message_id: 42,
        };
        assert!(chat.is_sent());
        assert_eq!(chat.message_id(), Some(42));
        assert_eq!(chat.inline_message_id(), None);

        let inline = RemoteRef::Inline {
            inline_message_id: "AAE".to_string(),
        };
        assert_eq!(inline.inline_message_id(), Some("AAE"));
        assert!(!RemoteRef::Unsent.is_sent());
    }

    #[test]
    fn test_builder() {
        let msg = OutgoingMessage::new(1, -100, "hello")
            .with_keyboard(InlineKeyboard::new("menu"))
            .with_event_id("build-17")
            .without_web_preview();

        assert!(msg.is_group());
        assert_eq!(msg.keyboard_state(), Some("menu"));
        assert_eq!(msg.event_id.as_deref(), Some("build-17"));
        assert!(!msg.web_preview);
        assert_eq!(msg.from_id, 1);
    }

    #[test]
    fn test_deserialize_defaults() {
        let msg: OutgoingMessage = serde_json::from_str(
            r#"{"id":null,"bot_id":1,"chat_id":5,"from_id":1,"text":"t","created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert!(msg.web_preview);
        assert_eq!(msg.remote, RemoteRef::Unsent);
        assert_eq!(msg.parse_mode, ParseMode::Plain);
    }
}
