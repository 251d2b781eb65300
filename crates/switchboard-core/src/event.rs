//! Incoming events
//!
//! Every unit of work is triggered by at most one of: a chat message, an
//! inline query, a chosen inline result, or a button callback.

use crate::message::OutgoingMessage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// User who caused the event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User id
    pub id: i64,
    /// Username without `@`
    #[serde(default)]
    pub username: Option<String>,
    /// Display name
    #[serde(default)]
    pub first_name: String,
    /// IETF language tag reported by the client
    #[serde(default)]
    pub language_code: Option<String>,
}

/// Chat the event happened in
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// Chat id; negative for groups
    pub id: i64,
    /// Group title
    #[serde(default)]
    pub title: Option<String>,
}

impl Chat {
    /// Whether this is a group chat
    #[must_use]
    pub fn is_group(&self) -> bool {
        self.id < 0
    }
}

/// Text message sent to the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Remote message id
    pub msg_id: i32,
    /// Chat id
    pub chat_id: i64,
    /// Author id
    pub from_id: i64,
    /// Text (or caption)
    pub text: String,
    /// Message this one replies to
    #[serde(default)]
    pub reply_to_msg_id: Option<i32>,
}

/// Inline query typed by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineQuery {
    /// Query id
    pub id: String,
    /// Query text
    pub query: String,
    /// Pagination offset
    #[serde(default)]
    pub offset: String,
}

/// Inline result the user picked and sent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChosenInlineResult {
    /// Result id
    pub result_id: String,
    /// Original query
    pub query: String,
    /// Id of the sent inline message, when it has a keyboard
    #[serde(default)]
    pub inline_message_id: Option<String>,
    /// Stored copy of the generated message
    #[serde(default)]
    pub message: Option<OutgoingMessage>,
}

/// Inline button press
///
/// Shared by everything handling the request, so the message snapshot and the
/// answered flag use interior mutability.
#[derive(Debug)]
pub struct Callback {
    /// Callback query id
    pub id: String,
    /// Data of the pressed button
    pub data: String,
    /// Sub-state of the pressed button when it was pressed
    pub sub_state: u8,
    message: Mutex<OutgoingMessage>,
    answered_at: tokio::sync::Mutex<Option<DateTime<Utc>>>,
}

impl Callback {
    /// Create a callback for a press on `message`
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        data: impl Into<String>,
        sub_state: u8,
        message: OutgoingMessage,
    ) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
            sub_state,
            message: Mutex::new(message),
            answered_at: tokio::sync::Mutex::new(None),
        }
    }

    /// Copy of the message the button belongs to
    #[must_use]
    pub fn message(&self) -> OutgoingMessage {
        self.message
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the message snapshot after an edit
    pub fn set_message(&self, message: OutgoingMessage) {
        *self.message.lock().unwrap_or_else(PoisonError::into_inner) = message;
    }

    /// When the callback was answered, if it was
    pub async fn answered_at(&self) -> Option<DateTime<Utc>> {
        *self.answered_at.lock().await
    }

    /// Answered flag guard; holding it serialises answer attempts
    pub(crate) fn answer_slot(&self) -> &tokio::sync::Mutex<Option<DateTime<Utc>>> {
        &self.answered_at
    }
}

/// What triggered the current unit of work
#[derive(Debug, Default)]
pub enum Trigger {
    /// Text message
    Message(IncomingMessage),
    /// Inline query
    InlineQuery(InlineQuery),
    /// Chosen inline result
    ChosenInlineResult(ChosenInlineResult),
    /// Button press
    Callback(Callback),
    /// External webhook, scheduled job, CLI
    #[default]
    None,
}

impl Trigger {
    /// Short name for logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::InlineQuery(_) => "inline_query",
            Self::ChosenInlineResult(_) => "chosen_inline_result",
            Self::Callback(_) => "callback",
            Self::None => "none",
        }
    }

    /// Incoming message, if that is the trigger
    #[must_use]
    pub fn message(&self) -> Option<&IncomingMessage> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    /// Inline query, if that is the trigger
    #[must_use]
    pub fn inline_query(&self) -> Option<&InlineQuery> {
        match self {
            Self::InlineQuery(q) => Some(q),
            _ => None,
        }
    }

    /// Chosen inline result, if that is the trigger
    #[must_use]
    pub fn chosen_inline_result(&self) -> Option<&ChosenInlineResult> {
        match self {
            Self::ChosenInlineResult(r) => Some(r),
            _ => None,
        }
    }

    /// Callback, if that is the trigger
    #[must_use]
    pub fn callback(&self) -> Option<&Callback> {
        match self {
            Self::Callback(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_accessors() {
        let trigger = Trigger::Message(IncomingMessage {
            msg_id: 1,
            chat_id: 2,
            from_id: 3,
            text: "hi".to_string(),
            reply_to_msg_id: None,
        });
        assert_eq!(trigger.kind(), "message");
        assert!(trigger.message().is_some());
        assert!(trigger.callback().is_none());
        assert!(trigger.inline_query().is_none());

        assert_eq!(Trigger::default().kind(), "none");
    }

    #[tokio::test]
    async fn test_callback_snapshot() {
        let cb = Callback::new("q1", "toggle", 0, OutgoingMessage::new(1, 2, "before"));
        assert_eq!(cb.message().text, "before");

        let mut msg = cb.message();
        msg.text = "after".to_string();
        cb.set_message(msg);

        assert_eq!(cb.message().text, "after");
        assert!(cb.answered_at().await.is_none());
    }
}
