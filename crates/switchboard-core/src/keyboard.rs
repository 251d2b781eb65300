//! Keyboard model
//!
//! Two kinds of keyboards exist:
//!
//! - [`InlineKeyboard`]: buttons attached to a message. Presses arrive as
//!   callbacks carrying the button's `data`. The keyboard's `state` label is
//!   the version token every conditional edit is checked against.
//! - [`ReplyKeyboard`]: text buttons shown instead of the input field. A press
//!   arrives as a plain text message, so only a checksum of the text is kept
//!   (see [`ChatKeyboard`]).

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Telegram rejects callback data longer than this (bytes)
pub const MAX_CALLBACK_DATA_LEN: usize = 64;

/// Highest allowed button sub-state
pub const MAX_SUB_STATE: u8 = 9;

/// A single inline button
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Label shown to the user
    pub text: String,
    /// Opaque callback payload
    #[serde(default)]
    pub data: String,
    /// Link target, for URL buttons
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Application-level toggle (e.g. checked/unchecked), 0..=9
    #[serde(default)]
    pub sub_state: u8,
}

impl Button {
    /// Create a callback button
    #[must_use]
    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: data.into(),
            url: None,
            sub_state: 0,
        }
    }

    /// Create a URL button
    #[must_use]
    pub fn link(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            data: String::new(),
            url: Some(url.into()),
            sub_state: 0,
        }
    }

    /// Set the sub-state
    #[must_use]
    pub fn with_sub_state(mut self, sub_state: u8) -> Self {
        self.sub_state = sub_state;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.url.is_none() && self.data.is_empty() {
            return Err(Error::InvalidButton(format!(
                "button '{}' has neither data nor url",
                self.text
            )));
        }
        if let Some(link) = &self.url {
            url::Url::parse(link).map_err(|e| {
                Error::InvalidButton(format!("url of button '{}' is invalid: {e}", self.text))
            })?;
        }
        if self.data.len() > MAX_CALLBACK_DATA_LEN {
            return Err(Error::InvalidButton(format!(
                "data of button '{}' is {} bytes, limit is {}",
                self.text,
                self.data.len(),
                MAX_CALLBACK_DATA_LEN
            )));
        }
        if self.sub_state > MAX_SUB_STATE {
            return Err(Error::InvalidButton(format!(
                "sub-state of button '{}' must be 0-{}, got {}",
                self.text, MAX_SUB_STATE, self.sub_state
            )));
        }
        Ok(())
    }
}

/// Rows of buttons, addressed by `(row, col)`
pub type KeyboardGrid = Vec<Vec<Button>>;

/// Inline keyboard with its state label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineKeyboard {
    /// Which logical screen of buttons is shown
    pub state: String,
    /// Button grid
    #[serde(default)]
    pub buttons: KeyboardGrid,
}

impl InlineKeyboard {
    /// Create an empty keyboard with a state label
    #[must_use]
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            buttons: Vec::new(),
        }
    }

    /// Append a row
    #[must_use]
    pub fn with_row(mut self, row: Vec<Button>) -> Self {
        self.buttons.push(row);
        self
    }

    /// Position of the first button carrying `data`
    #[must_use]
    pub fn find(&self, data: &str) -> Option<(usize, usize)> {
        self.buttons.iter().enumerate().find_map(|(i, row)| {
            row.iter()
                .position(|b| b.url.is_none() && b.data == data)
                .map(|j| (i, j))
        })
    }

    /// Button at `(row, col)`
    #[must_use]
    pub fn button(&self, row: usize, col: usize) -> Option<&Button> {
        self.buttons.get(row).and_then(|r| r.get(col))
    }

    /// Mutable button at `(row, col)`
    pub fn button_mut(&mut self, row: usize, col: usize) -> Option<&mut Button> {
        self.buttons.get_mut(row).and_then(|r| r.get_mut(col))
    }

    /// Total number of buttons
    #[must_use]
    pub fn len(&self) -> usize {
        self.buttons.iter().map(Vec::len).sum()
    }

    /// Whether the grid has no buttons
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check every button against the remote service limits
    pub fn validate(&self) -> Result<()> {
        self.buttons.iter().flatten().try_for_each(Button::validate)
    }
}

/// Text button of a reply keyboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    /// Text the client sends when pressed
    pub text: String,
    /// Payload handed back to the service on press
    pub payload: String,
}

impl ReplyButton {
    /// Create a reply button
    #[must_use]
    pub fn new(text: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            payload: payload.into(),
        }
    }
}

/// Keyboard replacing the input field
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyKeyboard {
    /// Button rows
    pub buttons: Vec<Vec<ReplyButton>>,
    /// Hide after the first press
    #[serde(default)]
    pub one_time: bool,
    /// Let the client shrink the keyboard
    #[serde(default)]
    pub resize: bool,
}

impl ReplyKeyboard {
    /// Create an empty reply keyboard
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row
    #[must_use]
    pub fn with_row(mut self, row: Vec<ReplyButton>) -> Self {
        self.buttons.push(row);
        self
    }

    /// Checksum of the button text mapped to its payload
    #[must_use]
    pub fn checksums(&self) -> BTreeMap<String, String> {
        self.buttons
            .iter()
            .flatten()
            .map(|b| (checksum(&b.text), b.payload.clone()))
            .collect()
    }
}

/// Deterministic checksum of a reply text
#[must_use]
pub fn checksum(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex::encode(&digest[..16])
}

/// Stored reply keyboard, attached to a user (selective) or a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatKeyboard {
    /// Chat the keyboard was sent to
    pub chat_id: i64,
    /// Bot that sent it
    pub bot_id: i64,
    /// Remote id of the message carrying the keyboard
    pub msg_id: i64,
    /// When it was sent
    pub issued_at: DateTime<Utc>,
    /// `checksum(button text)` → payload
    pub keyboard: BTreeMap<String, String>,
}

impl ChatKeyboard {
    /// Payload of the button whose text is `text`
    #[must_use]
    pub fn payload_for(&self, text: &str) -> Option<&str> {
        self.keyboard.get(&checksum(text)).map(String::as_str)
    }
}
