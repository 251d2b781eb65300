//! Switchboard Core - Interactive Message State Engine
//!
//! This crate keeps the state of bot messages that carry keyboards and lets
//! many concurrent requests edit them safely:
//! - Keyboards: inline keyboards with a state label, reply keyboards as checksum maps
//! - Store: conditional (compare-and-swap) persistence, in memory or SQLite
//! - Editor: send, edit, and point-update buttons, mirrored to the remote service
//! - Distribution: attach reply keyboards to the users and chats that see them
//! - Resolver: map incoming texts back to reply keyboard payloads
//! - Correlator: bulk edits of every message tagged with one event id
//! - Inline: store inline query results and bind them to their inline message

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod correlator;
pub mod distribution;
pub mod editor;
pub mod error;
pub mod event;
pub mod inline;
pub mod keyboard;
pub mod message;
pub mod remote;
pub mod resolver;
pub mod store;

mod guard;
mod sync;

pub use config::{EngineConfig, StoreConfig};
pub use context::RequestContext;
pub use correlator::{BulkEditSummary, EventEdit};
pub use distribution::{mentioned_usernames, resolve_targets, store_keyboard};
pub use editor::{MessageEngine, UpdateOutcome};
pub use error::{Error, Result};
pub use event::{Callback, Chat, ChosenInlineResult, IncomingMessage, InlineQuery, Trigger, User};
pub use inline::bind_chosen_result;
pub use keyboard::{
    checksum, Button, ChatKeyboard, InlineKeyboard, ReplyButton, ReplyKeyboard, MAX_SUB_STATE,
};
pub use message::{MessageId, OutgoingMessage, ParseMode, RemoteRef};
pub use remote::{
    CallbackAnswer, ChatAction, EditTextRequest, InlineAnswer, InlineResult, RemoteError,
    RemoteMessenger, RemoteResult, SendMarkup, SendRequest, SentMessage,
};
pub use resolver::{match_reply, resolve_active_keyboard, KeyboardAnswer};
pub use store::{KeyboardStore, MemoryStore, MessageStore, SqliteStore, Store};
