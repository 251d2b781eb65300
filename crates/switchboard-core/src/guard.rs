//! Conditional keyboard mutations
//!
//! The only way the engine changes a stored keyboard. Each helper issues one
//! conditional store update; whoever loses a race observes the mismatch and
//! backs off. Nothing here talks to the remote service.

use crate::error::{Error, Result};
use crate::keyboard::InlineKeyboard;
use crate::message::{MessageId, OutgoingMessage};
use crate::store::{ButtonEdit, ButtonUpdate, KeyboardChange, MessageStore, Store, SwapOutcome};
use tracing::debug;

/// Result of a conditional swap
#[derive(Debug)]
pub(crate) enum Guarded {
    /// The store now holds `updated`
    Applied {
        previous: OutgoingMessage,
        updated: OutgoingMessage,
    },
    /// Another request changed the keyboard first
    Lost { current: Option<String> },
}

/// Replace keyboard and/or text if the stored keyboard state is `expected`
pub(crate) async fn swap(
    store: &dyn Store,
    id: MessageId,
    expected: Option<&str>,
    keyboard: Option<InlineKeyboard>,
    text: Option<String>,
) -> Result<Guarded> {
    let change = KeyboardChange {
        keyboard: keyboard.clone(),
        text: text.clone(),
    };

    match store.swap_keyboard(id, expected, change).await? {
        SwapOutcome::NotFound => Err(Error::MessageNotFound {
            id: Some(id),
            state: expected.map(str::to_string),
        }),
        SwapOutcome::StateMismatch { current } => {
            debug!(message_id = %id, expected = ?expected, current = ?current, "Keyboard state moved on");
            Ok(Guarded::Lost { current })
        }
        SwapOutcome::Swapped { previous } => {
            let mut updated = previous.clone();
            if let Some(keyboard) = keyboard {
                updated.keyboard = Some(keyboard);
            }
            if let Some(text) = text {
                updated.text = text;
            }
            Ok(Guarded::Applied { previous, updated })
        }
    }
}

/// Button located in a stored message
#[derive(Debug)]
pub(crate) struct ButtonTarget {
    pub message: OutgoingMessage,
    pub row: usize,
    pub col: usize,
}

/// Find the button carrying `data` in the stored message, provided the stored
/// keyboard state is `keyboard_state`
pub(crate) async fn locate_button(
    store: &dyn Store,
    id: MessageId,
    keyboard_state: &str,
    data: &str,
) -> Result<ButtonTarget> {
    let not_found = || Error::MessageNotFound {
        id: Some(id),
        state: Some(keyboard_state.to_string()),
    };

    let message = store.get_message(id).await?.ok_or_else(not_found)?;
    let keyboard = message
        .keyboard
        .as_ref()
        .filter(|kb| kb.state == keyboard_state)
        .ok_or_else(not_found)?;

    let (row, col) = keyboard.find(data).ok_or_else(|| Error::ButtonNotFound {
        id,
        data: data.to_string(),
        position: None,
    })?;

    Ok(ButtonTarget { message, row, col })
}

/// Rewrite one cell, conditioned on state and on the data still being at the
/// located position
///
/// The returned message is the store's post-image, so cells changed by other
/// requests since `locate_button` are included.
pub(crate) async fn point_update(
    store: &dyn Store,
    target: &ButtonTarget,
    keyboard_state: &str,
    data: &str,
    text: &str,
    sub_state: Option<u8>,
) -> Result<ButtonUpdate> {
    let ButtonTarget { message, row, col } = target;
    let (row, col) = (*row, *col);
    let id = message.id.ok_or(Error::MessageNotFound {
        id: None,
        state: Some(keyboard_state.to_string()),
    })?;

    let edit = ButtonEdit {
        row,
        col,
        expected_data: data.to_string(),
        expected_face: None,
        text: text.to_string(),
        sub_state,
    };

    store
        .update_button(id, keyboard_state, &edit)
        .await?
        .ok_or_else(|| {
            debug!(message_id = %id, row, col, data, "Button moved or keyboard changed");
            Error::ButtonNotFound {
                id,
                data: data.to_string(),
                position: Some((row, col)),
            }
        })
}
