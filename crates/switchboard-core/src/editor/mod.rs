//! Message engine
//!
//! Sends interactive messages and edits them afterwards. Every edit follows
//! the same sequence:
//!
//! 1. conditional store mutation (see [`guard`](crate::guard))
//! 2. refresh the callback snapshot, if the edited message is the pressed one
//! 3. push the same change to the remote service
//! 4. on remote failure, undo the store mutation
//!
//! There are no in-process locks: two requests racing on the same keyboard
//! are decided by the store, and the loser gets [`UpdateOutcome::NoOp`].


use crate::config::EngineConfig;
use crate::context::RequestContext;
use crate::distribution;
use crate::error::{Error, Result};
use crate::guard::{self, ButtonTarget, Guarded};
use crate::keyboard::{InlineKeyboard, MAX_SUB_STATE};
use crate::message::{MessageId, OutgoingMessage, RemoteRef};
use crate::remote::{RemoteError, SendRequest};
use crate::store::{ButtonFace, MessageStore, Store};
use crate::sync::{self, RemoteEdit, Rollback};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How an edit ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Stored and shown remotely
    Applied,
    /// Another request changed the keyboard first; nothing was touched
    NoOp,
    /// The remote service refused the edit and the store was restored
    Reverted {
        /// Remote failure
        cause: RemoteError,
    },
}

impl UpdateOutcome {
    /// Whether the edit is now visible
    #[must_use]
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied)
    }
}

/// Sends and edits interactive messages
pub struct MessageEngine {
    store: Arc<dyn Store>,
    config: EngineConfig,
}

impl MessageEngine {
    /// Create an engine on top of `store`
    pub fn new(store: Arc<dyn Store>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Underlying store
    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Engine settings
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Send a new message, store it and distribute its reply keyboard
    ///
    /// Selective reply keyboards in groups need at least one recipient; this
    /// is checked before anything is sent.
    #[instrument(skip_all, parent = ctx.span(), fields(chat_id = msg.chat_id))]
    pub async fn send_message(
        &self,
        ctx: &RequestContext,
        mut msg: OutgoingMessage,
    ) -> Result<OutgoingMessage> {
        if let Some(keyboard) = &msg.keyboard {
            keyboard.validate()?;
        }

        let distributes = msg.reply_keyboard.is_some() || msg.keyboard_hide;
        let targets = if distributes && msg.selective && msg.is_group() {
            let targets = distribution::resolve_targets(self.store.as_ref(), &msg).await?;
            if targets.is_empty() {
                return Err(Error::NoTargetUsers);
            }
            targets
        } else {
            Vec::new()
        };

        let sent = ctx
            .remote()
            .send_message(SendRequest::from_message(&msg))
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to send message");
                Error::remote(e)
            })?;

        msg.remote = RemoteRef::Chat {
            chat_id: msg.chat_id,
            message_id: sent.message_id,
        };
        let id = self.store.insert_message(&msg).await?;
        msg.id = Some(id);

        if distributes {
            distribution::apply(self.store.as_ref(), &msg, &targets).await?;
        }

        info!(message_id = %id, remote_id = sent.message_id, "Message sent");
        Ok(msg)
    }

    /// Replace the text, keeping the keyboard
    ///
    /// Conditioned on the keyboard state seen in `msg`.
    #[instrument(skip_all, parent = ctx.span(), fields(message_id = ?msg.id))]
    pub async fn edit_text(
        &self,
        ctx: &RequestContext,
        msg: &OutgoingMessage,
        text: impl Into<String>,
    ) -> Result<UpdateOutcome> {
        let text = text.into();
        let id = stored_id(msg)?;
        if msg.text == text {
            return Err(Error::TextNotModified);
        }

        let guarded = guard::swap(
            self.store.as_ref(),
            id,
            msg.keyboard_state(),
            None,
            Some(text),
        )
        .await?;
        self.finish(ctx, guarded, RemoteEdit::Text).await
    }

    /// Replace the inline keyboard (and optionally the text) if the stored
    /// keyboard state still equals `expected_state`
    #[instrument(skip_all, parent = ctx.span(), fields(message_id = ?msg.id, expected_state = ?expected_state, new_state = %keyboard.state))]
    pub async fn edit_whole_keyboard(
        &self,
        ctx: &RequestContext,
        msg: &OutgoingMessage,
        expected_state: Option<&str>,
        keyboard: InlineKeyboard,
        text: Option<String>,
    ) -> Result<UpdateOutcome> {
        keyboard.validate()?;
        let id = stored_id(msg)?;
        let edit = if text.is_some() {
            RemoteEdit::Text
        } else {
            RemoteEdit::Markup
        };

        let guarded =
            guard::swap(self.store.as_ref(), id, expected_state, Some(keyboard), text).await?;
        self.finish(ctx, guarded, edit).await
    }

    /// Replace only the inline keyboard
    pub async fn edit_inline_keyboard(
        &self,
        ctx: &RequestContext,
        msg: &OutgoingMessage,
        expected_state: Option<&str>,
        keyboard: InlineKeyboard,
    ) -> Result<UpdateOutcome> {
        self.edit_whole_keyboard(ctx, msg, expected_state, keyboard, None)
            .await
    }

    /// Replace text and inline keyboard together
    pub async fn edit_text_and_keyboard(
        &self,
        ctx: &RequestContext,
        msg: &OutgoingMessage,
        expected_state: Option<&str>,
        text: impl Into<String>,
        keyboard: InlineKeyboard,
    ) -> Result<UpdateOutcome> {
        self.edit_whole_keyboard(ctx, msg, expected_state, keyboard, Some(text.into()))
            .await
    }

    /// Change label (and sub-state) of the button carrying `button_data`
    ///
    /// The edit only lands if the button is still at the position where it was
    /// found and the keyboard state is still `keyboard_state`; otherwise
    /// [`Error::ButtonNotFound`] is returned and nothing changes.
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, parent = ctx.span(), fields(message_id = ?msg.id, keyboard_state = %keyboard_state, button_data = %button_data))]
    pub async fn edit_single_button(
        &self,
        ctx: &RequestContext,
        msg: &OutgoingMessage,
        keyboard_state: &str,
        button_data: &str,
        old_sub_state: u8,
        new_sub_state: u8,
        new_text: &str,
    ) -> Result<UpdateOutcome> {
        for (name, value) in [("old", old_sub_state), ("new", new_sub_state)] {
            if value > MAX_SUB_STATE {
                warn!(
                    sub_state = value,
                    which = name,
                    "Button sub-state must be 0-{}",
                    MAX_SUB_STATE
                );
            }
        }

        let id = stored_id(msg)?;
        let target =
            guard::locate_button(self.store.as_ref(), id, keyboard_state, button_data).await?;
        let sub_state = (new_sub_state != old_sub_state).then_some(new_sub_state);

        self.apply_button_edit(ctx, &target, keyboard_state, button_data, new_text, sub_state)
            .await
    }

    /// Point update of a located button, then push the stored keyboard
    pub(crate) async fn apply_button_edit(
        &self,
        ctx: &RequestContext,
        target: &ButtonTarget,
        keyboard_state: &str,
        button_data: &str,
        new_text: &str,
        sub_state: Option<u8>,
    ) -> Result<UpdateOutcome> {
        let update = guard::point_update(
            self.store.as_ref(),
            target,
            keyboard_state,
            button_data,
            new_text,
            sub_state,
        )
        .await?;

        let applied = ButtonFace {
            text: new_text.to_string(),
            sub_state: sub_state.unwrap_or(update.previous.sub_state),
        };
        let rollback = Rollback::Button {
            keyboard_state: keyboard_state.to_string(),
            row: target.row,
            col: target.col,
            data: button_data.to_string(),
            applied,
            previous: update.previous,
        };
        self.publish(ctx, rollback, update.message, RemoteEdit::Markup)
            .await
    }

    /// Change the label of a button, keeping its sub-state
    pub async fn edit_button_text(
        &self,
        ctx: &RequestContext,
        msg: &OutgoingMessage,
        keyboard_state: &str,
        button_data: &str,
        new_text: &str,
    ) -> Result<UpdateOutcome> {
        self.edit_single_button(ctx, msg, keyboard_state, button_data, 0, 0, new_text)
            .await
    }

    /// Replace the text of the message whose button was pressed
    pub async fn edit_pressed_text(
        &self,
        ctx: &RequestContext,
        text: impl Into<String>,
    ) -> Result<UpdateOutcome> {
        let msg = pressed_message(ctx)?;
        self.edit_text(ctx, &msg, text).await
    }

    /// Replace the keyboard of the message whose button was pressed
    pub async fn edit_pressed_keyboard(
        &self,
        ctx: &RequestContext,
        keyboard: InlineKeyboard,
    ) -> Result<UpdateOutcome> {
        let msg = pressed_message(ctx)?;
        self.edit_inline_keyboard(ctx, &msg, msg.keyboard_state(), keyboard)
            .await
    }

    /// Replace text and keyboard of the message whose button was pressed
    pub async fn edit_pressed_text_and_keyboard(
        &self,
        ctx: &RequestContext,
        text: impl Into<String>,
        keyboard: InlineKeyboard,
    ) -> Result<UpdateOutcome> {
        let msg = pressed_message(ctx)?;
        self.edit_text_and_keyboard(ctx, &msg, msg.keyboard_state(), text, keyboard)
            .await
    }

    /// Change label and sub-state of the pressed button
    pub async fn edit_pressed_button(
        &self,
        ctx: &RequestContext,
        new_sub_state: u8,
        new_text: &str,
    ) -> Result<UpdateOutcome> {
        let callback = ctx.callback().ok_or(Error::NoCallback)?;
        let msg = callback.message();
        let keyboard_state = msg
            .keyboard_state()
            .ok_or_else(|| Error::MessageNotFound {
                id: msg.id,
                state: None,
            })?
            .to_string();

        self.edit_single_button(
            ctx,
            &msg,
            &keyboard_state,
            &callback.data,
            callback.sub_state,
            new_sub_state,
            new_text,
        )
        .await
    }

    pub(crate) async fn finish(
        &self,
        ctx: &RequestContext,
        guarded: Guarded,
        edit: RemoteEdit,
    ) -> Result<UpdateOutcome> {
        match guarded {
            Guarded::Lost { current } => {
                debug!(current = ?current, "Lost keyboard race");
                Ok(UpdateOutcome::NoOp)
            }
            Guarded::Applied { previous, updated } => {
                self.publish(ctx, Rollback::Message(previous), updated, edit)
                    .await
            }
        }
    }

    async fn publish(
        &self,
        ctx: &RequestContext,
        rollback: Rollback,
        updated: OutgoingMessage,
        edit: RemoteEdit,
    ) -> Result<UpdateOutcome> {
        if let Some(callback) = ctx.callback() {
            if callback.message().id == updated.id {
                callback.set_message(updated.clone());
            }
        }

        sync::push(
            ctx,
            self.store.as_ref(),
            &self.config.outdated_notice,
            &rollback,
            &updated,
            edit,
        )
        .await
    }
}

fn stored_id(msg: &OutgoingMessage) -> Result<MessageId> {
    msg.id.ok_or_else(|| Error::MessageNotFound {
        id: None,
        state: msg.keyboard_state().map(str::to_string),
    })
}

fn pressed_message(ctx: &RequestContext) -> Result<OutgoingMessage> {
    ctx.callback()
        .map(|callback| callback.message())
        .ok_or(Error::NoCallback)
}
