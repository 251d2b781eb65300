//! Remote sync and revert
//!
//! Runs after a conditional store mutation succeeded. The same change is
//! pushed to the remote service; if that fails for any reason the store is
//! put back so both sides agree again. Whole-keyboard edits restore the
//! pre-mutation snapshot; button edits put back only their own cell, and only
//! while it still shows what the edit wrote.

use crate::context::RequestContext;
use crate::editor::UpdateOutcome;
use crate::error::{Error, Result};
use crate::message::{MessageId, OutgoingMessage};
use crate::remote::{EditTextRequest, RemoteError};
use crate::store::{ButtonEdit, ButtonFace, MessageStore, Store};
use tracing::{debug, info, warn};

/// Which remote call mirrors the store mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RemoteEdit {
    /// `editMessageText`, carrying the current inline keyboard
    Text,
    /// `editMessageReplyMarkup`
    Markup,
}

/// How to undo a store mutation the remote refused
#[derive(Debug, Clone)]
pub(crate) enum Rollback {
    /// Put keyboard and text back as in this snapshot
    Message(OutgoingMessage),
    /// Put one button back to `previous` if it still shows `applied`
    Button {
        keyboard_state: String,
        row: usize,
        col: usize,
        data: String,
        applied: ButtonFace,
        previous: ButtonFace,
    },
}

/// Push `updated` to the remote service, undoing the store mutation on failure
pub(crate) async fn push(
    ctx: &RequestContext,
    store: &dyn Store,
    outdated_notice: &str,
    rollback: &Rollback,
    updated: &OutgoingMessage,
    edit: RemoteEdit,
) -> Result<UpdateOutcome> {
    if !updated.remote.is_sent() {
        debug!(parent: ctx.span(), message_id = ?updated.id, "Message has no remote copy, store change only");
        return Ok(UpdateOutcome::Applied);
    }

    let result = match edit {
        RemoteEdit::Text => {
            ctx.remote()
                .edit_message_text(EditTextRequest {
                    target: updated.remote.clone(),
                    text: updated.text.clone(),
                    parse_mode: updated.parse_mode,
                    web_preview: updated.web_preview,
                    keyboard: updated.keyboard.clone(),
                })
                .await
        }
        RemoteEdit::Markup => {
            ctx.remote()
                .edit_message_reply_markup(
                    updated.remote.clone(),
                    updated.keyboard.clone().unwrap_or_default(),
                )
                .await
        }
    };

    let Err(cause) = result else {
        return Ok(UpdateOutcome::Applied);
    };

    if cause.is_transient() {
        report_transient(ctx, outdated_notice, &cause).await;
    } else {
        warn!(parent: ctx.span(), message_id = ?updated.id, error = %cause, "Remote edit failed");
    }

    let id = updated.id.ok_or(Error::MessageNotFound {
        id: None,
        state: updated.keyboard_state().map(str::to_string),
    })?;
    revert(ctx, store, id, rollback, cause.clone()).await?;
    Ok(UpdateOutcome::Reverted { cause })
}

async fn report_transient(ctx: &RequestContext, outdated_notice: &str, cause: &RemoteError) {
    match cause {
        RemoteError::RateLimited { retry_after } => {
            warn!(parent: ctx.span(), retry_after = ?retry_after, "Remote flood control activated");
        }
        _ => {
            info!(parent: ctx.span(), error = %cause, "Message can no longer be edited remotely");
        }
    }

    if ctx.callback().is_none() {
        return;
    }
    match ctx.answer_callback(outdated_notice, false).await {
        Ok(()) | Err(Error::AlreadyAnswered) => {}
        Err(e) => {
            warn!(parent: ctx.span(), error = %e, "Failed to show outdated notice");
        }
    }
}

/// Undo the store mutation; failure here is the only hard error of an edit
async fn revert(
    ctx: &RequestContext,
    store: &dyn Store,
    id: MessageId,
    rollback: &Rollback,
    cause: RemoteError,
) -> Result<()> {
    let revert_failed = |e: Error| Error::RevertFailed {
        id,
        cause: cause.clone(),
        reason: e.to_string(),
    };

    let restored = match rollback {
        Rollback::Message(previous) => {
            store
                .restore(id, previous.keyboard.as_ref(), &previous.text)
                .await
                .map_err(revert_failed)?;
            Some(previous.clone())
        }
        Rollback::Button {
            keyboard_state,
            row,
            col,
            data,
            applied,
            previous,
        } => {
            let edit = ButtonEdit {
                row: *row,
                col: *col,
                expected_data: data.clone(),
                expected_face: Some(applied.clone()),
                text: previous.text.clone(),
                sub_state: Some(previous.sub_state),
            };
            let update = store
                .update_button(id, keyboard_state, &edit)
                .await
                .map_err(revert_failed)?;
            if update.is_none() {
                info!(
                    parent: ctx.span(),
                    message_id = %id,
                    row,
                    col,
                    "Button changed again since the edit, left as stored"
                );
            }
            update.map(|u| u.message)
        }
    };

    if let (Some(callback), Some(restored)) = (ctx.callback(), restored) {
        if callback.message().id == Some(id) {
            callback.set_message(restored);
        }
    }

    info!(parent: ctx.span(), message_id = %id, cause = %cause, "Reverted message after remote failure");
    Ok(())
}
