//! Default handling of Telegram interactions
//!
//! Reply keyboard presses and button callbacks are resolved and logged;
//! applications plug their own [`InteractionHandler`] into the same loop.

use async_trait::async_trait;
use switchboard_channels::InteractionHandler;
use switchboard_core::{MessageEngine, RequestContext, Result, Trigger};
use tracing::{debug, info};

/// Logs what users pressed
pub struct LoggingHandler;

#[async_trait]
impl InteractionHandler for LoggingHandler {
    async fn handle(&self, engine: &MessageEngine, ctx: &RequestContext) -> Result<()> {
        match ctx.trigger() {
            Trigger::Message(_) => {
                if let Some(answer) = engine.keyboard_answer(ctx).await? {
                    info!(parent: ctx.span(), data = %answer.data, button = %answer.button_text, "Reply keyboard answer");
                }
            }
            Trigger::Callback(callback) => {
                info!(
                    parent: ctx.span(),
                    data = %callback.data,
                    sub_state = callback.sub_state,
                    message_id = ?callback.message().id,
                    "Button pressed"
                );
            }
            Trigger::ChosenInlineResult(result) => {
                info!(parent: ctx.span(), result_id = %result.result_id, "Inline result chosen");
            }
            Trigger::InlineQuery(_) | Trigger::None => {
                debug!(parent: ctx.span(), kind = ctx.trigger().kind(), "Nothing to do");
            }
        }
        Ok(())
    }
}
