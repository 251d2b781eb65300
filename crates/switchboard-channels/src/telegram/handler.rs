//! Telegram update loop

use super::adapter::TelegramAdapter;
use super::normalize::normalize_update;
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;
use switchboard_core::context::RequestContext;
use switchboard_core::editor::MessageEngine;
use switchboard_core::error::Error as CoreError;
use switchboard_core::remote::RemoteMessenger;
use teloxide::{prelude::*, types::Update};
use tracing::{debug, info, instrument, warn, Instrument};

/// Application logic run for every normalised update
#[async_trait]
pub trait InteractionHandler: Send + Sync {
    /// Handle one update
    async fn handle(&self, engine: &MessageEngine, ctx: &RequestContext)
        -> switchboard_core::Result<()>;
}

impl TelegramAdapter {
    /// Poll Telegram and hand every update to `handler`
    #[instrument(skip_all, fields(bot_id = self.bot_id()))]
    pub async fn run(
        self: Arc<Self>,
        engine: Arc<MessageEngine>,
        handler: Arc<dyn InteractionHandler>,
    ) -> Result<()> {
        info!("Starting Telegram bot");

        let bot = self.bot.clone();
        let adapter = self.clone();

        let tree = dptree::endpoint(move |update: Update| {
            let adapter = adapter.clone();
            let engine = engine.clone();
            let handler = handler.clone();
            async move {
                adapter.handle_update(&engine, handler.as_ref(), update).await;
                respond(())
            }
        });

        // Updates are independent; the store decides races
        Dispatcher::builder(bot, tree)
            .distribution_function(|_| None::<std::convert::Infallible>)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram bot stopped");
        Ok(())
    }

    /// Normalise one update, run `handler` and make sure a pressed button is
    /// acknowledged
    pub async fn handle_update(
        self: &Arc<Self>,
        engine: &MessageEngine,
        handler: &dyn InteractionHandler,
        update: Update,
    ) {
        let normalized = match normalize_update(engine.store(), self.bot_id(), &update).await {
            Ok(Some(normalized)) => normalized,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "Failed to normalise update");
                return;
            }
        };

        let remote: Arc<dyn RemoteMessenger> = self.clone();
        let ctx = normalized.into_context("telegram", self.bot_id(), remote);
        let span = ctx.span().clone();

        async {
            let toast = match handler.handle(engine, &ctx).await {
                Ok(()) => String::new(),
                Err(e) => {
                    warn!(error = %e, "Handler failed");
                    e.user_message()
                }
            };

            if ctx.callback().is_some() {
                match ctx.answer_callback(&toast, false).await {
                    Ok(()) | Err(CoreError::AlreadyAnswered) => {}
                    Err(e) => warn!(error = %e, "Failed to answer callback"),
                }
            }
            debug!("Update handled");
        }
        .instrument(span)
        .await;
    }
}
