//! Telegram adapter core

use super::config::TelegramConfig;
use super::markup::{
    chat_action, classify, inline_markup, inline_result, no_link_preview, parse_mode, send_markup,
};
use crate::error::{Error, Result};
use async_trait::async_trait;
use switchboard_core::keyboard::InlineKeyboard;
use switchboard_core::message::RemoteRef;
use switchboard_core::remote::{
    CallbackAnswer, ChatAction, EditTextRequest, InlineAnswer, RemoteError, RemoteMessenger,
    RemoteResult, SendRequest, SentMessage,
};
use teloxide::{
    payloads::{
        AnswerCallbackQuerySetters, AnswerInlineQuerySetters, EditMessageReplyMarkupInlineSetters,
        EditMessageReplyMarkupSetters, EditMessageTextInlineSetters, EditMessageTextSetters,
        SendMessageSetters,
    },
    prelude::*,
    types::{
        ChatId, InlineQueryResultsButton, InlineQueryResultsButtonKind, MessageId,
        ReplyParameters,
    },
    ApiError, RequestError,
};
use tracing::debug;

/// Telegram bot adapter
pub struct TelegramAdapter {
    pub(crate) bot: Bot,
    pub(crate) config: TelegramConfig,
    bot_id: i64,
}

impl TelegramAdapter {
    /// Create a new Telegram adapter
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let bot_id = config.bot_id()?;
        let mut bot = Bot::new(&config.bot_token);
        if let Some(api_url) = &config.api_url {
            let url = api_url
                .parse()
                .map_err(|e| Error::Config(format!("invalid api_url {}: {}", api_url, e)))?;
            bot = bot.set_api_url(url);
        }
        Ok(Self {
            bot,
            config,
            bot_id,
        })
    }

    /// Create from environment
    pub fn from_env() -> Result<Self> {
        Self::new(TelegramConfig::from_env()?)
    }

    /// Get the underlying bot
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Bot id from the token
    pub fn bot_id(&self) -> i64 {
        self.bot_id
    }

    /// Adapter configuration
    pub fn config(&self) -> &TelegramConfig {
        &self.config
    }
}

/// "message is not modified" means the remote copy already matches
fn edited(result: std::result::Result<(), RequestError>) -> RemoteResult<()> {
    match result {
        Err(RequestError::Api(ApiError::MessageNotModified)) => {
            debug!("Remote message already up to date");
            Ok(())
        }
        other => other.map_err(classify),
    }
}

fn unsent() -> RemoteError {
    RemoteError::Validation("message has no remote identifiers".to_string())
}

#[async_trait]
impl RemoteMessenger for TelegramAdapter {
    async fn send_message(&self, request: SendRequest) -> RemoteResult<SentMessage> {
        let mut call = self.bot.send_message(ChatId(request.chat_id), &request.text);

        if let Some(mode) = parse_mode(request.parse_mode) {
            call = call.parse_mode(mode);
        }
        if !request.web_preview {
            call = call.link_preview_options(no_link_preview());
        }
        if let Some(reply_to) = request.reply_to_msg_id {
            call = call.reply_parameters(ReplyParameters::new(MessageId(reply_to)));
        }
        if let Some(markup) = send_markup(&request.markup) {
            call = call.reply_markup(markup);
        }

        let sent = call.await.map_err(classify)?;
        debug!(chat_id = request.chat_id, message_id = sent.id.0, "Telegram message sent");
        Ok(SentMessage {
            message_id: sent.id.0,
        })
    }

    async fn edit_message_text(&self, request: EditTextRequest) -> RemoteResult<()> {
        let mode = parse_mode(request.parse_mode);
        let markup = request.keyboard.as_ref().map(inline_markup);

        let result = match &request.target {
            RemoteRef::Chat {
                chat_id,
                message_id,
            } => {
                let mut call =
                    self.bot
                        .edit_message_text(ChatId(*chat_id), MessageId(*message_id), &request.text);
                if let Some(mode) = mode {
                    call = call.parse_mode(mode);
                }
                if !request.web_preview {
                    call = call.link_preview_options(no_link_preview());
                }
                if let Some(markup) = markup {
                    call = call.reply_markup(markup);
                }
                call.await.map(|_| ())
            }
            RemoteRef::Inline { inline_message_id } => {
                let mut call = self
                    .bot
                    .edit_message_text_inline(inline_message_id, &request.text);
                if let Some(mode) = mode {
                    call = call.parse_mode(mode);
                }
                if !request.web_preview {
                    call = call.disable_web_page_preview(true);
                }
                if let Some(markup) = markup {
                    call = call.reply_markup(markup);
                }
                call.await.map(|_| ())
            }
            RemoteRef::Unsent => return Err(unsent()),
        };

        edited(result)
    }

    async fn edit_message_reply_markup(
        &self,
        target: RemoteRef,
        keyboard: InlineKeyboard,
    ) -> RemoteResult<()> {
        let markup = inline_markup(&keyboard);

        let result = match &target {
            RemoteRef::Chat {
                chat_id,
                message_id,
            } => self
                .bot
                .edit_message_reply_markup(ChatId(*chat_id), MessageId(*message_id))
                .reply_markup(markup)
                .await
                .map(|_| ()),
            RemoteRef::Inline { inline_message_id } => self
                .bot
                .edit_message_reply_markup_inline(inline_message_id)
                .reply_markup(markup)
                .await
                .map(|_| ()),
            RemoteRef::Unsent => return Err(unsent()),
        };

        edited(result)
    }

    async fn answer_callback_query(&self, answer: CallbackAnswer) -> RemoteResult<()> {
        let mut call = self.bot.answer_callback_query(teloxide::types::CallbackQueryId(answer.callback_id));
        if !answer.text.is_empty() {
            call = call.text(answer.text);
        }
        if answer.show_alert {
            call = call.show_alert(true);
        }
        call.await.map(|_| ()).map_err(classify)
    }

    async fn answer_inline_query(&self, answer: InlineAnswer) -> RemoteResult<()> {
        let results: Vec<_> = answer.results.iter().map(inline_result).collect();

        let mut call = self
            .bot
            .answer_inline_query(teloxide::types::InlineQueryId(answer.query_id), results)
            .cache_time(answer.cache_time);
        if let Some(offset) = answer.next_offset {
            call = call.next_offset(offset);
        }
        if let Some((text, parameter)) = answer.switch_pm {
            call = call.button(InlineQueryResultsButton {
                text,
                kind: InlineQueryResultsButtonKind::StartParameter(parameter),
            });
        }
        call.await.map(|_| ()).map_err(classify)
    }

    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> RemoteResult<()> {
        self.bot
            .send_chat_action(ChatId(chat_id), chat_action(action))
            .await
            .map(|_| ())
            .map_err(classify)
    }
}
