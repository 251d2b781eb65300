//! Conversions between engine types and Bot API types

use switchboard_core::keyboard::{InlineKeyboard, ReplyKeyboard};
use switchboard_core::message::ParseMode;
use switchboard_core::remote::{ChatAction, InlineResult, RemoteError, SendMarkup};
use teloxide::types::{
    ChatAction as TelegramChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup,
    InlineQueryResult, InlineQueryResultArticle, InputMessageContent, InputMessageContentText,
    KeyboardButton, KeyboardMarkup, KeyboardRemove, LinkPreviewOptions,
    ParseMode as TelegramParseMode, ReplyMarkup,
};
use teloxide::{ApiError, RequestError};
use tracing::debug;

/// Bot API inline keyboard
///
/// Validated keyboards only hold parsable URLs; a stored one that does not
/// still renders, without the broken button.
pub fn inline_markup(keyboard: &InlineKeyboard) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = keyboard
        .buttons
        .iter()
        .map(|row| {
            row.iter()
                .filter_map(|b| match &b.url {
                    Some(url) => match url.parse::<url::Url>() {
                        Ok(url) => Some(InlineKeyboardButton::url(&b.text, url)),
                        Err(e) => {
                            debug!(url = %url, error = %e, "Skipping button with invalid url");
                            None
                        }
                    },
                    None => Some(InlineKeyboardButton::callback(&b.text, &b.data)),
                })
                .collect()
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

fn reply_markup_keyboard(keyboard: &ReplyKeyboard, selective: bool) -> KeyboardMarkup {
    let rows: Vec<Vec<KeyboardButton>> = keyboard
        .buttons
        .iter()
        .map(|row| row.iter().map(|b| KeyboardButton::new(&b.text)).collect())
        .collect();

    let mut markup = KeyboardMarkup::new(rows);
    if keyboard.resize {
        markup = markup.resize_keyboard();
    }
    if keyboard.one_time {
        markup = markup.one_time_keyboard();
    }
    if selective {
        markup = markup.selective();
    }
    markup
}

/// Markup for a new message
pub fn send_markup(markup: &SendMarkup) -> Option<ReplyMarkup> {
    match markup {
        SendMarkup::None => None,
        SendMarkup::Inline(kb) => Some(ReplyMarkup::InlineKeyboard(inline_markup(kb))),
        SendMarkup::Reply {
            keyboard,
            selective,
        } => Some(ReplyMarkup::Keyboard(reply_markup_keyboard(
            keyboard, *selective,
        ))),
        SendMarkup::Remove { selective } => {
            let mut remove = KeyboardRemove::new();
            if *selective {
                remove = remove.selective();
            }
            Some(ReplyMarkup::KeyboardRemove(remove))
        }
    }
}

/// Bot API parse mode; `None` for plain text
pub fn parse_mode(mode: ParseMode) -> Option<TelegramParseMode> {
    match mode {
        ParseMode::Plain => None,
        ParseMode::Html => Some(TelegramParseMode::Html),
        ParseMode::Markdown => Some(TelegramParseMode::MarkdownV2),
    }
}

/// Bot API chat action
pub fn chat_action(action: ChatAction) -> TelegramChatAction {
    match action {
        ChatAction::Typing => TelegramChatAction::Typing,
        ChatAction::UploadPhoto => TelegramChatAction::UploadPhoto,
        ChatAction::RecordVideo => TelegramChatAction::RecordVideo,
        ChatAction::UploadVideo => TelegramChatAction::UploadVideo,
        ChatAction::RecordVoice => TelegramChatAction::RecordVoice,
        ChatAction::UploadVoice => TelegramChatAction::UploadVoice,
        ChatAction::UploadDocument => TelegramChatAction::UploadDocument,
        ChatAction::FindLocation => TelegramChatAction::FindLocation,
    }
}

/// Link preview switched off
pub fn no_link_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

/// Article result for an inline query answer
pub fn inline_result(result: &InlineResult) -> InlineQueryResult {
    let mut content = InputMessageContentText::new(&result.text);
    if let Some(mode) = parse_mode(result.parse_mode) {
        content = content.parse_mode(mode);
    }

    let mut article = InlineQueryResultArticle::new(
        result.id.clone(),
        &result.title,
        InputMessageContent::Text(content),
    );
    if let Some(description) = &result.description {
        article = article.description(description);
    }
    if let Some(keyboard) = &result.keyboard {
        article = article.reply_markup(inline_markup(keyboard));
    }
    InlineQueryResult::Article(article)
}

/// Classify a Bot API failure
pub fn classify(err: RequestError) -> RemoteError {
    match err {
        RequestError::Api(
            api @ (ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::ChatNotFound
            | ApiError::UserDeactivated),
        ) => RemoteError::ChatInaccessible(api.to_string()),
        RequestError::Api(api) => RemoteError::Validation(api.to_string()),
        RequestError::MigrateToChatId(ChatId(new_chat_id)) => {
            RemoteError::ChatMigrated { new_chat_id }
        }
        RequestError::RetryAfter(secs) => RemoteError::RateLimited {
            retry_after: Some(u64::from(secs.seconds())),
        },
        RequestError::Network(e) if e.is_timeout() => RemoteError::Timeout,
        other => RemoteError::Other(other.to_string()),
    }
}
