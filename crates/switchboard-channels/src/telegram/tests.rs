//! Tests for telegram module

use super::markup::{chat_action, inline_markup, parse_mode, send_markup};
use super::*;
use serde_json::json;
use switchboard_core::event::Trigger;
use switchboard_core::keyboard::{Button, InlineKeyboard, ReplyButton, ReplyKeyboard};
use switchboard_core::message::{OutgoingMessage, ParseMode, RemoteRef};
use switchboard_core::remote::{ChatAction, RemoteError, SendMarkup};
use switchboard_core::store::{KeyboardStore, MemoryStore, MessageStore};
use teloxide::types::{
    ChatAction as TelegramChatAction, ChatId, ParseMode as TelegramParseMode, ReplyMarkup, Seconds,
    Update,
};
use teloxide::{ApiError, RequestError};

#[test]
fn test_telegram_config() {
    let config = TelegramConfig::new("123456:test_token")
        .with_api_url("http://localhost:8081")
        .with_inline_cache_time(10);

    assert_eq!(config.bot_token, "123456:test_token");
    assert_eq!(config.api_url.as_deref(), Some("http://localhost:8081"));
    assert_eq!(config.inline_cache_time, 10);
    assert_eq!(config.bot_id().unwrap(), 123456);
}

#[test]
fn test_bot_id_requires_numeric_prefix() {
    assert!(TelegramConfig::new("test_token").bot_id().is_err());
    assert!(TelegramConfig::new("abc:def").bot_id().is_err());
    assert!(TelegramAdapter::new(TelegramConfig::new("nope")).is_err());
}

#[test]
fn test_adapter_bot_id() {
    let adapter = TelegramAdapter::new(TelegramConfig::new("42:secret")).unwrap();
    assert_eq!(adapter.bot_id(), 42);
}

#[test]
fn test_inline_markup_keeps_grid() {
    let keyboard = InlineKeyboard::new("menu")
        .with_row(vec![Button::callback("A", "a"), Button::callback("B", "b")])
        .with_row(vec![
            Button::link("Docs", "https://example.com/docs"),
            Button::link("Broken", "not a url"),
        ]);

    let markup = inline_markup(&keyboard);
    assert_eq!(markup.inline_keyboard.len(), 2);
    assert_eq!(markup.inline_keyboard[0].len(), 2);
    assert_eq!(markup.inline_keyboard[1].len(), 1);
    assert_eq!(markup.inline_keyboard[0][1].text, "B");
}

#[test]
fn test_chat_action_mapping() {
    assert_eq!(chat_action(ChatAction::Typing), TelegramChatAction::Typing);
    assert_eq!(
        chat_action(ChatAction::UploadDocument),
        TelegramChatAction::UploadDocument
    );
    assert_eq!(
        chat_action(ChatAction::FindLocation),
        TelegramChatAction::FindLocation
    );
}

#[test]
fn test_send_markup_variants() {
    assert!(send_markup(&SendMarkup::None).is_none());

    let reply = SendMarkup::Reply {
        keyboard: ReplyKeyboard::new().with_row(vec![ReplyButton::new("Yes", "yes")]),
        selective: true,
    };
    assert!(matches!(send_markup(&reply), Some(ReplyMarkup::Keyboard(_))));

    let remove = SendMarkup::Remove { selective: false };
    assert!(matches!(
        send_markup(&remove),
        Some(ReplyMarkup::KeyboardRemove(_))
    ));

    let inline = SendMarkup::Inline(InlineKeyboard::new("s").with_row(vec![Button::callback("x", "x")]));
    assert!(matches!(
        send_markup(&inline),
        Some(ReplyMarkup::InlineKeyboard(_))
    ));
}

#[test]
fn test_parse_mode_mapping() {
    assert!(parse_mode(ParseMode::Plain).is_none());
    assert!(matches!(parse_mode(ParseMode::Html), Some(TelegramParseMode::Html)));
    assert!(matches!(
        parse_mode(ParseMode::Markdown),
        Some(TelegramParseMode::MarkdownV2)
    ));
}

#[test]
fn test_classify_request_errors() {
    assert_eq!(
        classify(RequestError::MigrateToChatId(ChatId(-1001))),
        RemoteError::ChatMigrated { new_chat_id: -1001 }
    );
    assert_eq!(
        classify(RequestError::RetryAfter(Seconds::from_seconds(7))),
        RemoteError::RateLimited {
            retry_after: Some(7)
        }
    );
    assert!(matches!(
        classify(RequestError::Api(ApiError::BotBlocked)),
        RemoteError::ChatInaccessible(_)
    ));
    assert!(matches!(
        classify(RequestError::Api(ApiError::MessageToEditNotFound)),
        RemoteError::Validation(_)
    ));
}

fn update(value: serde_json::Value) -> Update {
    serde_json::from_str(&value.to_string()).unwrap()
}

fn group_chat() -> serde_json::Value {
    json!({"id": -100, "type": "supergroup", "title": "Team"})
}

fn alice() -> serde_json::Value {
    json!({"id": 10, "is_bot": false, "first_name": "Alice", "username": "alice"})
}

#[tokio::test]
async fn test_normalize_text_message() {
    let store = MemoryStore::new();
    let upd = update(json!({
        "update_id": 1,
        "message": {
            "message_id": 5,
            "date": 1700000000,
            "chat": group_chat(),
            "from": alice(),
            "text": "Yes",
            "reply_to_message": {
                "message_id": 4,
                "date": 1699999999,
                "chat": group_chat(),
                "text": "Continue?"
            }
        }
    }));

    let normalized = normalize_update(&store, 1, &upd).await.unwrap().unwrap();
    assert_eq!(normalized.chat.as_ref().map(|c| c.id), Some(-100));

    match &normalized.trigger {
        Trigger::Message(msg) => {
            assert_eq!(msg.text, "Yes");
            assert_eq!(msg.reply_to_msg_id, Some(4));
            assert_eq!(msg.from_id, 10);
        }
        other => panic!("Expected message trigger, got {:?}", other),
    }

    // Sender is remembered for mention resolution
    let ids = store
        .user_ids_by_usernames(&["@Alice".to_string()])
        .await
        .unwrap();
    assert_eq!(ids, vec![10]);
}

#[tokio::test]
async fn test_normalize_callback_uses_stored_message() {
    let store = MemoryStore::new();
    let mut msg = OutgoingMessage::new(1, -100, "Vote").with_keyboard(
        InlineKeyboard::new("menu").with_row(vec![
            Button::callback("Yes", "vote:yes"),
            Button::callback("No", "vote:no").with_sub_state(1),
        ]),
    );
    msg.remote = RemoteRef::Chat {
        chat_id: -100,
        message_id: 7,
    };
    let id = store.insert_message(&msg).await.unwrap();

    let upd = update(json!({
        "update_id": 2,
        "callback_query": {
            "id": "cb-1",
            "from": alice(),
            "chat_instance": "ci",
            "data": "vote:no",
            "message": {
                "message_id": 7,
                "date": 1700000000,
                "chat": group_chat(),
                "text": "Vote"
            }
        }
    }));

    let normalized = normalize_update(&store, 1, &upd).await.unwrap().unwrap();
    let Trigger::Callback(callback) = &normalized.trigger else {
        panic!("Expected callback trigger");
    };
    assert_eq!(callback.id, "cb-1");
    assert_eq!(callback.data, "vote:no");
    assert_eq!(callback.sub_state, 1);
    assert_eq!(callback.message().id, Some(id));
}

#[tokio::test]
async fn test_normalize_callback_for_unknown_message() {
    let store = MemoryStore::new();
    let upd = update(json!({
        "update_id": 3,
        "callback_query": {
            "id": "cb-2",
            "from": alice(),
            "chat_instance": "ci",
            "data": "old",
            "message": {
                "message_id": 99,
                "date": 1700000000,
                "chat": group_chat(),
                "text": "Old"
            }
        }
    }));

    let normalized = normalize_update(&store, 1, &upd).await.unwrap().unwrap();
    let Trigger::Callback(callback) = &normalized.trigger else {
        panic!("Expected callback trigger");
    };
    let snapshot = callback.message();
    assert!(snapshot.id.is_none());
    assert_eq!(snapshot.remote.message_id(), Some(99));
}

#[tokio::test]
async fn test_normalize_inline_query() {
    let store = MemoryStore::new();
    let upd = update(json!({
        "update_id": 4,
        "inline_query": {
            "id": "iq-1",
            "from": alice(),
            "query": "weather",
            "offset": ""
        }
    }));

    let normalized = normalize_update(&store, 1, &upd).await.unwrap().unwrap();
    assert!(normalized.chat.is_none());
    match &normalized.trigger {
        Trigger::InlineQuery(q) => {
            assert_eq!(q.id, "iq-1");
            assert_eq!(q.query, "weather");
        }
        other => panic!("Expected inline query trigger, got {:?}", other),
    }
}

#[tokio::test]
async fn test_chosen_inline_result_binds_stored_message() {
    let store = MemoryStore::new();
    let mut offered = OutgoingMessage::new(1, 0, "Lunch?").with_keyboard(
        InlineKeyboard::new("open").with_row(vec![Button::callback("Pizza", "lunch:pizza")]),
    );
    offered.from_id = 10;
    offered.inline_result_id = Some("poll".to_string());
    let id = store.insert_message(&offered).await.unwrap();

    let chosen = update(json!({
        "update_id": 5,
        "chosen_inline_result": {
            "result_id": "poll",
            "from": alice(),
            "query": "lunch",
            "inline_message_id": "AgAAA-inline"
        }
    }));
    let normalized = normalize_update(&store, 1, &chosen).await.unwrap().unwrap();
    let Trigger::ChosenInlineResult(result) = &normalized.trigger else {
        panic!("Expected chosen inline result trigger");
    };
    let bound = result.message.as_ref().unwrap();
    assert_eq!(bound.id, Some(id));
    assert_eq!(bound.remote.inline_message_id(), Some("AgAAA-inline"));

    // A later press on the inline message resolves to the stored copy
    let press = update(json!({
        "update_id": 6,
        "callback_query": {
            "id": "cb-3",
            "from": alice(),
            "chat_instance": "ci",
            "inline_message_id": "AgAAA-inline",
            "data": "lunch:pizza"
        }
    }));
    let normalized = normalize_update(&store, 1, &press).await.unwrap().unwrap();
    let Trigger::Callback(callback) = &normalized.trigger else {
        panic!("Expected callback trigger");
    };
    assert_eq!(callback.message().id, Some(id));
    assert_eq!(callback.message().keyboard_state(), Some("open"));
}
