use super::*;
use crate::error::Error;
use crate::keyboard::{Button, ChatKeyboard, ReplyButton, ReplyKeyboard};
use crate::message::ParseMode;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;

struct SqliteContext {
    store: SqliteStore,
    _dir: TempDir,
}

async fn create_sqlite_context() -> SqliteContext {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test_switchboard.db");
    let store = SqliteStore::new(&path).await.unwrap();
    SqliteContext { store, _dir: dir }
}

fn menu_keyboard() -> InlineKeyboard {
    InlineKeyboard::new("menu")
        .with_row(vec![
            Button::callback("Yes", "vote:yes"),
            Button::callback("No", "vote:no"),
        ])
        .with_row(vec![Button::link("Docs", "https://example.com")])
}

fn record(chat_id: i64, bot_id: i64, msg_id: i64) -> ChatKeyboard {
    ChatKeyboard {
        chat_id,
        bot_id,
        msg_id,
        issued_at: Utc::now(),
        keyboard: BTreeMap::from([("abc".to_string(), "payload".to_string())]),
    }
}

async fn check_insert_and_get(store: &dyn Store) {
    let msg = OutgoingMessage::new(1, -100, "Pick one")
        .with_keyboard(menu_keyboard())
        .with_reply_keyboard(ReplyKeyboard::new().with_row(vec![ReplyButton::new("Ok", "ok")]))
        .with_parse_mode(ParseMode::Html)
        .with_event_id("deploy-1")
        .reply_to(5, Some(77))
        .selective();

    let id = store.insert_message(&msg).await.unwrap();
    let stored = store.get_message(id).await.unwrap().unwrap();

    assert_eq!(stored.id, Some(id));
    assert_eq!(stored.text, "Pick one");
    assert_eq!(stored.keyboard, msg.keyboard);
    assert_eq!(stored.reply_keyboard, msg.reply_keyboard);
    assert_eq!(stored.parse_mode, ParseMode::Html);
    assert_eq!(stored.event_id.as_deref(), Some("deploy-1"));
    assert_eq!(stored.reply_to_user_id, Some(77));
    assert!(stored.selective);

    assert!(store.get_message(MessageId(9999)).await.unwrap().is_none());
}

async fn check_remote_lookup(store: &dyn Store) {
    let id = store
        .insert_message(&OutgoingMessage::new(1, 5, "hi"))
        .await
        .unwrap();
    let remote = RemoteRef::Chat {
        chat_id: 5,
        message_id: 42,
    };
    store.set_remote(id, &remote).await.unwrap();

    let found = store.find_by_remote(1, &remote).await.unwrap().unwrap();
    assert_eq!(found.id, Some(id));
    assert_eq!(found.remote, remote);

    assert!(store.find_by_remote(2, &remote).await.unwrap().is_none());
    assert!(store
        .find_by_remote(1, &RemoteRef::Unsent)
        .await
        .unwrap()
        .is_none());

    let inline = RemoteRef::Inline {
        inline_message_id: "AAE-1".to_string(),
    };
    let inline_id = store
        .insert_message(&OutgoingMessage::new(1, 0, "inline"))
        .await
        .unwrap();
    store.set_remote(inline_id, &inline).await.unwrap();
    let found = store.find_by_remote(1, &inline).await.unwrap().unwrap();
    assert_eq!(found.id, Some(inline_id));

    let missing = store.set_remote(MessageId(9999), &remote).await;
    assert!(matches!(missing, Err(Error::MessageNotFound { .. })));
}

async fn check_swap(store: &dyn Store) {
    let msg = OutgoingMessage::new(1, -100, "Pick one").with_keyboard(menu_keyboard());
    let id = store.insert_message(&msg).await.unwrap();

    let next = InlineKeyboard::new("done").with_row(vec![Button::callback("Back", "back")]);
    let outcome = store
        .swap_keyboard(
            id,
            Some("menu"),
            KeyboardChange {
                keyboard: Some(next.clone()),
                text: Some("Thanks".to_string()),
            },
        )
        .await
        .unwrap();

    match outcome {
        SwapOutcome::Swapped { previous } => {
            assert_eq!(previous.keyboard_state(), Some("menu"));
            assert_eq!(previous.text, "Pick one");
        }
        other => panic!("Expected swap, got {:?}", other),
    }

    let stored = store.get_message(id).await.unwrap().unwrap();
    assert_eq!(stored.keyboard, Some(next));
    assert_eq!(stored.text, "Thanks");

    // Stale expectation
    let outcome = store
        .swap_keyboard(id, Some("menu"), KeyboardChange::default())
        .await
        .unwrap();
    assert_eq!(
        outcome,
        SwapOutcome::StateMismatch {
            current: Some("done".to_string())
        }
    );

    let outcome = store
        .swap_keyboard(MessageId(9999), Some("menu"), KeyboardChange::default())
        .await
        .unwrap();
    assert_eq!(outcome, SwapOutcome::NotFound);
}

async fn check_swap_text_only(store: &dyn Store) {
    let id = store
        .insert_message(&OutgoingMessage::new(1, 5, "plain"))
        .await
        .unwrap();

    let outcome = store
        .swap_keyboard(
            id,
            None,
            KeyboardChange {
                keyboard: None,
                text: Some("edited".to_string()),
            },
        )
        .await
        .unwrap();
    assert!(matches!(outcome, SwapOutcome::Swapped { .. }));

    let stored = store.get_message(id).await.unwrap().unwrap();
    assert_eq!(stored.text, "edited");
    assert!(stored.keyboard.is_none());
}

async fn check_update_button(store: &dyn Store) {
    let msg = OutgoingMessage::new(1, -100, "Vote").with_keyboard(menu_keyboard());
    let id = store.insert_message(&msg).await.unwrap();

    let edit = ButtonEdit {
        row: 0,
        col: 1,
        expected_data: "vote:no".to_string(),
        expected_face: None,
        text: "No ✓".to_string(),
        sub_state: Some(1),
    };
    let update = store.update_button(id, "menu", &edit).await.unwrap().unwrap();
    assert_eq!(
        update.previous,
        ButtonFace {
            text: "No".to_string(),
            sub_state: 0
        }
    );
    let written = update.message.keyboard.unwrap();
    assert_eq!(written.button(0, 1).unwrap().text, "No ✓");
    assert_eq!(written.button(0, 0).unwrap().text, "Yes");

    let stored = store.get_message(id).await.unwrap().unwrap();
    let button = stored.keyboard.as_ref().unwrap().button(0, 1).unwrap();
    assert_eq!(button.text, "No ✓");
    assert_eq!(button.sub_state, 1);
    assert_eq!(button.data, "vote:no");

    // Wrong keyboard state
    assert!(store.update_button(id, "other", &edit).await.unwrap().is_none());

    // Data moved: the cell at (0, 0) carries different data
    let misplaced = ButtonEdit {
        row: 0,
        col: 0,
        ..edit.clone()
    };
    assert!(store
        .update_button(id, "menu", &misplaced)
        .await
        .unwrap()
        .is_none());
    let stored = store.get_message(id).await.unwrap().unwrap();
    assert_eq!(stored.keyboard.unwrap().button(0, 0).unwrap().text, "Yes");

    // Out of range
    let outside = ButtonEdit {
        row: 7,
        col: 0,
        ..edit.clone()
    };
    assert!(store.update_button(id, "menu", &outside).await.unwrap().is_none());

    // Cell no longer shows the expected face
    let stale = ButtonEdit {
        expected_face: Some(ButtonFace {
            text: "No".to_string(),
            sub_state: 0,
        }),
        text: "No".to_string(),
        sub_state: Some(0),
        ..edit.clone()
    };
    assert!(store.update_button(id, "menu", &stale).await.unwrap().is_none());

    // Face matches: put the cell back, keeping its sub-state
    let back = ButtonEdit {
        expected_face: Some(ButtonFace {
            text: "No ✓".to_string(),
            sub_state: 1,
        }),
        text: "No".to_string(),
        sub_state: None,
        ..edit
    };
    let update = store.update_button(id, "menu", &back).await.unwrap().unwrap();
    let button = update.message.keyboard.as_ref().unwrap().button(0, 1).unwrap().clone();
    assert_eq!(button.text, "No");
    assert_eq!(button.sub_state, 1);
}

async fn check_inline_result(store: &dyn Store) {
    let mut offered = OutgoingMessage::new(1, 0, "Lunch?").with_keyboard(menu_keyboard());
    offered.from_id = 10;
    offered.inline_result_id = Some("poll".to_string());
    let id = store.insert_message(&offered).await.unwrap();

    let found = store.find_inline_result(1, 10, "poll").await.unwrap().unwrap();
    assert_eq!(found.id, Some(id));
    assert_eq!(found.inline_result_id.as_deref(), Some("poll"));
    assert!(store.find_inline_result(2, 10, "poll").await.unwrap().is_none());
    assert!(store.find_inline_result(1, 11, "poll").await.unwrap().is_none());

    // Once bound it is no longer offered
    let remote = RemoteRef::Inline {
        inline_message_id: "AgAAA-inline".to_string(),
    };
    store.set_remote(id, &remote).await.unwrap();
    assert!(store.find_inline_result(1, 10, "poll").await.unwrap().is_none());
    let bound = store.find_by_remote(1, &remote).await.unwrap().unwrap();
    assert_eq!(bound.id, Some(id));
}

async fn check_restore(store: &dyn Store) {
    let msg = OutgoingMessage::new(1, 5, "before").with_keyboard(menu_keyboard());
    let id = store.insert_message(&msg).await.unwrap();

    store
        .swap_keyboard(
            id,
            Some("menu"),
            KeyboardChange {
                keyboard: Some(InlineKeyboard::new("after")),
                text: Some("after".to_string()),
            },
        )
        .await
        .unwrap();

    store
        .restore(id, msg.keyboard.as_ref(), &msg.text)
        .await
        .unwrap();

    let stored = store.get_message(id).await.unwrap().unwrap();
    assert_eq!(stored.keyboard, msg.keyboard);
    assert_eq!(stored.text, "before");

    let missing = store.restore(MessageId(9999), None, "x").await;
    assert!(matches!(missing, Err(Error::MessageNotFound { .. })));
}

async fn check_recent_by_event(store: &dyn Store) {
    let mut ids = Vec::new();
    for i in 0..15 {
        let msg = OutgoingMessage::new(1, -(i + 1), format!("build {}", i)).with_event_id("ci-42");
        ids.push(store.insert_message(&msg).await.unwrap());
    }
    store
        .insert_message(&OutgoingMessage::new(2, 5, "other bot").with_event_id("ci-42"))
        .await
        .unwrap();
    store
        .insert_message(&OutgoingMessage::new(1, 5, "other event").with_event_id("ci-43"))
        .await
        .unwrap();

    let recent = store.recent_by_event(1, "ci-42", 10).await.unwrap();
    let recent_ids: Vec<MessageId> = recent.iter().filter_map(|m| m.id).collect();
    let expected: Vec<MessageId> = ids.iter().rev().take(10).copied().collect();
    assert_eq!(recent_ids, expected);

    assert!(store.recent_by_event(1, "none", 10).await.unwrap().is_empty());
}

async fn check_user_keyboards(store: &dyn Store) {
    store.push_user_keyboard(&[10, 11], &record(-100, 1, 5)).await.unwrap();
    store.push_user_keyboard(&[10], &record(-200, 1, 6)).await.unwrap();

    assert_eq!(store.user_keyboards(10).await.unwrap().len(), 2);
    assert_eq!(store.user_keyboards(11).await.unwrap().len(), 1);
    assert!(store.user_keyboards(12).await.unwrap().is_empty());

    let removed = store
        .pull_user_keyboards(Some(&[10]), -100, Some(1))
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.user_keyboards(10).await.unwrap()[0].chat_id, -200);

    let removed = store.pull_user_keyboards(None, -100, None).await.unwrap();
    assert_eq!(removed, 1);
    assert!(store.user_keyboards(11).await.unwrap().is_empty());

    assert_eq!(
        store.pull_user_keyboards(Some(&[]), -200, None).await.unwrap(),
        0
    );
}

async fn check_chat_keyboards(store: &dyn Store) {
    store.push_chat_keyboard(&record(5, 1, 1)).await.unwrap();
    store.push_chat_keyboard(&record(5, 2, 2)).await.unwrap();
    assert_eq!(store.chat_keyboards(5).await.unwrap().len(), 2);

    assert_eq!(store.pull_chat_keyboards(5, 1).await.unwrap(), 1);
    let left = store.chat_keyboards(5).await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].bot_id, 2);

    store
        .set_chat_keyboards(5, &[record(5, 3, 9)])
        .await
        .unwrap();
    let replaced = store.chat_keyboards(5).await.unwrap();
    assert_eq!(replaced.len(), 1);
    assert_eq!(replaced[0].msg_id, 9);
    assert_eq!(replaced[0].payload_for("x"), None);
}

async fn check_usernames(store: &dyn Store) {
    for (id, name) in [(3, "Alice"), (1, "bob"), (2, "carol")] {
        store
            .upsert_user(&User {
                id,
                username: Some(name.to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let ids = store
        .user_ids_by_usernames(&["@alice".to_string(), "BOB".to_string(), "dave".to_string()])
        .await
        .unwrap();
    assert_eq!(ids, vec![1, 3]);

    // Rename
    store
        .upsert_user(&User {
            id: 1,
            username: Some("robert".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(store
        .user_ids_by_usernames(&["bob".to_string()])
        .await
        .unwrap()
        .is_empty());
    assert!(store.user_ids_by_usernames(&[]).await.unwrap().is_empty());

    // An update without username keeps the known one
    store
        .upsert_user(&User {
            id: 3,
            username: None,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(
        store
            .user_ids_by_usernames(&["alice".to_string()])
            .await
            .unwrap(),
        vec![3]
    );
}

async fn check_concurrent_swap(store: Arc<dyn Store>) {
    let msg = OutgoingMessage::new(1, -100, "Pick one").with_keyboard(menu_keyboard());
    let id = store.insert_message(&msg).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            let outcome = store
                .swap_keyboard(
                    id,
                    Some("menu"),
                    KeyboardChange {
                        keyboard: Some(InlineKeyboard::new(format!("s{}", i))),
                        text: None,
                    },
                )
                .await
                .unwrap();
            (i, outcome)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (i, outcome) = handle.await.unwrap();
        match outcome {
            SwapOutcome::Swapped { .. } => winners.push(i),
            SwapOutcome::StateMismatch { .. } => {}
            SwapOutcome::NotFound => panic!("message vanished"),
        }
    }

    assert_eq!(winners.len(), 1);
    let stored = store.get_message(id).await.unwrap().unwrap();
    assert_eq!(
        stored.keyboard_state().map(str::to_string),
        Some(format!("s{}", winners[0]))
    );
}

// MemoryStore

#[tokio::test]
async fn test_memory_insert_and_get() {
    check_insert_and_get(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_remote_lookup() {
    check_remote_lookup(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_swap() {
    check_swap(&MemoryStore::new()).await;
    check_swap_text_only(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_update_button() {
    check_update_button(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_inline_result() {
    check_inline_result(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_restore() {
    check_restore(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_recent_by_event() {
    check_recent_by_event(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_memory_keyboard_records() {
    let store = MemoryStore::new();
    check_user_keyboards(&store).await;
    check_chat_keyboards(&store).await;
    check_usernames(&store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_concurrent_swap() {
    check_concurrent_swap(Arc::new(MemoryStore::new())).await;
}

// SqliteStore

#[tokio::test]
async fn test_sqlite_insert_and_get() {
    let ctx = create_sqlite_context().await;
    check_insert_and_get(&ctx.store).await;
    assert!(ctx.store.health_check().await.unwrap());
}

#[tokio::test]
async fn test_sqlite_remote_lookup() {
    let ctx = create_sqlite_context().await;
    check_remote_lookup(&ctx.store).await;
}

#[tokio::test]
async fn test_sqlite_swap() {
    let ctx = create_sqlite_context().await;
    check_swap(&ctx.store).await;
    check_swap_text_only(&ctx.store).await;
}

#[tokio::test]
async fn test_sqlite_update_button() {
    let ctx = create_sqlite_context().await;
    check_update_button(&ctx.store).await;
}

#[tokio::test]
async fn test_sqlite_inline_result() {
    let ctx = create_sqlite_context().await;
    check_inline_result(&ctx.store).await;
}

#[tokio::test]
async fn test_sqlite_restore() {
    let ctx = create_sqlite_context().await;
    check_restore(&ctx.store).await;
}

#[tokio::test]
async fn test_sqlite_recent_by_event() {
    let ctx = create_sqlite_context().await;
    check_recent_by_event(&ctx.store).await;
}

#[tokio::test]
async fn test_sqlite_keyboard_records() {
    let ctx = create_sqlite_context().await;
    check_user_keyboards(&ctx.store).await;
    check_chat_keyboards(&ctx.store).await;
    check_usernames(&ctx.store).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sqlite_concurrent_swap() {
    let ctx = create_sqlite_context().await;
    let store: Arc<dyn Store> = Arc::new(ctx.store);
    check_concurrent_swap(store).await;
}

#[tokio::test]
async fn test_sqlite_reopen_keeps_messages() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("reopen.db");

    let id = {
        let store = SqliteStore::new(&path).await.unwrap();
        store
            .insert_message(&OutgoingMessage::new(1, 5, "persisted"))
            .await
            .unwrap()
    };

    let store = SqliteStore::new(&path).await.unwrap();
    let stored = store.get_message(id).await.unwrap().unwrap();
    assert_eq!(stored.text, "persisted");
}
