//! SQLite store
//!
//! Messages keep their inline keyboard as a JSON document. Conditional
//! updates are single `UPDATE ... WHERE` statements, so SQLite's write lock
//! decides the winner between concurrent requests:
//!
//! - whole-keyboard swaps compare against the exact document that was read
//!   (retrying while only unrelated buttons changed underneath)
//! - button edits patch one cell with `json_set`, guarded by `json_extract`
//!   of the cell as it was read, and return the row they wrote

use super::{ButtonEdit, ButtonFace, ButtonUpdate, KeyboardChange, KeyboardStore, MessageStore, SwapOutcome};
use crate::error::{Error, Result};
use crate::event::User;
use crate::keyboard::{ChatKeyboard, InlineKeyboard, ReplyKeyboard};
use crate::message::{MessageId, OutgoingMessage, ParseMode, RemoteRef};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Re-reads allowed while concurrent edits keep changing the document
const MAX_SWAP_ATTEMPTS: usize = 8;

const MESSAGE_COLUMNS: &str = "id, bot_id, chat_id, from_id, remote_message_id, \
     inline_message_id, text, parse_mode, web_preview, keyboard_json, details_json, \
     event_id, inline_result_id, created_at";

/// Message fields that are never queried on
#[derive(Debug, Default, Serialize, Deserialize)]
struct MessageDetails {
    #[serde(default)]
    reply_keyboard: Option<ReplyKeyboard>,
    #[serde(default)]
    keyboard_hide: bool,
    #[serde(default)]
    selective: bool,
    #[serde(default)]
    reply_to_msg_id: Option<i32>,
    #[serde(default)]
    reply_to_user_id: Option<i64>,
    #[serde(default)]
    mention_ids: Vec<i64>,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: i64,
    bot_id: i64,
    chat_id: i64,
    from_id: i64,
    remote_message_id: Option<i64>,
    inline_message_id: Option<String>,
    text: String,
    parse_mode: String,
    web_preview: bool,
    keyboard_json: Option<String>,
    details_json: String,
    event_id: Option<String>,
    inline_result_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for OutgoingMessage {
    type Error = Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let keyboard = row
            .keyboard_json
            .as_deref()
            .map(serde_json::from_str::<InlineKeyboard>)
            .transpose()?;
        let details: MessageDetails = serde_json::from_str(&row.details_json)?;

        let remote = match (row.remote_message_id, row.inline_message_id) {
            (Some(message_id), _) => RemoteRef::Chat {
                chat_id: row.chat_id,
                message_id: i32::try_from(message_id).map_err(|_| {
                    Error::Store(format!("remote message id out of range: {}", message_id))
                })?,
            },
            (None, Some(inline_message_id)) => RemoteRef::Inline { inline_message_id },
            (None, None) => RemoteRef::Unsent,
        };

        Ok(OutgoingMessage {
            id: Some(MessageId(row.id)),
            bot_id: row.bot_id,
            chat_id: row.chat_id,
            from_id: row.from_id,
            remote,
            text: row.text,
            parse_mode: ParseMode::from_name(&row.parse_mode),
            web_preview: row.web_preview,
            keyboard,
            reply_keyboard: details.reply_keyboard,
            keyboard_hide: details.keyboard_hide,
            selective: details.selective,
            reply_to_msg_id: details.reply_to_msg_id,
            reply_to_user_id: details.reply_to_user_id,
            mention_ids: details.mention_ids,
            event_id: row.event_id,
            inline_result_id: row.inline_result_id,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct KeyboardRow {
    chat_id: i64,
    bot_id: i64,
    msg_id: i64,
    issued_at: DateTime<Utc>,
    keyboard_json: String,
}

impl TryFrom<KeyboardRow> for ChatKeyboard {
    type Error = Error;

    fn try_from(row: KeyboardRow) -> Result<Self> {
        Ok(ChatKeyboard {
            chat_id: row.chat_id,
            bot_id: row.bot_id,
            msg_id: row.msg_id,
            issued_at: row.issued_at,
            keyboard: serde_json::from_str(&row.keyboard_json)?,
        })
    }
}

fn remote_columns(remote: &RemoteRef) -> (Option<i64>, Option<&str>) {
    match remote {
        RemoteRef::Unsent => (None, None),
        RemoteRef::Chat { message_id, .. } => (Some(i64::from(*message_id)), None),
        RemoteRef::Inline { inline_message_id } => (None, Some(inline_message_id.as_str())),
    }
}

/// SQLite-backed store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    ///
    /// # Errors
    ///
    /// Returns error if database creation or migration fails.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Store(format!("Failed to create database directory: {}", e))
            })?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(|e| Error::Store(format!("Invalid SQLite path: {}", e)))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| Error::Store(format!("Failed to connect to SQLite: {}", e)))?;

        let store = Self { pool };
        store.init_schema().await?;

        info!(path = %path.display(), "SQLite message store initialized");
        Ok(store)
    }

    /// Open the database at the default location (~/.switchboard/switchboard.db)
    pub async fn new_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::new(&path).await
    }

    /// Default database path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Store("Could not determine home directory".to_string()))?;
        Ok(home.join(".switchboard").join("switchboard.db"))
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                bot_id INTEGER NOT NULL,
                chat_id INTEGER NOT NULL,
                from_id INTEGER NOT NULL,
                remote_message_id INTEGER,
                inline_message_id TEXT,
                text TEXT NOT NULL,
                parse_mode TEXT NOT NULL,
                web_preview BOOLEAN NOT NULL DEFAULT TRUE,
                keyboard_state TEXT,
                keyboard_json TEXT,
                details_json TEXT NOT NULL,
                event_id TEXT,
                inline_result_id TEXT,
                created_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_keyboards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                chat_id INTEGER NOT NULL,
                bot_id INTEGER NOT NULL,
                msg_id INTEGER NOT NULL,
                issued_at TIMESTAMP NOT NULL,
                keyboard_json TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chat_keyboards (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id INTEGER NOT NULL,
                bot_id INTEGER NOT NULL,
                msg_id INTEGER NOT NULL,
                issued_at TIMESTAMP NOT NULL,
                keyboard_json TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_event ON messages(bot_id, event_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_remote ON messages(bot_id, chat_id, remote_message_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_inline ON messages(bot_id, inline_message_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_inline_result ON messages(bot_id, from_id, inline_result_id)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_keyboards ON user_keyboards(user_id, chat_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_keyboards ON chat_keyboards(chat_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_username ON users(lower(username))")
            .execute(&self.pool)
            .await?;

        debug!("SQLite message schema initialized");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<bool> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(true)
    }

    async fn fetch_row(&self, id: MessageId) -> Result<Option<MessageRow>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM messages WHERE id = ?",
            MESSAGE_COLUMNS
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn insert_message(&self, msg: &OutgoingMessage) -> Result<MessageId> {
        let keyboard_json = msg.keyboard.as_ref().map(serde_json::to_string).transpose()?;
        let details_json = serde_json::to_string(&MessageDetails {
            reply_keyboard: msg.reply_keyboard.clone(),
            keyboard_hide: msg.keyboard_hide,
            selective: msg.selective,
            reply_to_msg_id: msg.reply_to_msg_id,
            reply_to_user_id: msg.reply_to_user_id,
            mention_ids: msg.mention_ids.clone(),
        })?;
        let (remote_message_id, inline_message_id) = remote_columns(&msg.remote);

        let result = sqlx::query(
            r#"
            INSERT INTO messages (
                bot_id, chat_id, from_id, remote_message_id, inline_message_id,
                text, parse_mode, web_preview, keyboard_state, keyboard_json,
                details_json, event_id, inline_result_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(msg.bot_id)
        .bind(msg.chat_id)
        .bind(msg.from_id)
        .bind(remote_message_id)
        .bind(inline_message_id)
        .bind(&msg.text)
        .bind(msg.parse_mode.as_str())
        .bind(msg.web_preview)
        .bind(msg.keyboard_state())
        .bind(keyboard_json)
        .bind(details_json)
        .bind(&msg.event_id)
        .bind(&msg.inline_result_id)
        .bind(msg.created_at)
        .execute(&self.pool)
        .await?;

        Ok(MessageId(result.last_insert_rowid()))
    }

    async fn get_message(&self, id: MessageId) -> Result<Option<OutgoingMessage>> {
        self.fetch_row(id).await?.map(TryInto::try_into).transpose()
    }

    async fn find_by_remote(
        &self,
        bot_id: i64,
        remote: &RemoteRef,
    ) -> Result<Option<OutgoingMessage>> {
        let row = match remote {
            RemoteRef::Unsent => return Ok(None),
            RemoteRef::Chat {
                chat_id,
                message_id,
            } => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    "SELECT {} FROM messages WHERE bot_id = ? AND chat_id = ? AND remote_message_id = ? ORDER BY id DESC LIMIT 1",
                    MESSAGE_COLUMNS
                ))
                .bind(bot_id)
                .bind(chat_id)
                .bind(i64::from(*message_id))
                .fetch_optional(&self.pool)
                .await?
            }
            RemoteRef::Inline { inline_message_id } => {
                sqlx::query_as::<_, MessageRow>(&format!(
                    "SELECT {} FROM messages WHERE bot_id = ? AND inline_message_id = ? ORDER BY id DESC LIMIT 1",
                    MESSAGE_COLUMNS
                ))
                .bind(bot_id)
                .bind(inline_message_id)
                .fetch_optional(&self.pool)
                .await?
            }
        };

        row.map(TryInto::try_into).transpose()
    }

    async fn find_inline_result(
        &self,
        bot_id: i64,
        from_id: i64,
        result_id: &str,
    ) -> Result<Option<OutgoingMessage>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!(
            r#"
            SELECT {} FROM messages
            WHERE bot_id = ? AND from_id = ? AND inline_result_id = ?
              AND remote_message_id IS NULL AND inline_message_id IS NULL
            ORDER BY id DESC LIMIT 1
            "#,
            MESSAGE_COLUMNS
        ))
        .bind(bot_id)
        .bind(from_id)
        .bind(result_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn set_remote(&self, id: MessageId, remote: &RemoteRef) -> Result<()> {
        let (remote_message_id, inline_message_id) = remote_columns(remote);
        let result = sqlx::query(
            "UPDATE messages SET remote_message_id = ?, inline_message_id = ? WHERE id = ?",
        )
        .bind(remote_message_id)
        .bind(inline_message_id)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MessageNotFound {
                id: Some(id),
                state: None,
            });
        }
        Ok(())
    }

    async fn swap_keyboard(
        &self,
        id: MessageId,
        expected_state: Option<&str>,
        change: KeyboardChange,
    ) -> Result<SwapOutcome> {
        let new_keyboard_json = change
            .keyboard
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let Some(row) = self.fetch_row(id).await? else {
                return Ok(SwapOutcome::NotFound);
            };
            let stored_json = row.keyboard_json.clone();
            let stored_text = row.text.clone();
            let previous: OutgoingMessage = row.try_into()?;

            if previous.keyboard_state() != expected_state {
                return Ok(SwapOutcome::StateMismatch {
                    current: previous.keyboard_state().map(str::to_string),
                });
            }

            let (state, keyboard_json) = match (&change.keyboard, &new_keyboard_json) {
                (Some(kb), Some(json)) => (Some(kb.state.as_str()), Some(json.clone())),
                _ => (previous.keyboard_state(), stored_json.clone()),
            };
            let text = change.text.as_deref().unwrap_or(&stored_text);

            let result = sqlx::query(
                r#"
                UPDATE messages SET keyboard_state = ?, keyboard_json = ?, text = ?
                WHERE id = ? AND keyboard_json IS ? AND text = ?
                "#,
            )
            .bind(state)
            .bind(keyboard_json)
            .bind(text)
            .bind(id.0)
            .bind(&stored_json)
            .bind(&stored_text)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 1 {
                return Ok(SwapOutcome::Swapped { previous });
            }

            debug!(message_id = %id, attempt, "Keyboard changed during swap, re-reading");
        }

        warn!(message_id = %id, "Keyboard swap gave up after repeated concurrent changes");
        Err(Error::Store(format!(
            "keyboard of message {} kept changing during swap",
            id
        )))
    }

    async fn update_button(
        &self,
        id: MessageId,
        keyboard_state: &str,
        edit: &ButtonEdit,
    ) -> Result<Option<ButtonUpdate>> {
        let cell = format!("$.buttons[{}][{}]", edit.row, edit.col);
        let text_path = format!("{}.text", cell);
        let data_path = format!("{}.data", cell);
        let sub_state_path = format!("{}.sub_state", cell);

        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let Some(row) = self.fetch_row(id).await? else {
                return Ok(None);
            };
            let current: OutgoingMessage = row.try_into()?;
            let Some(button) = current
                .keyboard
                .as_ref()
                .filter(|kb| kb.state == keyboard_state)
                .and_then(|kb| kb.button(edit.row, edit.col))
                .filter(|button| button.data == edit.expected_data)
            else {
                return Ok(None);
            };

            let previous = ButtonFace::from(button);
            if edit.expected_face.as_ref().is_some_and(|face| *face != previous) {
                return Ok(None);
            }
            let sub_state = edit.sub_state.unwrap_or(previous.sub_state);

            let written = sqlx::query_as::<_, MessageRow>(&format!(
                r#"
                UPDATE messages SET keyboard_json = json_set(keyboard_json, ?, ?, ?, ?)
                WHERE id = ? AND keyboard_state = ?
                  AND json_extract(keyboard_json, ?) = ?
                  AND json_extract(keyboard_json, ?) = ?
                  AND json_extract(keyboard_json, ?) = ?
                RETURNING {}
                "#,
                MESSAGE_COLUMNS
            ))
            .bind(&text_path)
            .bind(&edit.text)
            .bind(&sub_state_path)
            .bind(i64::from(sub_state))
            .bind(id.0)
            .bind(keyboard_state)
            .bind(&data_path)
            .bind(&edit.expected_data)
            .bind(&text_path)
            .bind(&previous.text)
            .bind(&sub_state_path)
            .bind(i64::from(previous.sub_state))
            .fetch_optional(&self.pool)
            .await?;

            if let Some(row) = written {
                return Ok(Some(ButtonUpdate {
                    previous,
                    message: row.try_into()?,
                }));
            }

            debug!(message_id = %id, attempt, "Button changed during update, re-reading");
        }

        warn!(message_id = %id, "Button update gave up after repeated concurrent changes");
        Err(Error::Store(format!(
            "button of message {} kept changing during update",
            id
        )))
    }

    async fn restore(
        &self,
        id: MessageId,
        keyboard: Option<&InlineKeyboard>,
        text: &str,
    ) -> Result<()> {
        let keyboard_json = keyboard.map(serde_json::to_string).transpose()?;
        let result = sqlx::query(
            "UPDATE messages SET keyboard_state = ?, keyboard_json = ?, text = ? WHERE id = ?",
        )
        .bind(keyboard.map(|kb| kb.state.as_str()))
        .bind(keyboard_json)
        .bind(text)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::MessageNotFound {
                id: Some(id),
                state: None,
            });
        }
        Ok(())
    }

    async fn recent_by_event(
        &self,
        bot_id: i64,
        event_id: &str,
        limit: usize,
    ) -> Result<Vec<OutgoingMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "SELECT {} FROM messages WHERE bot_id = ? AND event_id = ? ORDER BY id DESC LIMIT ?",
            MESSAGE_COLUMNS
        ))
        .bind(bot_id)
        .bind(event_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}

#[async_trait]
impl KeyboardStore for SqliteStore {
    async fn user_keyboards(&self, user_id: i64) -> Result<Vec<ChatKeyboard>> {
        let rows = sqlx::query_as::<_, KeyboardRow>(
            "SELECT chat_id, bot_id, msg_id, issued_at, keyboard_json FROM user_keyboards WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn chat_keyboards(&self, chat_id: i64) -> Result<Vec<ChatKeyboard>> {
        let rows = sqlx::query_as::<_, KeyboardRow>(
            "SELECT chat_id, bot_id, msg_id, issued_at, keyboard_json FROM chat_keyboards WHERE chat_id = ? ORDER BY id",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn pull_user_keyboards(
        &self,
        user_ids: Option<&[i64]>,
        chat_id: i64,
        bot_id: Option<i64>,
    ) -> Result<u64> {
        if user_ids.is_some_and(<[i64]>::is_empty) {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM user_keyboards WHERE chat_id = ");
        qb.push_bind(chat_id);
        if let Some(bot_id) = bot_id {
            qb.push(" AND bot_id = ").push_bind(bot_id);
        }
        if let Some(ids) = user_ids {
            qb.push(" AND user_id IN (");
            let mut separated = qb.separated(", ");
            for id in ids {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
        }

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn push_user_keyboard(&self, user_ids: &[i64], record: &ChatKeyboard) -> Result<()> {
        let keyboard_json = serde_json::to_string(&record.keyboard)?;
        for user_id in user_ids {
            sqlx::query(
                r#"
                INSERT INTO user_keyboards (user_id, chat_id, bot_id, msg_id, issued_at, keyboard_json)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(user_id)
            .bind(record.chat_id)
            .bind(record.bot_id)
            .bind(record.msg_id)
            .bind(record.issued_at)
            .bind(&keyboard_json)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    async fn set_chat_keyboards(&self, chat_id: i64, records: &[ChatKeyboard]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chat_keyboards WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&mut *tx)
            .await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO chat_keyboards (chat_id, bot_id, msg_id, issued_at, keyboard_json)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(chat_id)
            .bind(record.bot_id)
            .bind(record.msg_id)
            .bind(record.issued_at)
            .bind(serde_json::to_string(&record.keyboard)?)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn pull_chat_keyboards(&self, chat_id: i64, bot_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM chat_keyboards WHERE chat_id = ? AND bot_id = ?")
            .bind(chat_id)
            .bind(bot_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn push_chat_keyboard(&self, record: &ChatKeyboard) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_keyboards (chat_id, bot_id, msg_id, issued_at, keyboard_json)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.chat_id)
        .bind(record.bot_id)
        .bind(record.msg_id)
        .bind(record.issued_at)
        .bind(serde_json::to_string(&record.keyboard)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username) VALUES (?, ?)
            ON CONFLICT(id) DO UPDATE SET username = COALESCE(excluded.username, username)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn user_ids_by_usernames(&self, usernames: &[String]) -> Result<Vec<i64>> {
        if usernames.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM users WHERE lower(username) IN (");
        let mut separated = qb.separated(", ");
        for name in usernames {
            separated.push_bind(name.trim_start_matches('@').to_lowercase());
        }
        separated.push_unseparated(") ORDER BY id");

        let ids: Vec<i64> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(ids)
    }
}
