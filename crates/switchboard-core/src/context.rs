//! Request-scoped context
//!
//! One [`RequestContext`] is built per inbound event (Telegram update, webhook
//! call, CLI command) and passed explicitly to every engine operation. It owns
//! the tracing span for the request, so everything logged while handling the
//! event carries the service, request id, bot, user, chat and trigger.

use crate::error::{Error, Result};
use crate::event::{Callback, Chat, Trigger, User};
use crate::message::OutgoingMessage;
use crate::remote::{CallbackAnswer, ChatAction, InlineAnswer, InlineResult, RemoteMessenger};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::field::Empty;
use tracing::{debug, info_span, warn, Span};
use uuid::Uuid;

/// Inline answers slower than this are logged as warnings
const SLOW_INLINE_ANSWER: Duration = Duration::from_secs(5);

/// Everything known about the event being handled
pub struct RequestContext {
    service: String,
    bot_id: i64,
    user: Option<User>,
    chat: Option<Chat>,
    trigger: Trigger,
    request_id: Uuid,
    started: Instant,
    span: Span,
    remote: Arc<dyn RemoteMessenger>,
    inline_answered_at: Mutex<Option<DateTime<Utc>>>,
}

impl RequestContext {
    /// Create a context for `service` handling an event for `bot_id`
    pub fn new(service: impl Into<String>, bot_id: i64, remote: Arc<dyn RemoteMessenger>) -> Self {
        let service = service.into();
        let request_id = Uuid::new_v4();
        let span = info_span!(
            "request",
            service = %service,
            request_id = %request_id,
            bot_id,
            user_id = Empty,
            chat_id = Empty,
            trigger = "none",
        );

        Self {
            service,
            bot_id,
            user: None,
            chat: None,
            trigger: Trigger::None,
            request_id,
            started: Instant::now(),
            span,
            remote,
            inline_answered_at: Mutex::new(None),
        }
    }

    /// Set the user who caused the event
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.span.record("user_id", user.id);
        self.user = Some(user);
        self
    }

    /// Set the chat the event happened in
    #[must_use]
    pub fn with_chat(mut self, chat: Chat) -> Self {
        self.span.record("chat_id", chat.id);
        self.chat = Some(chat);
        self
    }

    /// Set the trigger
    #[must_use]
    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.span.record("trigger", trigger.kind());
        self.trigger = trigger;
        self
    }

    /// Service name
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Bot handling the event
    pub fn bot_id(&self) -> i64 {
        self.bot_id
    }

    /// User who caused the event
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Chat the event happened in
    pub fn chat(&self) -> Option<&Chat> {
        self.chat.as_ref()
    }

    /// What triggered the request
    pub fn trigger(&self) -> &Trigger {
        &self.trigger
    }

    /// Callback, when a button press triggered the request
    pub fn callback(&self) -> Option<&Callback> {
        self.trigger.callback()
    }

    /// Unique id of this request
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Tracing span of this request
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Remote messaging service
    pub fn remote(&self) -> &dyn RemoteMessenger {
        self.remote.as_ref()
    }

    /// Chat to reply to: the current chat, or the user's private chat
    pub fn reply_chat_id(&self) -> Option<i64> {
        self.chat
            .as_ref()
            .map(|c| c.id)
            .filter(|id| *id != 0)
            .or_else(|| self.user.as_ref().map(|u| u.id))
    }

    /// New message from the bot to the current chat
    pub fn new_message(&self, text: impl Into<String>) -> OutgoingMessage {
        OutgoingMessage::new(self.bot_id, self.reply_chat_id().unwrap_or_default(), text)
    }

    /// Acknowledge the button press that triggered this request
    ///
    /// Succeeds at most once per callback; concurrent calls result in a single
    /// remote call.
    pub async fn answer_callback(&self, text: &str, show_alert: bool) -> Result<()> {
        let callback = self.callback().ok_or(Error::NoCallback)?;

        let mut answered_at = callback.answer_slot().lock().await;
        if answered_at.is_some() {
            return Err(Error::AlreadyAnswered);
        }

        self.remote
            .answer_callback_query(CallbackAnswer {
                callback_id: callback.id.clone(),
                text: text.to_string(),
                show_alert,
            })
            .await
            .map_err(Error::remote)?;

        *answered_at = Some(Utc::now());
        debug!(parent: &self.span, callback_id = %callback.id, "Callback answered");
        Ok(())
    }

    /// Answer the inline query that triggered this request
    pub async fn answer_inline_query(
        &self,
        results: Vec<InlineResult>,
        cache_time: u32,
        next_offset: Option<String>,
    ) -> Result<()> {
        self.send_inline_answer(results, cache_time, next_offset, None)
            .await
    }

    /// Answer the inline query with a "switch to private chat" button
    pub async fn answer_inline_query_with_pm(&self, text: &str, parameter: &str) -> Result<()> {
        self.send_inline_answer(
            Vec::new(),
            0,
            None,
            Some((text.to_string(), parameter.to_string())),
        )
        .await
    }

    /// Show `action` (e.g. typing) in the reply chat
    pub async fn send_action(&self, action: ChatAction) -> Result<()> {
        let chat_id = self.reply_chat_id().ok_or(Error::NoChat)?;
        self.remote
            .send_chat_action(chat_id, action)
            .await
            .map_err(Error::remote)
    }

    /// When the inline query was answered, if it was
    pub async fn inline_answered_at(&self) -> Option<DateTime<Utc>> {
        *self.inline_answered_at.lock().await
    }

    async fn send_inline_answer(
        &self,
        results: Vec<InlineResult>,
        cache_time: u32,
        next_offset: Option<String>,
        switch_pm: Option<(String, String)>,
    ) -> Result<()> {
        let query = self.trigger.inline_query().ok_or(Error::NoInlineQuery)?;

        let result = self
            .remote
            .answer_inline_query(InlineAnswer {
                query_id: query.id.clone(),
                results,
                cache_time,
                next_offset,
                switch_pm,
            })
            .await;

        *self.inline_answered_at.lock().await = Some(Utc::now());

        let elapsed = self.started.elapsed();
        if elapsed > SLOW_INLINE_ANSWER {
            warn!(
                parent: &self.span,
                elapsed_ms = elapsed.as_millis() as u64,
                query = %query.query,
                "Slow inline query answer"
            );
        } else {
            debug!(parent: &self.span, elapsed_ms = elapsed.as_millis() as u64, "Inline query answered");
        }

        result.map_err(Error::remote)
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("service", &self.service)
            .field("bot_id", &self.bot_id)
            .field("user", &self.user)
            .field("chat", &self.chat)
            .field("trigger", &self.trigger.kind())
            .field("request_id", &self.request_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::InlineQuery;
    use crate::remote::{MockRemoteMessenger, RemoteError};

    fn callback_context(remote: MockRemoteMessenger) -> RequestContext {
        RequestContext::new("test", 1, Arc::new(remote))
            .with_user(User {
                id: 10,
                ..Default::default()
            })
            .with_chat(Chat {
                id: -100,
                title: None,
            })
            .with_trigger(Trigger::Callback(Callback::new(
                "cb-1",
                "vote:yes",
                0,
                OutgoingMessage::new(1, -100, "Vote"),
            )))
    }

    #[tokio::test]
    async fn test_answer_callback_once() {
        let mut remote = MockRemoteMessenger::new();
        remote
            .expect_answer_callback_query()
            .withf(|a| a.callback_id == "cb-1" && a.text == "Saved" && !a.show_alert)
            .times(1)
            .returning(|_| Ok(()));

        let ctx = callback_context(remote);
        ctx.answer_callback("Saved", false).await.unwrap();

        let second = ctx.answer_callback("Again", false).await;
        assert!(matches!(second, Err(Error::AlreadyAnswered)));
        assert!(ctx.callback().unwrap().answered_at().await.is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_answers_single_remote_call() {
        let mut remote = MockRemoteMessenger::new();
        remote
            .expect_answer_callback_query()
            .times(1)
            .returning(|_| Ok(()));

        let ctx = Arc::new(callback_context(remote));
        let a = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            async move { ctx.answer_callback("a", false).await }
        });
        let b = tokio::spawn({
            let ctx = Arc::clone(&ctx);
            async move { ctx.answer_callback("b", true).await }
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(Error::AlreadyAnswered))));
    }

    #[tokio::test]
    async fn test_failed_answer_can_be_retried() {
        let mut remote = MockRemoteMessenger::new();
        let mut seq = mockall::Sequence::new();
        remote
            .expect_answer_callback_query()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(RemoteError::Timeout));
        remote
            .expect_answer_callback_query()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let ctx = callback_context(remote);
        assert!(matches!(
            ctx.answer_callback("x", false).await,
            Err(Error::RemoteFatal(RemoteError::Timeout))
        ));
        assert!(ctx.callback().unwrap().answered_at().await.is_none());
        ctx.answer_callback("x", false).await.unwrap();
    }

    #[tokio::test]
    async fn test_answer_without_callback() {
        let ctx = RequestContext::new("test", 1, Arc::new(MockRemoteMessenger::new()));
        assert!(matches!(
            ctx.answer_callback("x", false).await,
            Err(Error::NoCallback)
        ));
        assert!(matches!(
            ctx.answer_inline_query(Vec::new(), 0, None).await,
            Err(Error::NoInlineQuery)
        ));
    }

    #[tokio::test]
    async fn test_answer_inline_query_with_pm() {
        let mut remote = MockRemoteMessenger::new();
        remote
            .expect_answer_inline_query()
            .withf(|a| {
                a.query_id == "iq-1"
                    && a.results.is_empty()
                    && a.switch_pm == Some(("Connect".to_string(), "start".to_string()))
            })
            .times(1)
            .returning(|_| Ok(()));

        let ctx = RequestContext::new("test", 1, Arc::new(remote)).with_trigger(
            Trigger::InlineQuery(InlineQuery {
                id: "iq-1".to_string(),
                query: "deploy".to_string(),
                offset: String::new(),
            }),
        );

        ctx.answer_inline_query_with_pm("Connect", "start")
            .await
            .unwrap();
        assert!(ctx.inline_answered_at().await.is_some());
    }

    #[tokio::test]
    async fn test_send_action_targets_reply_chat() {
        let mut remote = MockRemoteMessenger::new();
        remote
            .expect_send_chat_action()
            .withf(|chat_id, action| *chat_id == 55 && *action == ChatAction::Typing)
            .times(1)
            .returning(|_, _| Ok(()));

        let ctx = RequestContext::new("test", 1, Arc::new(remote)).with_user(User {
            id: 55,
            ..Default::default()
        });
        ctx.send_action(ChatAction::Typing).await.unwrap();
    }

    #[tokio::test]
    async fn test_send_action_without_chat() {
        let ctx = RequestContext::new("test", 1, Arc::new(MockRemoteMessenger::new()));
        assert!(matches!(
            ctx.send_action(ChatAction::UploadPhoto).await,
            Err(Error::NoChat)
        ));
    }

    #[test]
    fn test_new_message_targets_private_chat_without_chat() {
        let ctx = RequestContext::new("test", 1, Arc::new(MockRemoteMessenger::new())).with_user(
            User {
                id: 55,
                ..Default::default()
            },
        );
        let msg = ctx.new_message("hello");
        assert_eq!(msg.chat_id, 55);
        assert_eq!(msg.bot_id, 1);
        assert!(msg.web_preview);
    }
}
