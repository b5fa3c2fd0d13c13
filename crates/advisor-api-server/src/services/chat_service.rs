use advisor_core::{
    ActivityLog, ActivityLogger, ActivityStatus, ActivityType, ApiMessage, ContextError, ConversationManager, Message,
    SessionId, SessionStats, TokenCounter,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::services::fallback::{fallback_response, FallbackReason};
use crate::services::model_client::{validate_response, GenerationParams, ModelClient, ModelInfo};
use crate::services::session_store::{SessionStore, SessionStoreError, SharedSession};

#[derive(Error, Debug)]
pub enum ChatError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Store(#[from] SessionStoreError),

    #[error("Session {0} not found")]
    SessionNotFound(SessionId),
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub session_id: SessionId,
    pub reply: String,
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<FallbackReason>,
    /// Messages sent to the model for this turn
    pub window_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub summary: String,
    pub display: String,
}

/// Runs one user turn end to end: append, window, model call, reply.
pub struct ChatService {
    sessions: SessionStore,
    model: Arc<dyn ModelClient>,
    params: GenerationParams,
    min_response_chars: usize,
    logger: ActivityLogger,
}

impl ChatService {
    pub fn new(
        sessions: SessionStore,
        model: Arc<dyn ModelClient>,
        params: GenerationParams,
        min_response_chars: usize,
        logger: ActivityLogger,
    ) -> Self {
        Self {
            sessions,
            model,
            params,
            min_response_chars,
            logger,
        }
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub async fn send_message(
        &self,
        session_id: Option<SessionId>,
        text: &str,
        instruction: &str,
    ) -> Result<ChatReply, ChatError> {
        let start = Instant::now();
        let (session_id, session) = self.sessions.get_or_create(session_id)?;

        // One turn at a time per session. The entry lock itself is never
        // held across the model call.
        let turn = session.lock().turn_lock();
        let _turn = turn.lock().await;

        let window = {
            let mut entry = session.lock();
            let manager = entry.manager_mut();
            manager.append_user(text)?;
            manager.request_window()
        };

        debug!("Session {}: sending {} messages to model", session_id, window.len());
        let model_info = self.model.model_info();
        let call_start = Instant::now();
        let result = self.model.generate(&window, instruction, &self.params).await;
        let call_ms = call_start.elapsed().as_millis() as u64;

        let (reply, fallback_reason) = match result {
            Ok(text) if validate_response(&text, self.min_response_chars) => {
                self.logger.log(
                    ActivityLog::builder(session_id, ActivityType::ModelCall)
                        .model(&model_info.model)
                        .message_count(window.len())
                        .char_count(text.chars().count())
                        .duration_ms(call_ms)
                        .build(),
                );
                (text, None)
            }
            Ok(text) => {
                warn!("Invalid or empty response received ({} chars)", text.trim().chars().count());
                self.logger.log(
                    ActivityLog::builder(session_id, ActivityType::ModelCall)
                        .status(ActivityStatus::Warning)
                        .model(&model_info.model)
                        .message_count(window.len())
                        .duration_ms(call_ms)
                        .error("EmptyUpstreamResult", ContextError::EmptyUpstreamResult.to_string())
                        .build(),
                );
                (fallback_response(FallbackReason::EmptyResponse), Some(FallbackReason::EmptyResponse))
            }
            Err(e) => {
                warn!("Model call failed for session {}: {}", session_id, e);
                self.logger.log(
                    ActivityLog::builder(session_id, ActivityType::ModelError)
                        .model(&model_info.model)
                        .message_count(window.len())
                        .duration_ms(call_ms)
                        .error(e.kind.as_str(), &e.message)
                        .build(),
                );
                let reason = FallbackReason::from(e.kind);
                (fallback_response(reason), Some(reason))
            }
        };

        let stored = {
            let mut entry = session.lock();
            let manager = entry.manager_mut();
            match Self::store_reply(manager, reply, fallback_reason, &model_info.model) {
                Ok(stored) => {
                    manager.optimize_memory();
                    Ok(stored)
                }
                Err(e) => {
                    // A failed turn leaves no trace
                    warn!("Session {}: turn rolled back: {}", session_id, e);
                    manager.pop_last_user();
                    Err(e)
                }
            }
        };
        let (reply, fallback_reason) = stored?;

        if let Some(reason) = fallback_reason {
            self.logger.log(
                ActivityLog::builder(session_id, ActivityType::FallbackServed)
                    .status(ActivityStatus::Warning)
                    .custom_field("reason", reason.as_str())
                    .build(),
            );
        }

        let elapsed = start.elapsed();
        info!(
            "Session {}: reply ready in {:?} (fallback: {})",
            session_id,
            elapsed,
            fallback_reason.is_some()
        );
        self.logger.log(
            ActivityLog::builder(session_id, ActivityType::UserInteraction)
                .char_count(text.chars().count())
                .message_count(window.len())
                .duration_ms(elapsed.as_millis() as u64)
                .custom_field("fallback", fallback_reason.is_some())
                .build(),
        );

        Ok(ChatReply {
            session_id,
            fallback: fallback_reason.is_some(),
            fallback_reason,
            reply,
            window_size: window.len(),
        })
    }

    /// Append the reply as an assistant turn. A model reply the manager
    /// rejects (over the length limit) is replaced by the generic fallback.
    fn store_reply(
        manager: &mut ConversationManager,
        reply: String,
        fallback_reason: Option<FallbackReason>,
        model: &str,
    ) -> Result<(String, Option<FallbackReason>), ContextError> {
        if let Some(reason) = fallback_reason {
            let stored = Self::append_fallback(manager, reason)?;
            return Ok((stored.content, Some(reason)));
        }

        let metadata = HashMap::from([("model".to_string(), Value::from(model))]);
        match manager.append_assistant_with_metadata(&reply, metadata) {
            Ok(stored) => Ok((stored.content, None)),
            Err(e) => {
                warn!("Model reply rejected by conversation manager: {}", e);
                let stored = Self::append_fallback(manager, FallbackReason::Generic)?;
                Ok((stored.content, Some(FallbackReason::Generic)))
            }
        }
    }

    /// Canned text is cut to the length limit rather than rejected
    fn append_fallback(manager: &mut ConversationManager, reason: FallbackReason) -> Result<Message, ContextError> {
        let text = fallback_response(reason);
        let text = match manager.config().max_message_chars {
            Some(max) => TokenCounter::truncate(&text, max),
            None => text.as_str(),
        };

        manager.append_assistant_with_metadata(text, fallback_metadata(reason))
    }

    fn session(&self, session_id: SessionId) -> Result<SharedSession, ChatError> {
        self.sessions
            .get(session_id)
            .ok_or(ChatError::SessionNotFound(session_id))
    }

    pub fn clear(&self, session_id: SessionId) -> Result<(), ChatError> {
        self.session(session_id)?.lock().manager_mut().clear();
        Ok(())
    }

    pub fn export(&self, session_id: SessionId) -> Result<Vec<Message>, ChatError> {
        Ok(self.session(session_id)?.lock().manager().export_all())
    }

    pub fn stats(&self, session_id: SessionId) -> Result<SessionStats, ChatError> {
        Ok(self.session(session_id)?.lock().manager().stats())
    }

    pub fn history(&self, session_id: SessionId) -> Result<Vec<ApiMessage>, ChatError> {
        Ok(self.session(session_id)?.lock().manager().api_history())
    }

    pub fn summary(&self, session_id: SessionId) -> Result<SessionSummary, ChatError> {
        let session = self.session(session_id)?;
        let entry = session.lock();
        Ok(SessionSummary {
            session_id,
            summary: entry.manager().summary(),
            display: entry.manager().display(),
        })
    }

    pub fn model_info(&self) -> ModelInfo {
        self.model.model_info()
    }

    pub async fn test_connection(&self) -> bool {
        self.model.test_connection().await
    }
}

fn fallback_metadata(reason: FallbackReason) -> HashMap<String, Value> {
    HashMap::from([
        ("fallback".to_string(), json!(true)),
        ("reason".to_string(), json!(reason.as_str())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversationConfig;
    use crate::services::model_client::{MockModelClient, ModelError};
    use advisor_core::{OverlengthPolicy, Role};
    use async_trait::async_trait;
    use mockall::Sequence;
    use std::time::Duration;

    fn conversation_config(max_history: usize, max_message_chars: Option<usize>) -> ConversationConfig {
        ConversationConfig {
            max_history,
            retention_limit: max_history * 2,
            max_message_chars,
            overlength_policy: OverlengthPolicy::Reject,
            session_timeout_minutes: 30,
            max_sessions: 100,
            memory_limit_percent: 100.0,
        }
    }

    fn model_info() -> ModelInfo {
        ModelInfo {
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 4096,
            configured: true,
        }
    }

    fn service_with(mock: MockModelClient, config: ConversationConfig, logger: ActivityLogger) -> ChatService {
        let sessions = SessionStore::new(&config, logger.clone()).unwrap();
        ChatService::new(sessions, Arc::new(mock), GenerationParams::default(), 10, logger)
    }

    fn service(mock: MockModelClient) -> ChatService {
        service_with(mock, conversation_config(20, None), ActivityLogger::noop())
    }

    fn replying(text: &'static str) -> MockModelClient {
        let mut mock = MockModelClient::new();
        mock.expect_model_info().returning(model_info);
        mock.expect_generate().returning(move |_, _, _| Ok(text.to_string()));
        mock
    }

    #[tokio::test]
    async fn test_send_message_appends_both_turns() {
        let service = service(replying("Consider a move into financial analysis."));

        let reply = service.send_message(None, "I work in finance", "advise").await.unwrap();

        assert!(!reply.fallback);
        assert_eq!(reply.reply, "Consider a move into financial analysis.");
        assert_eq!(reply.window_size, 1);

        let export = service.export(reply.session_id).unwrap();
        assert_eq!(export.len(), 2);
        assert_eq!(export[0].role, Role::User);
        assert_eq!(export[1].role, Role::Assistant);
        assert_eq!(export[1].metadata["model"], json!("gemini-2.5-flash"));
    }

    #[tokio::test]
    async fn test_window_is_bounded_and_instruction_forwarded() {
        let mut mock = MockModelClient::new();
        mock.expect_model_info().returning(model_info);
        mock.expect_generate()
            .withf(|history, instruction, _| history.len() <= 4 && instruction.contains("be brief"))
            .times(5)
            .returning(|history, _, _| Ok(format!("Reply to: {}", history[history.len() - 1].content)));

        let service = service_with(mock, conversation_config(4, None), ActivityLogger::noop());

        let first = service.send_message(None, "turn 0", "be brief").await.unwrap();
        let mut last = first.clone();
        for i in 1..5 {
            last = service
                .send_message(Some(first.session_id), &format!("turn {}", i), "be brief")
                .await
                .unwrap();
        }

        assert_eq!(last.session_id, first.session_id);
        assert_eq!(last.window_size, 4);
        assert_eq!(last.reply, "Reply to: turn 4");
        // retention limit is 8
        assert_eq!(service.export(first.session_id).unwrap().len(), 8);
        assert_eq!(service.history(first.session_id).unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_input_rejected_without_model_call() {
        let mut mock = MockModelClient::new();
        mock.expect_generate().never();

        let service = service(mock);
        let err = service.send_message(None, "   ", "advise").await.unwrap_err();

        assert!(matches!(err, ChatError::Context(ContextError::EmptyInput)));
    }

    #[tokio::test]
    async fn test_too_long_input_rejected() {
        let mut mock = MockModelClient::new();
        mock.expect_generate().never();

        let service = service_with(mock, conversation_config(20, Some(5)), ActivityLogger::noop());
        let err = service.send_message(None, "far too long", "advise").await.unwrap_err();

        assert!(matches!(err, ChatError::Context(ContextError::InputTooLong { len: 12, max: 5 })));
    }

    #[tokio::test]
    async fn test_empty_model_output_becomes_fallback() {
        let service = service(replying(""));

        let reply = service.send_message(None, "Help me plan", "advise").await.unwrap();

        assert!(reply.fallback);
        assert_eq!(reply.fallback_reason, Some(FallbackReason::EmptyResponse));
        assert_eq!(reply.reply, fallback_response(FallbackReason::EmptyResponse));

        let export = service.export(reply.session_id).unwrap();
        assert_eq!(export.len(), 2);
        assert!(!export[1].content.is_empty());
        assert_eq!(export[1].metadata["fallback"], json!(true));
        assert_eq!(export[1].metadata["reason"], json!("empty_response"));
    }

    #[tokio::test]
    async fn test_short_model_output_becomes_fallback() {
        let service = service(replying("ok"));
        let reply = service.send_message(None, "Help me plan", "advise").await.unwrap();
        assert_eq!(reply.fallback_reason, Some(FallbackReason::EmptyResponse));
    }

    #[tokio::test]
    async fn test_model_error_kinds_map_to_fallbacks() {
        let mut mock = MockModelClient::new();
        mock.expect_model_info().returning(model_info);
        let mut seq = Sequence::new();
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(ModelError::blocked("SAFETY")));
        mock.expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Err(ModelError::connection("timeout")));

        let service = service(mock);

        let blocked = service.send_message(None, "something odd", "advise").await.unwrap();
        assert_eq!(blocked.fallback_reason, Some(FallbackReason::Blocked));

        let offline = service
            .send_message(Some(blocked.session_id), "hello?", "advise")
            .await
            .unwrap();
        assert_eq!(offline.fallback_reason, Some(FallbackReason::ConnectionFailure));
        assert_eq!(offline.reply, fallback_response(FallbackReason::ConnectionFailure));

        // transcript keeps alternating roles
        let roles: Vec<Role> = service
            .export(blocked.session_id)
            .unwrap()
            .iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_overlong_model_reply_replaced() {
        let long_reply: &'static str = Box::leak("x".repeat(400).into_boxed_str());
        let service = service_with(replying(long_reply), conversation_config(20, Some(300)), ActivityLogger::noop());

        let reply = service.send_message(None, "Help", "advise").await.unwrap();
        assert!(reply.fallback);
        assert_eq!(reply.fallback_reason, Some(FallbackReason::Generic));
        assert_eq!(reply.reply, fallback_response(FallbackReason::Generic));
    }

    #[tokio::test]
    async fn test_fallback_cut_to_small_length_limit() {
        let service = service_with(
            replying("A fifty character reply that is over the limit!!"),
            conversation_config(20, Some(20)),
            ActivityLogger::noop(),
        );

        let reply = service.send_message(None, "Help me", "advise").await.unwrap();
        assert_eq!(reply.fallback_reason, Some(FallbackReason::Generic));
        assert_eq!(reply.reply, "Something went wrong");

        let export = service.export(reply.session_id).unwrap();
        assert_eq!(export.len(), 2);
        assert_eq!(export[0].content, "Help me");
        assert_eq!(export[1].content, "Something went wrong");
        assert_eq!(export[1].metadata["fallback"], json!(true));
    }

    #[tokio::test]
    async fn test_model_failure_with_small_limit_still_replies() {
        let mut mock = MockModelClient::new();
        mock.expect_model_info().returning(model_info);
        mock.expect_generate()
            .returning(|_, _, _| Err(ModelError::connection("timeout")));

        let service = service_with(mock, conversation_config(20, Some(20)), ActivityLogger::noop());
        let reply = service.send_message(None, "Hello", "advise").await.unwrap();

        assert_eq!(reply.fallback_reason, Some(FallbackReason::ConnectionFailure));
        assert_eq!(reply.reply.chars().count(), 20);
        let roles: Vec<Role> = service.export(reply.session_id).unwrap().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_rejected_turn_leaves_log_unchanged() {
        let service = service_with(
            replying("List your top five skills."),
            conversation_config(20, Some(30)),
            ActivityLogger::noop(),
        );
        let first = service.send_message(None, "Where do I start?", "advise").await.unwrap();
        let before = service.export(first.session_id).unwrap();

        let err = service
            .send_message(Some(first.session_id), &"y".repeat(31), "advise")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Context(ContextError::InputTooLong { len: 31, max: 30 })));

        let err = service
            .send_message(Some(first.session_id), " \n ", "advise")
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Context(ContextError::EmptyInput)));

        assert_eq!(service.export(first.session_id).unwrap(), before);
    }

    struct SlowEcho;

    #[async_trait]
    impl ModelClient for SlowEcho {
        async fn generate(&self, history: &[Message], _: &str, _: &GenerationParams) -> Result<String, ModelError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(format!("Answer after {} messages", history.len()))
        }

        fn model_info(&self) -> ModelInfo {
            model_info()
        }
    }

    #[tokio::test]
    async fn test_overlapping_turns_on_one_session_are_serialized() {
        let sessions = SessionStore::new(&conversation_config(20, None), ActivityLogger::noop()).unwrap();
        let service = ChatService::new(
            sessions,
            Arc::new(SlowEcho),
            GenerationParams::default(),
            10,
            ActivityLogger::noop(),
        );
        let id = SessionId::new_v4();

        let (a, b) = tokio::join!(
            service.send_message(Some(id), "first question", "advise"),
            service.send_message(Some(id), "second question", "advise"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        let mut sizes = vec![a.window_size, b.window_size];
        sizes.sort();
        assert_eq!(sizes, vec![1, 3]);

        let roles: Vec<Role> = service.export(id).unwrap().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_activity_events() {
        let (logger, receiver) = ActivityLogger::channel(64);
        let mut mock = MockModelClient::new();
        mock.expect_model_info().returning(model_info);
        mock.expect_generate()
            .returning(|_, _, _| Err(ModelError::generic("boom")));

        let service = service_with(mock, conversation_config(20, None), logger);
        service.send_message(None, "hello there", "advise").await.unwrap();

        let types: Vec<ActivityType> = receiver.try_iter().map(|log| log.activity_type).collect();
        assert_eq!(
            types,
            vec![
                ActivityType::SessionCreated,
                ActivityType::MessageAppended,
                ActivityType::ModelError,
                ActivityType::MessageAppended,
                ActivityType::FallbackServed,
                ActivityType::UserInteraction,
            ]
        );
    }

    #[tokio::test]
    async fn test_session_operations() {
        let service = service(replying("Start by listing your strengths."));
        let reply = service.send_message(None, "Where do I begin?", "advise").await.unwrap();
        let id = reply.session_id;

        let stats = service.stats(id).unwrap();
        assert_eq!(stats.user_messages, 1);
        assert_eq!(stats.assistant_messages, 1);

        let summary = service.summary(id).unwrap();
        assert!(summary.summary.starts_with("Conversation Summary:"));
        assert!(summary.display.contains("USER: Where do I begin?"));

        service.clear(id).unwrap();
        assert!(service.export(id).unwrap().is_empty());

        let missing = SessionId::new_v4();
        assert!(matches!(service.stats(missing), Err(ChatError::SessionNotFound(_))));
        assert!(matches!(service.clear(missing), Err(ChatError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn test_model_info_and_connection() {
        let mut mock = MockModelClient::new();
        mock.expect_model_info().returning(model_info);
        mock.expect_test_connection().returning(|| true);

        let service = service(mock);
        assert_eq!(service.model_info().model, "gemini-2.5-flash");
        assert!(service.test_connection().await);
    }
}
