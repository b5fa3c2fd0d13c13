use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::{ContextConfig, OverlengthPolicy};
use crate::error::ContextError;
use crate::logging::{ActivityLog, ActivityLogger, ActivityStatus, ActivityType};
use crate::message::{ApiMessage, Message, Role};
use crate::stats::SessionStats;
use crate::token_counter::TokenCounter;
use crate::SessionId;

/// Conversation context manager for one session.
///
/// Owns the conversation log. `request_window` bounds what the model sees
/// (`max_window_messages`); `optimize_memory` bounds what is retained for
/// export and statistics (`retention_limit`).
pub struct ConversationManager {
    session_id: SessionId,
    config: ContextConfig,
    messages: Vec<Message>,
    session_start: DateTime<Utc>,
    logger: ActivityLogger,
}

impl ConversationManager {
    pub fn new(session_id: SessionId, config: ContextConfig, logger: ActivityLogger) -> Result<Self, ContextError> {
        config.validate()?;

        Ok(Self {
            session_id,
            messages: Vec::with_capacity(config.max_window_messages),
            config,
            session_start: Utc::now(),
            logger,
        })
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn session_start(&self) -> DateTime<Utc> {
        self.session_start
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a user turn
    pub fn append_user(&mut self, text: &str) -> Result<Message, ContextError> {
        self.append(Role::User, text, HashMap::new())
    }

    /// Append an assistant turn. Empty model output must be handled by the
    /// caller first; it is rejected here and never stored.
    pub fn append_assistant(&mut self, text: &str) -> Result<Message, ContextError> {
        self.append(Role::Assistant, text, HashMap::new())
    }

    pub fn append_assistant_with_metadata(
        &mut self,
        text: &str,
        metadata: HashMap<String, Value>,
    ) -> Result<Message, ContextError> {
        self.append(Role::Assistant, text, metadata)
    }

    fn append(&mut self, role: Role, text: &str, metadata: HashMap<String, Value>) -> Result<Message, ContextError> {
        let content = match self.validate_content(text) {
            Ok(content) => content,
            Err(e) => {
                warn!("Rejected {} message for session {}: {}", role, self.session_id, e);
                self.logger.log(
                    ActivityLog::builder(self.session_id, ActivityType::InputRejected)
                        .role(role)
                        .char_count(TokenCounter::char_count(text))
                        .status(ActivityStatus::Warning)
                        .error("invalid_input", e.to_string())
                        .build(),
                );
                return Err(e);
            }
        };

        let message = Message::new(role, content).with_metadata(metadata);
        let char_count = message.char_count();
        self.messages.push(message.clone());

        debug!("Added {} message: {} characters", role, char_count);
        self.logger.log(
            ActivityLog::builder(self.session_id, ActivityType::MessageAppended)
                .role(role)
                .char_count(char_count)
                .message_count(self.messages.len())
                .build(),
        );

        Ok(message)
    }

    /// Apply the emptiness check and the length policy
    fn validate_content<'a>(&self, text: &'a str) -> Result<&'a str, ContextError> {
        if text.trim().is_empty() {
            return Err(ContextError::EmptyInput);
        }

        let Some(max) = self.config.max_message_chars else {
            return Ok(text);
        };

        let len = TokenCounter::char_count(text);
        if len <= max {
            return Ok(text);
        }

        match self.config.overlength_policy {
            OverlengthPolicy::Reject => Err(ContextError::InputTooLong { len, max }),
            OverlengthPolicy::Truncate => {
                debug!("Truncating message from {} to {} characters", len, max);
                let truncated = TokenCounter::truncate(text, max);
                // Leading whitespace can leave nothing after the cut
                if truncated.trim().is_empty() {
                    return Err(ContextError::EmptyInput);
                }
                Ok(truncated)
            }
        }
    }

    /// The last `min(H, len)` messages, oldest first
    pub fn request_window(&self) -> Vec<Message> {
        let start = self.messages.len().saturating_sub(self.config.max_window_messages);
        self.messages[start..].to_vec()
    }

    /// Request window in role/content form
    pub fn api_history(&self) -> Vec<ApiMessage> {
        let start = self.messages.len().saturating_sub(self.config.max_window_messages);
        self.messages[start..].iter().map(Message::to_api).collect()
    }

    /// Newest messages that fit within `max_tokens` (oldest first), plus the
    /// estimated token total. Never longer than the request window.
    pub fn token_budget_window(&self, max_tokens: usize) -> (Vec<Message>, usize) {
        let mut estimated_tokens = 0usize;
        let mut context = Vec::new();

        for msg in self.messages.iter().rev().take(self.config.max_window_messages) {
            let msg_tokens = msg.estimate_tokens();
            if estimated_tokens + msg_tokens > max_tokens {
                break;
            }
            context.push(msg.clone());
            estimated_tokens += msg_tokens;
        }

        context.reverse();
        (context, estimated_tokens)
    }

    pub fn recent_messages(&self, count: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(count);
        &self.messages[start..]
    }

    /// Drop the oldest messages beyond the retention limit.
    /// Returns the number removed.
    pub fn optimize_memory(&mut self) -> usize {
        let limit = self.config.retention_limit;
        if self.messages.len() <= limit {
            return 0;
        }

        let removed = self.messages.len() - limit;
        self.messages.drain(..removed);

        info!("Optimized memory: removed {} old messages", removed);
        self.logger.log(
            ActivityLog::builder(self.session_id, ActivityType::MemoryOptimized)
                .message_count(self.messages.len())
                .custom_field("removed", removed)
                .build(),
        );

        removed
    }

    /// Undo a user turn that never got a reply.
    /// Only removes the newest message when it is a user turn.
    pub fn pop_last_user(&mut self) -> Option<Message> {
        if self.messages.last()?.role != Role::User {
            return None;
        }

        let message = self.messages.pop()?;
        debug!("Rolled back unanswered user message for session {}", self.session_id);
        Some(message)
    }

    /// Discard every message and restart the session clock
    pub fn clear(&mut self) {
        let removed = self.messages.len();
        self.messages.clear();
        self.session_start = Utc::now();

        info!("Conversation history cleared");
        self.logger.log(
            ActivityLog::builder(self.session_id, ActivityType::HistoryCleared)
                .custom_field("removed", removed)
                .build(),
        );
    }

    /// Every retained message, oldest first
    pub fn export_all(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats::compute(&self.messages, self.session_start, Utc::now())
    }

    pub fn summary(&self) -> String {
        if self.messages.is_empty() {
            return "No conversation yet.".to_string();
        }

        let stats = self.stats();
        format!(
            "Conversation Summary:\n\
             - User Messages: {}\n\
             - Assistant Messages: {}\n\
             - Total Characters: {}\n\
             - Avg User Message: {:.0} chars\n\
             - Avg Assistant Message: {:.0} chars",
            stats.user_messages,
            stats.assistant_messages,
            stats.total_characters,
            stats.avg_user_message_chars,
            stats.avg_assistant_message_chars,
        )
    }

    pub fn display(&self) -> String {
        if self.messages.is_empty() {
            return "Conversation is empty.".to_string();
        }

        self.messages
            .iter()
            .map(Message::formatted_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
