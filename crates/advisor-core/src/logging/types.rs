use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::message::Role;
use crate::SessionId;

/// Activity type categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    SessionCreated,
    SessionExpired,
    MessageAppended,
    InputRejected,
    MemoryOptimized,
    HistoryCleared,
    ModelCall,
    ModelError,
    FallbackServed,
    UserInteraction,
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::SessionCreated => "session_created",
            Self::SessionExpired => "session_expired",
            Self::MessageAppended => "message_appended",
            Self::InputRejected => "input_rejected",
            Self::MemoryOptimized => "memory_optimized",
            Self::HistoryCleared => "history_cleared",
            Self::ModelCall => "model_call",
            Self::ModelError => "model_error",
            Self::FallbackServed => "fallback_served",
            Self::UserInteraction => "user_interaction",
        }
    }
}

/// Activity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Success,
    Error,
    Warning,
    Info,
}

impl ActivityStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

/// Complete activity log entry, written as one JSON line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    // Session
    pub session_id: SessionId,

    // Activity
    pub activity_type: ActivityType,
    pub activity_status: ActivityStatus,

    // Context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    // Metrics
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,

    // Model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    // Error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_fields: HashMap<String, Value>,
}

impl ActivityLog {
    /// Create builder for fluent API
    pub fn builder(session_id: SessionId, activity_type: ActivityType) -> ActivityLogBuilder {
        ActivityLogBuilder::new(session_id, activity_type)
    }
}

/// Builder pattern for ActivityLog
pub struct ActivityLogBuilder {
    log: ActivityLog,
}

impl ActivityLogBuilder {
    pub fn new(session_id: SessionId, activity_type: ActivityType) -> Self {
        Self {
            log: ActivityLog {
                session_id,
                activity_type,
                activity_status: ActivityStatus::Success,
                role: None,
                message: None,
                char_count: None,
                token_count: None,
                message_count: None,
                duration_ms: None,
                model: None,
                error_message: None,
                error_type: None,
                created_at: Utc::now(),
                custom_fields: HashMap::new(),
            },
        }
    }

    pub fn status(mut self, status: ActivityStatus) -> Self {
        self.log.activity_status = status;
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.log.role = Some(role);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.log.message = Some(message.into());
        self
    }

    pub fn char_count(mut self, count: usize) -> Self {
        self.log.char_count = Some(count);
        self
    }

    pub fn token_count(mut self, count: usize) -> Self {
        self.log.token_count = Some(count);
        self
    }

    pub fn message_count(mut self, count: usize) -> Self {
        self.log.message_count = Some(count);
        self
    }

    pub fn duration_ms(mut self, ms: u64) -> Self {
        self.log.duration_ms = Some(ms);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.log.model = Some(model.into());
        self
    }

    pub fn error(mut self, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        self.log.error_type = Some(error_type.into());
        self.log.error_message = Some(message.into());
        self.log.activity_status = ActivityStatus::Error;
        self
    }

    pub fn custom_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.log.custom_fields.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> ActivityLog {
        self.log
    }
}
