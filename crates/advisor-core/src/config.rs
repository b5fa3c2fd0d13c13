use serde::{Deserialize, Serialize};

use crate::error::ContextError;

/// Default number of messages sent to the model per request
pub const DEFAULT_MAX_WINDOW_MESSAGES: usize = 20;

/// What to do with a message longer than `max_message_chars`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlengthPolicy {
    /// Reject with `ContextError::InputTooLong`
    #[default]
    Reject,
    /// Keep the leading grapheme clusters up to the limit
    Truncate,
}

/// Bounds of one conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// H: max messages in the request window
    pub max_window_messages: usize,

    /// R: max messages retained for export/statistics (R >= H)
    pub retention_limit: usize,

    /// L: max characters (grapheme clusters) per message
    pub max_message_chars: Option<usize>,

    #[serde(default)]
    pub overlength_policy: OverlengthPolicy,
}

impl ContextConfig {
    pub fn new(
        max_window_messages: usize,
        retention_limit: usize,
        max_message_chars: Option<usize>,
        overlength_policy: OverlengthPolicy,
    ) -> Result<Self, ContextError> {
        let config = Self {
            max_window_messages,
            retention_limit,
            max_message_chars,
            overlength_policy,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ContextError> {
        if self.max_window_messages == 0 {
            return Err(ContextError::InvalidConfig(
                "max_window_messages must be greater than 0".to_string(),
            ));
        }

        if self.retention_limit < self.max_window_messages {
            return Err(ContextError::InvalidConfig(format!(
                "retention_limit ({}) must be >= max_window_messages ({})",
                self.retention_limit, self.max_window_messages
            )));
        }

        if self.max_message_chars == Some(0) {
            return Err(ContextError::InvalidConfig(
                "max_message_chars must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_window_messages: DEFAULT_MAX_WINDOW_MESSAGES,
            retention_limit: DEFAULT_MAX_WINDOW_MESSAGES,
            max_message_chars: None,
            overlength_policy: OverlengthPolicy::Reject,
        }
    }
}
