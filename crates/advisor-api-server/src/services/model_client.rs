use advisor_core::Message;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info};
use unicode_segmentation::UnicodeSegmentation;

/// Failure classes of a generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelErrorKind {
    /// The provider refused the prompt or the answer (safety filters)
    Blocked,
    /// Network failure, timeout, or provider overloaded
    ConnectionFailure,
    Generic,
}

impl ModelErrorKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Blocked => "blocked",
            Self::ConnectionFailure => "connection_failure",
            Self::Generic => "generic",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{} model error: {message}", .kind.as_str())]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub message: String,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Blocked, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::ConnectionFailure, message)
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::new(ModelErrorKind::Generic, message)
    }
}

/// Generation parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 4096,
        }
    }
}

/// Model description for status endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInfo {
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub configured: bool,
}

/// Hosted model that turns a conversation into a reply.
///
/// An `Ok` with empty text is possible; callers decide what counts as usable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(
        &self,
        history: &[Message],
        instruction: &str,
        params: &GenerationParams,
    ) -> Result<String, ModelError>;

    fn model_info(&self) -> ModelInfo;

    /// Round trip with a trivial prompt
    async fn test_connection(&self) -> bool {
        let history = [Message::user("Say hello")];
        let params = GenerationParams {
            max_output_tokens: 64,
            ..GenerationParams::default()
        };

        match self.generate(&history, "Respond with a simple greeting.", &params).await {
            Ok(text) if !text.trim().is_empty() => {
                info!("Model connection test successful");
                true
            }
            Ok(_) => {
                error!("Model connection test failed: empty response");
                false
            }
            Err(e) => {
                error!("Model connection test failed: {}", e);
                false
            }
        }
    }
}

/// Reply is long enough to count as an answer
pub fn validate_response(text: &str, min_chars: usize) -> bool {
    text.trim().graphemes(true).count() >= min_chars
}
