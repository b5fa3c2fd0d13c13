//! Conversation errors

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Invalid input: message is empty")]
    EmptyInput,

    #[error("Invalid input: message is {len} characters (max: {max})")]
    InputTooLong { len: usize, max: usize },

    #[error("Model returned no usable text")]
    EmptyUpstreamResult,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ContextError {
    /// Rejections caused by the caller's text. The log is untouched.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::EmptyInput | Self::InputTooLong { .. })
    }
}
