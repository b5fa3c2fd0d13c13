//! # Advisor Core
//!
//! Conversation context management for the career advisor chat:
//! - Append-only conversation log with validated turns
//! - Bounded request window sent to the model
//! - Separate retention ceiling for export and statistics
//! - Queued activity logging

pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod message;
pub mod stats;
pub mod token_counter;

pub use config::{ContextConfig, OverlengthPolicy};
pub use error::ContextError;
pub use logging::{ActivityLog, ActivityLogger, ActivityStatus, ActivityType, LoggerConfig};
pub use manager::ConversationManager;
pub use message::{ApiMessage, Message, Role};
pub use stats::SessionStats;
pub use token_counter::TokenCounter;

/// Session identifier
pub type SessionId = uuid::Uuid;
