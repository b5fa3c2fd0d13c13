pub mod chat_service;
pub mod fallback;
pub mod gemini;
pub mod model_client;
pub mod session_store;

pub use chat_service::{ChatError, ChatReply, ChatService, SessionSummary};
pub use fallback::{fallback_response, FallbackReason};
pub use gemini::GeminiService;
pub use model_client::{validate_response, GenerationParams, ModelClient, ModelError, ModelErrorKind, ModelInfo};
pub use session_store::{SessionStore, SessionStoreError, StoreStats};
