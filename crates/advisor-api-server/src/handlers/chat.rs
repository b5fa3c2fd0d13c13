use advisor_core::SessionId;
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use crate::prompts::{GuidanceContext, SystemPrompt};
use crate::services::{ChatReply, ChatService, ModelInfo};
use crate::utils::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<SessionId>,
    pub message: String,
    #[serde(default)]
    pub context: GuidanceContext,
    pub user_name: Option<String>,
}

pub async fn chat_handler(
    Extension(chat_service): Extension<Arc<ChatService>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    info!(
        "Chat request: session={:?}, message_len={}, context={}",
        request.session_id,
        request.message.len(),
        request.context
    );

    let instruction = SystemPrompt::for_context(request.context, request.user_name.as_deref());
    let reply = chat_service
        .send_message(request.session_id, &request.message, &instruction)
        .await?;

    Ok(Json(reply))
}

pub async fn model_info_handler(Extension(chat_service): Extension<Arc<ChatService>>) -> Json<ModelInfo> {
    Json(chat_service.model_info())
}
