use advisor_core::{ApiMessage, Message, SessionId, SessionStats};
use axum::{extract::Path, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use crate::services::{ChatService, SessionSummary};
use crate::utils::error::ApiError;

#[derive(Serialize)]
pub struct HistoryResponse {
    pub session_id: SessionId,
    pub messages: Vec<ApiMessage>,
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub session_id: SessionId,
    pub exported_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub session_id: SessionId,
    pub cleared: bool,
}

pub async fn history_handler(
    Extension(chat_service): Extension<Arc<ChatService>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let messages = chat_service.history(session_id)?;
    Ok(Json(HistoryResponse { session_id, messages }))
}

pub async fn export_handler(
    Extension(chat_service): Extension<Arc<ChatService>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<ExportResponse>, ApiError> {
    let messages = chat_service.export(session_id)?;
    info!("Exported {} messages for session {}", messages.len(), session_id);

    Ok(Json(ExportResponse {
        session_id,
        exported_at: Utc::now(),
        messages,
    }))
}

pub async fn stats_handler(
    Extension(chat_service): Extension<Arc<ChatService>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionStats>, ApiError> {
    Ok(Json(chat_service.stats(session_id)?))
}

pub async fn summary_handler(
    Extension(chat_service): Extension<Arc<ChatService>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionSummary>, ApiError> {
    Ok(Json(chat_service.summary(session_id)?))
}

pub async fn clear_handler(
    Extension(chat_service): Extension<Arc<ChatService>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<ClearResponse>, ApiError> {
    chat_service.clear(session_id)?;
    info!("Cleared session {}", session_id);

    Ok(Json(ClearResponse {
        session_id,
        cleared: true,
    }))
}
