use axum::{http::StatusCode, Extension, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::services::{ChatService, StoreStats};

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    version: String,
    sessions: StoreStats,
}

#[derive(Serialize)]
pub struct ModelHealthResponse {
    status: String,
    model: String,
}

pub async fn health_check(Extension(chat_service): Extension<Arc<ChatService>>) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            sessions: chat_service.sessions().stats(),
        }),
    )
}

/// Round trip to the model; 503 when it fails
pub async fn model_health(
    Extension(chat_service): Extension<Arc<ChatService>>,
) -> (StatusCode, Json<ModelHealthResponse>) {
    let model = chat_service.model_info().model;

    if chat_service.test_connection().await {
        (
            StatusCode::OK,
            Json(ModelHealthResponse {
                status: "connected".to_string(),
                model,
            }),
        )
    } else {
        warn!("Model health check failed for {}", model);
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ModelHealthResponse {
                status: "unavailable".to_string(),
                model,
            }),
        )
    }
}
