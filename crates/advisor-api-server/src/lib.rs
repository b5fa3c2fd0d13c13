pub mod config;
pub mod handlers;
pub mod logging;
pub mod prompts;
pub mod services;
pub mod utils;

use axum::{
    routing::{delete, get, post},
    Extension, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use services::ChatService;

pub fn build_router(chat_service: Arc<ChatService>) -> Router {
    let health_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/health/model", get(handlers::health::model_health));

    let api_routes = Router::new()
        .route("/api/model", get(handlers::chat::model_info_handler))
        .route("/api/chat", post(handlers::chat::chat_handler))
        .route("/api/sessions/{session_id}", delete(handlers::session::clear_handler))
        .route("/api/sessions/{session_id}/history", get(handlers::session::history_handler))
        .route("/api/sessions/{session_id}/export", get(handlers::session::export_handler))
        .route("/api/sessions/{session_id}/stats", get(handlers::session::stats_handler))
        .route("/api/sessions/{session_id}/summary", get(handlers::session::summary_handler));

    Router::new()
        .merge(health_routes)
        .merge(api_routes)
        // Shared state
        .layer(Extension(chat_service))
        // CORS
        .layer(CorsLayer::permissive())
        // Tracing
        .layer(TraceLayer::new_for_http().make_span_with(DefaultMakeSpan::default().include_headers(true)))
}
