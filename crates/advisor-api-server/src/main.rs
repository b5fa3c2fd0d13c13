use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use advisor_api_server::build_router;
use advisor_api_server::config::Settings;
use advisor_api_server::logging::init_logging;
use advisor_api_server::services::{ChatService, GeminiService, GenerationParams, SessionStore};
use advisor_core::ActivityLogger;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;

    // Initialize logging
    init_logging(&settings.logging)?;
    info!("🚀 Starting {}...", settings.app.name);
    info!("✅ Configuration loaded (model: {})", settings.gemini.model);

    let activity_logger = ActivityLogger::new(settings.logging.activity_logger_config())?;
    info!("✅ Activity logger started");

    // Initialize services
    let gemini = Arc::new(GeminiService::new(settings.gemini.clone()));
    let sessions = SessionStore::new(&settings.conversation, activity_logger.clone())?;

    let chat_service = Arc::new(ChatService::new(
        sessions.clone(),
        gemini,
        GenerationParams {
            temperature: settings.gemini.temperature,
            max_output_tokens: settings.gemini.max_output_tokens,
        },
        settings.gemini.min_response_chars,
        activity_logger,
    ));

    // Expire idle sessions in the background
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            sessions.cleanup_expired();
        }
    });

    if !chat_service.test_connection().await {
        warn!("⚠️ Gemini connection test failed; replies will fall back until it recovers");
    }

    let app = build_router(chat_service);

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
