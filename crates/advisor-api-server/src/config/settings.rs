use advisor_core::{ContextConfig, ContextError, LoggerConfig, OverlengthPolicy};
use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub gemini: GeminiConfig,
    pub conversation: ConversationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GeminiConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Shortest reply (in characters) accepted as a real answer
    pub min_response_chars: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationConfig {
    pub max_history: usize,
    pub retention_limit: usize,
    #[serde(default)]
    pub max_message_chars: Option<usize>,
    #[serde(default)]
    pub overlength_policy: OverlengthPolicy,
    pub session_timeout_minutes: u64,
    pub max_sessions: usize,
    pub memory_limit_percent: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub directory: PathBuf,
    pub file_prefix: String,
    pub activity_queue_capacity: usize,
    pub activity_batch_size: usize,
    pub activity_batch_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Settings {
    pub fn load() -> Result<Self, SettingsError> {
        dotenvy::dotenv().ok();

        let config = Self::defaults()?
            .add_source(File::with_name("config/settings").required(false))
            // Example: APP_GEMINI__MODEL=gemini-2.5-pro
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;

        if settings.gemini.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            settings.gemini.api_key = std::env::var("GEMINI_API_KEY").ok();
        }

        settings.validate()?;
        Ok(settings)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("app.name", "Career Advisor Chatbot")?
            .set_default("app.description", "AI-powered career guidance and professional development")?
            .set_default("gemini.model", "gemini-2.5-flash")?
            .set_default("gemini.base_url", "https://generativelanguage.googleapis.com")?
            .set_default("gemini.timeout_seconds", 60)?
            .set_default("gemini.temperature", 0.7)?
            .set_default("gemini.max_output_tokens", 4096)?
            .set_default("gemini.min_response_chars", 10)?
            .set_default("conversation.max_history", 20)?
            .set_default("conversation.retention_limit", 50)?
            .set_default("conversation.overlength_policy", "reject")?
            .set_default("conversation.session_timeout_minutes", 30)?
            .set_default("conversation.max_sessions", 1000)?
            .set_default("conversation.memory_limit_percent", 90.0)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("logging.directory", "logs")?
            .set_default("logging.file_prefix", "advisor")?
            .set_default("logging.activity_queue_capacity", 10_000)?
            .set_default("logging.activity_batch_size", 100)?
            .set_default("logging.activity_batch_timeout_ms", 1000)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.gemini.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
            return Err(SettingsError::Invalid(
                "GEMINI_API_KEY is not set. Add it to your .env file or set APP_GEMINI__API_KEY.".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.gemini.temperature) {
            return Err(SettingsError::Invalid("temperature must be between 0 and 1".to_string()));
        }

        if self.gemini.max_output_tokens < 1 {
            return Err(SettingsError::Invalid("max_output_tokens must be greater than 0".to_string()));
        }

        if self.gemini.min_response_chars < 1 {
            return Err(SettingsError::Invalid("min_response_chars must be at least 1".to_string()));
        }

        if self.conversation.session_timeout_minutes == 0 {
            return Err(SettingsError::Invalid(
                "session_timeout_minutes must be greater than 0".to_string(),
            ));
        }

        if self.conversation.max_sessions == 0 {
            return Err(SettingsError::Invalid("max_sessions must be greater than 0".to_string()));
        }

        self.conversation
            .context_config()
            .map_err(|e| SettingsError::Invalid(e.to_string()))?;

        Ok(())
    }
}

impl GeminiConfig {
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }
}

impl ConversationConfig {
    pub fn context_config(&self) -> Result<ContextConfig, ContextError> {
        ContextConfig::new(
            self.max_history,
            self.retention_limit,
            self.max_message_chars,
            self.overlength_policy,
        )
    }
}

impl LoggingConfig {
    pub fn activity_logger_config(&self) -> LoggerConfig {
        LoggerConfig {
            queue_capacity: self.activity_queue_capacity,
            batch_size: self.activity_batch_size,
            batch_timeout_ms: self.activity_batch_timeout_ms,
            directory: self.directory.clone(),
            file_prefix: format!("{}-activity", self.file_prefix),
        }
    }
}

#[cfg(test)]
impl Settings {
    pub(crate) fn from_toml(toml: &str) -> Result<Self, SettingsError> {
        let config = Self::defaults()?
            .add_source(File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}
