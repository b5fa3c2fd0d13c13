use crate::config::GeminiConfig;
use crate::services::model_client::{GenerationParams, ModelClient, ModelError, ModelInfo};
use advisor_core::{Message, Role};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Finish reasons that mean the answer was withheld
const BLOCKED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII", "RECITATION"];

#[derive(Clone)]
pub struct GeminiService {
    client: Client,
    config: GeminiConfig,
}

// ===== REQUEST =====

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

// ===== RESPONSE =====

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl GeminiService {
    pub fn new(config: GeminiConfig) -> Self {
        info!("Gemini API configured with model: {}", config.model);
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .unwrap_or_else(|_| Client::new()),
            config,
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(history: &[Message], instruction: &str, params: &GenerationParams) -> GenerateContentRequest {
        let contents = history
            .iter()
            .map(|msg| GeminiContent {
                role: Some(match msg.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                }),
                parts: vec![GeminiPart {
                    text: msg.content.clone(),
                }],
            })
            .collect();

        GenerateContentRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: instruction.to_string(),
                }],
            },
            contents,
            generation_config: GeminiGenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
        }
    }

    fn classify_status(status: StatusCode, body: &str) -> ModelError {
        let detail = serde_json::from_str::<ErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.to_string());
        let message = format!("Gemini API Error ({}): {}", status, detail);

        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            ModelError::connection(message)
        } else {
            ModelError::generic(message)
        }
    }

    fn classify_transport(e: &reqwest::Error) -> ModelError {
        if e.is_connect() || e.is_timeout() {
            ModelError::connection(format!("Gemini Network Error: {}", e))
        } else {
            ModelError::generic(format!("Gemini Request Error: {}", e))
        }
    }

    fn extract_text(body: GenerateContentResponse) -> Result<String, ModelError> {
        if let Some(reason) = body.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(ModelError::blocked(format!("Prompt blocked: {}", reason)));
        }

        let Some(candidate) = body.candidates.into_iter().next() else {
            return Ok(String::new());
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            if let Some(reason) = candidate
                .finish_reason
                .as_deref()
                .filter(|r| BLOCKED_FINISH_REASONS.contains(r))
            {
                return Err(ModelError::blocked(format!("Response blocked: {}", reason)));
            }
        }

        Ok(text)
    }
}

#[async_trait]
impl ModelClient for GeminiService {
    async fn generate(
        &self,
        history: &[Message],
        instruction: &str,
        params: &GenerationParams,
    ) -> Result<String, ModelError> {
        if history.is_empty() {
            return Err(ModelError::generic("Cannot generate from an empty conversation"));
        }

        debug!("Calling {} with {} messages", self.config.model, history.len());
        let start = Instant::now();

        let request = Self::build_request(history, instruction, params);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.config.api_key())
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| Self::classify_transport(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let err = Self::classify_status(status, &body);
            warn!("{}", err);
            return Err(err);
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ModelError::generic(format!("Failed to parse Gemini response: {}", e)))?;

        let text = Self::extract_text(body)?;

        if text.is_empty() {
            warn!("Received empty response from Gemini API");
        } else {
            info!(
                "Generated response from {} ({} chars, {:?})",
                self.config.model,
                text.len(),
                start.elapsed()
            );
        }

        Ok(text)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            max_output_tokens: self.config.max_output_tokens,
            configured: !self.config.api_key().trim().is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::model_client::ModelErrorKind;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

    fn config(base_url: &str) -> GeminiConfig {
        GeminiConfig {
            api_key: Some("test-key".to_string()),
            model: "gemini-2.5-flash".to_string(),
            base_url: base_url.to_string(),
            timeout_seconds: 5,
            temperature: 0.7,
            max_output_tokens: 4096,
            min_response_chars: 10,
        }
    }

    fn reply(text: &str) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    fn history() -> Vec<Message> {
        vec![
            Message::user("I want to switch careers"),
            Message::assistant("Great! Let's explore that."),
            Message::user("I'm from finance"),
        ]
    }

    #[tokio::test]
    async fn test_generate_sends_history_and_instruction() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [{ "text": "Be a career advisor." }] },
                "contents": [
                    { "role": "user", "parts": [{ "text": "I want to switch careers" }] },
                    { "role": "model", "parts": [{ "text": "Great! Let's explore that." }] },
                    { "role": "user", "parts": [{ "text": "I'm from finance" }] }
                ],
                "generationConfig": { "maxOutputTokens": 4096 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Consider financial analysis roles.")))
            .expect(1)
            .mount(&server)
            .await;

        let service = GeminiService::new(config(&server.uri()));
        let text = service
            .generate(&history(), "Be a career advisor.", &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(text, "Consider financial analysis roles.");
    }

    #[tokio::test]
    async fn test_prompt_block_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let service = GeminiService::new(config(&server.uri()));
        let err = service
            .generate(&history(), "x", &GenerationParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ModelErrorKind::Blocked);
    }

    #[tokio::test]
    async fn test_safety_finish_reason_is_blocked() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "SAFETY" }]
            })))
            .mount(&server)
            .await;

        let service = GeminiService::new(config(&server.uri()));
        let err = service
            .generate(&history(), "x", &GenerationParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ModelErrorKind::Blocked);
    }

    #[tokio::test]
    async fn test_no_candidates_is_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let service = GeminiService::new(config(&server.uri()));
        let text = service
            .generate(&history(), "x", &GenerationParams::default())
            .await
            .unwrap();

        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_connection_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": { "code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE" }
            })))
            .mount(&server)
            .await;

        let service = GeminiService::new(config(&server.uri()));
        let err = service
            .generate(&history(), "x", &GenerationParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ModelErrorKind::ConnectionFailure);
        assert!(err.message.contains("The model is overloaded."));
    }

    #[tokio::test]
    async fn test_bad_request_is_generic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad"))
            .mount(&server)
            .await;

        let service = GeminiService::new(config(&server.uri()));
        let err = service
            .generate(&history(), "x", &GenerationParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ModelErrorKind::Generic);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_failure() {
        let service = GeminiService::new(config("http://127.0.0.1:1"));
        let err = service
            .generate(&history(), "x", &GenerationParams::default())
            .await
            .unwrap_err();

        assert_eq!(err.kind, ModelErrorKind::ConnectionFailure);
    }

    #[tokio::test]
    async fn test_connection_check() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(reply("Hello!")))
            .mount(&server)
            .await;

        assert!(GeminiService::new(config(&server.uri())).test_connection().await);
        assert!(!GeminiService::new(config("http://127.0.0.1:1")).test_connection().await);
    }

    #[test]
    fn test_model_info() {
        let info = GeminiService::new(config("http://localhost")).model_info();
        assert_eq!(info.model, "gemini-2.5-flash");
        assert!(info.configured);
    }
}
