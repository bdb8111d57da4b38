//! Google Gemini (Generative Language API) client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::traits::{
    error_message, CompletionRequest, CompletionResponse, LLMProvider, ProviderError,
    ProviderResult, Usage,
};
use crate::runner::rate_limiter::RateLimiter;

pub const DEFAULT_MODEL: &str = "models/gemini-flash-latest";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Free-tier safety ceiling
pub const DEFAULT_RPM: u32 = 5;

/// Gemini API client
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    default_model: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: Client::new(),
            rate_limiter: Arc::new(RateLimiter::new(DEFAULT_RPM)),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create from `GEMINI_API_KEY`, or `GOOGLE_API_KEY` when that is unset
    pub fn from_env() -> ProviderResult<Self> {
        Self::from_env_var("GEMINI_API_KEY")
            .or_else(|_| Self::from_env_var("GOOGLE_API_KEY"))
            .map_err(|_| {
                ProviderError::Config("GEMINI_API_KEY (or GOOGLE_API_KEY) not set".to_string())
            })
    }

    /// Create from a named environment variable
    pub fn from_env_var(var: &str) -> ProviderResult<Self> {
        let api_key = std::env::var(var)
            .map_err(|_| ProviderError::Config(format!("{} not set", var)))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_rate_limit(mut self, rpm: u32) -> Self {
        self.rate_limiter = Arc::new(RateLimiter::new(rpm));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, resource_name(model))
    }
}

/// Accept both `gemini-x` and `models/gemini-x`
fn resource_name(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Usage,
    model_version: Option<String>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn into_completion(
    response: GeminiResponse,
    requested_model: &str,
    latency_ms: u64,
) -> ProviderResult<CompletionResponse> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no reason given".to_string());
        return Err(ProviderError::Parse(format!(
            "No candidates in response ({})",
            reason
        )));
    };

    let content = candidate
        .content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");

    Ok(CompletionResponse {
        content,
        model: response
            .model_version
            .unwrap_or_else(|| requested_model.to_string()),
        usage: response.usage_metadata,
        finish_reason: candidate
            .finish_reason
            .unwrap_or_else(|| "unknown".to_string()),
        latency_ms,
    })
}

#[async_trait]
impl LLMProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn send(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        let start = Instant::now();
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let body = GeminiRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        };

        let response = self
            .http_client
            .post(self.endpoint(&model))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status.as_u16(), &body);
            if status == 429 {
                return Err(ProviderError::RateLimited { message });
            }
            if status == 401 || status == 403 {
                return Err(ProviderError::Config(format!(
                    "Gemini auth error ({}): {}",
                    status.as_u16(),
                    message
                )));
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: GeminiResponse = response.json().await?;
        into_completion(api_response, &model, latency_ms)
    }

    fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name() {
        assert_eq!(resource_name("gemini-flash-latest"), "models/gemini-flash-latest");
        assert_eq!(resource_name("models/gemini-pro"), "models/gemini-pro");
    }

    #[test]
    fn test_endpoint_uses_base_url() {
        let client = GeminiClient::new("k".into()).with_base_url("http://localhost:9000/v1beta/");
        assert_eq!(
            client.endpoint(DEFAULT_MODEL),
            "http://localhost:9000/v1beta/models/gemini-flash-latest:generateContent"
        );
    }

    #[test]
    fn test_request_shape() {
        let body = GeminiRequest {
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part {
                    text: Some("hi".into()),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: Some(0.5),
                max_output_tokens: 64,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 64);
        assert_eq!(value["generationConfig"]["temperature"], 0.5);
    }

    #[test]
    fn test_response_text_and_usage() {
        let json = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "STEPS:\n"}, {"text": "Final:B"}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 120, "candidatesTokenCount": 9, "totalTokenCount": 129},
            "modelVersion": "gemini-2.5-flash"
        }"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let completion = into_completion(response, DEFAULT_MODEL, 42).unwrap();

        assert_eq!(completion.content, "STEPS:\nFinal:B");
        assert_eq!(completion.model, "gemini-2.5-flash");
        assert_eq!(completion.finish_reason, "STOP");
        assert_eq!(completion.usage["totalTokenCount"], 129);
        assert_eq!(completion.latency_ms, 42);
    }

    #[test]
    fn test_blocked_prompt_is_an_error() {
        let json = r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let err = into_completion(response, DEFAULT_MODEL, 1).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_candidate_without_parts_yields_empty_text() {
        let json = r#"{"candidates": [{"content": {"role": "model"}, "finishReason": "MAX_TOKENS"}]}"#;
        let response: GeminiResponse = serde_json::from_str(json).unwrap();
        let completion = into_completion(response, "models/x", 1).unwrap();
        assert_eq!(completion.content, "");
        assert_eq!(completion.model, "models/x");
        assert!(completion.usage.is_empty());
    }
}
