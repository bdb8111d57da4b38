//! OpenAI-compatible chat-completions client
//!
//! Serves both the hosted OpenAI API and local servers that speak the same
//! protocol (GPT4All, llama.cpp, Ollama), where no API key is needed.

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

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// GPT4All's built-in API server
pub const LOCAL_BASE_URL: &str = "http://localhost:4891/v1";

/// OpenAI-compatible API client
pub struct OpenAIClient {
    name: String,
    api_key: Option<String>,
    base_url: String,
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    default_model: String,
}

impl OpenAIClient {
    /// Hosted OpenAI client
    pub fn new(api_key: String) -> Self {
        Self {
            name: "openai".to_string(),
            api_key: Some(api_key),
            base_url: DEFAULT_BASE_URL.to_string(),
            http_client: Client::new(),
            rate_limiter: Arc::new(RateLimiter::new(500)),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Client for a local OpenAI-compatible server; unthrottled by default
    pub fn local(model: impl Into<String>) -> Self {
        Self {
            name: "local".to_string(),
            api_key: None,
            base_url: LOCAL_BASE_URL.to_string(),
            http_client: Client::new(),
            rate_limiter: Arc::new(RateLimiter::unlimited()),
            default_model: model.into(),
        }
    }

    /// Create from environment variable
    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::Config("OPENAI_API_KEY not set".to_string()))?;
        Ok(Self::new(api_key))
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
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

    /// Newer hosted models only accept `max_completion_tokens`
    fn uses_completion_tokens(model: &str) -> bool {
        model.starts_with("o1")
            || model.starts_with("o3")
            || model.starts_with("o4")
            || model.starts_with("gpt-5")
    }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<Choice>,
    model: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

fn build_request(request: &CompletionRequest, model: String) -> OpenAIRequest {
    let completion_tokens = OpenAIClient::uses_completion_tokens(&model);
    OpenAIRequest {
        messages: vec![OpenAIMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        }],
        max_tokens: (!completion_tokens).then_some(request.max_tokens),
        max_completion_tokens: completion_tokens.then_some(request.max_tokens),
        temperature: request.temperature,
        model,
    }
}

fn into_completion(
    response: OpenAIResponse,
    requested_model: &str,
    latency_ms: u64,
) -> ProviderResult<CompletionResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("No choices in response".to_string()))?;

    Ok(CompletionResponse {
        content: choice.message.content.unwrap_or_default(),
        model: response
            .model
            .unwrap_or_else(|| requested_model.to_string()),
        usage: response.usage.unwrap_or_default(),
        finish_reason: choice
            .finish_reason
            .unwrap_or_else(|| "unknown".to_string()),
        latency_ms,
    })
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    fn name(&self) -> &str {
        &self.name
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
        let body = build_request(request, model.clone());

        let mut http = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            http = http.header("Authorization", format!("Bearer {}", key));
        }

        let response = http.json(&body).send().await?;

        let latency_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status.as_u16(), &body);

            if status == 429 {
                tracing::debug!("Rate limited by {}: {}", self.name, message);
                return Err(ProviderError::RateLimited { message });
            }
            if status == 401 || status == 403 {
                return Err(ProviderError::Config(format!(
                    "{} auth error ({}): {}",
                    self.name,
                    status.as_u16(),
                    message
                )));
            }
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let api_response: OpenAIResponse = response.json().await?;
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
    fn test_token_field_selection() {
        let request = CompletionRequest::new("q", 128).with_temperature(1.0);

        let legacy = serde_json::to_value(build_request(&request, "gpt-4o-mini".into())).unwrap();
        assert_eq!(legacy["max_tokens"], 128);
        assert!(legacy.get("max_completion_tokens").is_none());

        let newer = serde_json::to_value(build_request(&request, "gpt-5-mini".into())).unwrap();
        assert_eq!(newer["max_completion_tokens"], 128);
        assert!(newer.get("max_tokens").is_none());
        assert_eq!(newer["messages"][0]["role"], "user");
    }

    #[test]
    fn test_local_client_defaults() {
        let client = OpenAIClient::local("Llama-3.2-3B-Instruct");
        assert_eq!(client.name(), "local");
        assert_eq!(client.default_model(), "Llama-3.2-3B-Instruct");
        assert!(client.api_key.is_none());
        assert_eq!(client.base_url, LOCAL_BASE_URL);
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "model": "gpt-4o-mini-2024-07-18",
            "choices": [{"message": {"role": "assistant", "content": "Final: C"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 90, "completion_tokens": 4, "total_tokens": 94}
        }"#;
        let response: OpenAIResponse = serde_json::from_str(json).unwrap();
        let completion = into_completion(response, "gpt-4o-mini", 7).unwrap();
        assert_eq!(completion.content, "Final: C");
        assert_eq!(completion.model, "gpt-4o-mini-2024-07-18");
        assert_eq!(completion.usage["completion_tokens"], 4);
        assert_eq!(completion.finish_reason, "stop");
    }

    #[test]
    fn test_local_server_without_usage() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": "Final:A"}}]}"#;
        let response: OpenAIResponse = serde_json::from_str(json).unwrap();
        let completion = into_completion(response, "local-model", 7).unwrap();
        assert_eq!(completion.model, "local-model");
        assert!(completion.usage.is_empty());
        assert_eq!(completion.finish_reason, "unknown");
    }

    #[test]
    fn test_empty_choices_is_parse_error() {
        let response: OpenAIResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(
            into_completion(response, "m", 1),
            Err(ProviderError::Parse(_))
        ));
    }
}
