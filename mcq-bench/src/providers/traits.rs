//! Provider trait definitions for model backends

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::runner::rate_limiter::RateLimiter;

/// Raw usage metadata as reported by the backend
pub type Usage = serde_json::Map<String, serde_json::Value>;

/// Request for a single generation
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub model: Option<String>,
    pub prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: None,
            prompt: prompt.into(),
            max_tokens,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }
}

/// Response from a model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub usage: Usage,
    pub finish_reason: String,
    pub latency_ms: u64,
}

/// Error types for provider operations
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by backend (HTTP 429): {message}")]
    RateLimited { message: String },

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// A model backend able to generate text for a prompt
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Backend name (e.g., "gemini", "local")
    fn name(&self) -> &str;

    /// Model used when the request does not name one
    fn default_model(&self) -> &str;

    /// Send one generation request without pacing
    async fn send(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse>;

    /// Client-side pacing for this backend
    fn rate_limiter(&self) -> &Arc<RateLimiter>;

    /// Wait for the rate limiter, then send
    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        self.rate_limiter().acquire().await;
        self.send(request).await
    }
}

/// Pull a human-readable message out of an error body, falling back to the raw text
pub(crate) fn error_message(status: u16, body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }

    #[derive(Deserialize)]
    struct Detail {
        message: String,
    }

    match serde_json::from_str::<Envelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) => format!("HTTP {}: {}", status, body.trim()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    struct Echo {
        limiter: Arc<RateLimiter>,
    }

    #[async_trait]
    impl LLMProvider for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn default_model(&self) -> &str {
            "echo-1"
        }

        async fn send(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
            Ok(CompletionResponse {
                content: request.prompt.clone(),
                model: "echo-1".to_string(),
                usage: Usage::new(),
                finish_reason: "stop".to_string(),
                latency_ms: 0,
            })
        }

        fn rate_limiter(&self) -> &Arc<RateLimiter> {
            &self.limiter
        }
    }

    #[tokio::test]
    async fn test_complete_waits_for_rate_limiter() {
        let echo = Echo {
            limiter: Arc::new(RateLimiter::with_window(1, Duration::from_millis(200))),
        };
        let request = CompletionRequest::new("hi", 8);

        let started = Instant::now();
        assert_eq!(echo.complete(&request).await.unwrap().content, "hi");
        assert_eq!(echo.complete(&request).await.unwrap().content, "hi");
        assert!(started.elapsed() >= Duration::from_millis(190));

        // send alone is never paced
        let started = Instant::now();
        echo.send(&request).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_request_builder() {
        let request = CompletionRequest::new("prompt", 128)
            .with_model("m")
            .with_temperature(0.2);
        assert_eq!(request.model.as_deref(), Some("m"));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, 128);
    }

    #[test]
    fn test_error_message_from_envelope() {
        let body = r#"{"error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(400, body), "API key not valid");
        assert_eq!(error_message(502, "bad gateway\n"), "HTTP 502: bad gateway");
    }
}
