//! Model backend implementations

pub mod gemini;
pub mod openai;
pub mod traits;

pub use gemini::GeminiClient;
pub use openai::OpenAIClient;
pub use traits::{
    CompletionRequest, CompletionResponse, LLMProvider, ProviderError, ProviderResult, Usage,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{Config, ProviderConfig};

/// Backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Google Gemini API
    Gemini,
    /// Hosted OpenAI API
    OpenAI,
    /// Local OpenAI-compatible server (GPT4All, llama.cpp, Ollama)
    Local,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gemini => "gemini",
            Backend::OpenAI => "openai",
            Backend::Local => "local",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(Backend::Gemini),
            "openai" | "gpt" => Ok(Backend::OpenAI),
            "local" | "gpt4all" => Ok(Backend::Local),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Settings that override the provider's configured defaults
#[derive(Debug, Clone, Default)]
pub struct ProviderOverrides {
    pub model: Option<String>,
    pub rpm: Option<u32>,
}

fn api_key_from(pc: Option<&ProviderConfig>) -> ProviderResult<Option<String>> {
    let Some(var) = pc.and_then(|p| p.api_key_env.as_deref()) else {
        return Ok(None);
    };
    std::env::var(var)
        .map(Some)
        .map_err(|_| ProviderError::Config(format!("{} not set", var)))
}

/// Create the provider for a backend, applying config and overrides.
///
/// Missing credentials surface here, before any request is sent.
pub fn create_provider(
    backend: Backend,
    config: &Config,
    overrides: &ProviderOverrides,
) -> ProviderResult<Arc<dyn LLMProvider + Send + Sync>> {
    let pc = config.get_provider(backend.as_str());
    let model = overrides
        .model
        .clone()
        .or_else(|| pc.map(|p| p.default_model.clone()));
    let rpm = overrides.rpm.or_else(|| pc.map(|p| p.rpm));

    let provider: Arc<dyn LLMProvider + Send + Sync> = match backend {
        Backend::Gemini => {
            let mut client = match api_key_from(pc)? {
                Some(key) => GeminiClient::new(key),
                None => GeminiClient::from_env()?,
            };
            if let Some(url) = pc.and_then(|p| p.base_url.as_deref()) {
                client = client.with_base_url(url);
            }
            if let Some(model) = model {
                client = client.with_model(model);
            }
            if let Some(rpm) = rpm {
                client = client.with_rate_limit(rpm);
            }
            Arc::new(client)
        }
        Backend::OpenAI | Backend::Local => {
            let mut client = if backend == Backend::Local {
                OpenAIClient::local(openai::DEFAULT_MODEL).with_api_key(api_key_from(pc)?)
            } else {
                match api_key_from(pc)? {
                    Some(key) => OpenAIClient::new(key),
                    None => OpenAIClient::from_env()?,
                }
            };
            if let Some(url) = pc.and_then(|p| p.base_url.as_deref()) {
                client = client.with_base_url(url);
            }
            if let Some(model) = model {
                client = client.with_model(model);
            }
            if let Some(rpm) = rpm {
                client = client.with_rate_limit(rpm);
            }
            Arc::new(client)
        }
    };

    tracing::info!(
        "Using backend {} with model {}",
        provider.name(),
        provider.default_model()
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!("Gemini".parse::<Backend>().unwrap(), Backend::Gemini);
        assert_eq!("gpt4all".parse::<Backend>().unwrap(), Backend::Local);
        assert!("claude".parse::<Backend>().is_err());
    }

    #[test]
    fn test_local_provider_needs_no_key() {
        let config = Config::default();
        let overrides = ProviderOverrides {
            model: Some("mistral-7b-instruct".to_string()),
            rpm: Some(0),
        };
        let provider = create_provider(Backend::Local, &config, &overrides).unwrap();
        assert_eq!(provider.name(), "local");
        assert_eq!(provider.default_model(), "mistral-7b-instruct");
        assert!(provider.rate_limiter().is_unlimited());
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let mut config = Config::default();
        if let Some(pc) = config.providers.get_mut("gemini") {
            pc.api_key_env = Some("MCQ_BENCH_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        }
        let result = create_provider(Backend::Gemini, &config, &ProviderOverrides::default());
        assert!(matches!(result, Err(ProviderError::Config(_))));
    }
}
