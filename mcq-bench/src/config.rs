//! Configuration management for the benchmark harness
//!
//! Loads backend, dataset, run and analysis settings from a TOML file.
//! Every value has a default so a missing file still yields a usable config.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_providers")]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Backend-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    /// API root; `None` uses the client's built-in endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Environment variable holding the API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    pub default_model: String,
    /// Requests per minute, 0 for unlimited
    #[serde(default = "default_rpm")]
    pub rpm: u32,
}

/// Inputs and outputs of `build-dataset`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_questions_pdf")]
    pub questions_pdf: PathBuf,
    #[serde(default = "default_answers_pdf")]
    pub answers_pdf: PathBuf,
    #[serde(default = "default_dataset_path")]
    pub output: PathBuf,
    #[serde(default = "default_answer_map_path")]
    pub answer_map: PathBuf,
}

/// Settings for `run`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Overrides the backend's default model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_dataset_path")]
    pub data: PathBuf,
    #[serde(default = "default_outputs_path")]
    pub out: PathBuf,
    #[serde(default = "default_treatments")]
    pub treatments: Vec<String>,
    #[serde(default = "default_temperatures")]
    pub temperatures: Vec<f64>,
    #[serde(default = "default_repeats")]
    pub repeats: u32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Overrides the backend's configured rpm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpm_limit: Option<u32>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Settings for `analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_summary_csv")]
    pub summary_csv: PathBuf,
    /// Rows shown in the missing-prediction warning
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
}

// Default value functions
fn default_rpm() -> u32 { 60 }
fn default_backend() -> String { "gemini".to_string() }
fn default_questions_pdf() -> PathBuf { PathBuf::from("data/AP Chemistry 60 Multiple Choices.pdf") }
fn default_answers_pdf() -> PathBuf { PathBuf::from("data/AP Chemistry 60 Multiple Choices Answer.pdf") }
fn default_dataset_path() -> PathBuf { PathBuf::from("data/apchem_60.jsonl") }
fn default_answer_map_path() -> PathBuf { PathBuf::from("data/apchem_60_answers.json") }
fn default_outputs_path() -> PathBuf { PathBuf::from("outputs/rq1_small_outputs.jsonl") }
fn default_treatments() -> Vec<String> {
    ["T0", "T1", "T2", "T3", "T4"].iter().map(|t| t.to_string()).collect()
}
fn default_temperatures() -> Vec<f64> { vec![0.2, 1.0] }
fn default_repeats() -> u32 { 1 }
fn default_max_output_tokens() -> u32 { 128 }
fn default_timeout_ms() -> u64 { 120_000 }
fn default_summary_csv() -> PathBuf { PathBuf::from("outputs/analysis_summary.csv") }
fn default_max_examples() -> usize { 5 }

fn default_providers() -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();

    // Key comes from GEMINI_API_KEY or GOOGLE_API_KEY
    providers.insert("gemini".to_string(), ProviderConfig {
        name: "gemini".to_string(),
        base_url: None,
        api_key_env: None,
        default_model: "models/gemini-flash-latest".to_string(),
        rpm: 5,
    });

    providers.insert("openai".to_string(), ProviderConfig {
        name: "openai".to_string(),
        base_url: None,
        api_key_env: Some("OPENAI_API_KEY".to_string()),
        default_model: "gpt-4o-mini".to_string(),
        rpm: 500,
    });

    providers.insert("local".to_string(), ProviderConfig {
        name: "local".to_string(),
        base_url: Some("http://localhost:4891/v1".to_string()),
        api_key_env: None,
        default_model: "Llama 3 8B Instruct".to_string(),
        rpm: 0,
    });

    providers
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            questions_pdf: default_questions_pdf(),
            answers_pdf: default_answers_pdf(),
            output: default_dataset_path(),
            answer_map: default_answer_map_path(),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: None,
            data: default_dataset_path(),
            out: default_outputs_path(),
            treatments: default_treatments(),
            temperatures: default_temperatures(),
            repeats: default_repeats(),
            max_output_tokens: default_max_output_tokens(),
            rpm_limit: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            summary_csv: default_summary_csv(),
            max_examples: default_max_examples(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: default_providers(),
            dataset: DatasetConfig::default(),
            run: RunConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load from default config location or return defaults
    pub fn load_or_default() -> Self {
        let config_paths = [
            "config/bench.toml",
            "../config/bench.toml",
            "mcq-bench/config/bench.toml",
        ];

        for path in &config_paths {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", path);
                        return config;
                    }
                    Err(e) => tracing::warn!("Ignoring {}: {}", path, e),
                }
            }
        }

        tracing::info!("Using default configuration");
        Self::default()
    }

    /// Save configuration to a TOML file
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, content).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get a specific provider config
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
