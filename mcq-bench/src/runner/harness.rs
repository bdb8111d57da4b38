//! Sequential benchmark loop over question × treatment × temperature × repeat

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::{Scorer, ScoringInput};
use crate::dataset::{DatasetError, JsonlWriter, QuestionRecord};
use crate::prompts::{build_prompt, PromptError, Treatment};
use crate::providers::{CompletionRequest, CompletionResponse, LLMProvider, ProviderError};

use super::record::{CallKey, ResponseRecord};

/// Errors that abort a run
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("Output error: {0}")]
    Output(#[from] DatasetError),
}

/// Run grid and per-call limits
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub treatments: Vec<Treatment>,
    pub temperatures: Vec<f64>,
    pub repeats: u32,
    pub max_output_tokens: u32,
    pub timeout_ms: u64,
    /// Model override; `None` uses the provider's default
    pub model: Option<String>,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            treatments: vec![
                Treatment::T0,
                Treatment::T1,
                Treatment::T2,
                Treatment::T3,
                Treatment::T4,
            ],
            temperatures: vec![0.2, 1.0],
            repeats: 1,
            max_output_tokens: 128,
            timeout_ms: 120_000,
            model: None,
        }
    }
}

impl HarnessConfig {
    /// Replace the treatment list, rejecting unknown names before anything runs
    pub fn with_treatment_names<S: AsRef<str>>(mut self, names: &[S]) -> Result<Self, HarnessError> {
        self.treatments = Treatment::parse_list(names)?;
        Ok(self)
    }

    pub fn with_temperatures(mut self, temperatures: Vec<f64>) -> Self {
        self.temperatures = temperatures;
        self
    }

    pub fn with_repeats(mut self, repeats: u32) -> Self {
        self.repeats = repeats;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Number of calls a run over `questions` questions will issue
    pub fn planned_calls(&self, questions: usize) -> usize {
        questions * self.treatments.len() * self.temperatures.len() * self.repeats as usize
    }

    fn validate(&self) -> Result<(), HarnessError> {
        if let Some(t) = self.temperatures.iter().find(|t| !t.is_finite() || **t < 0.0) {
            return Err(HarnessError::Config(format!("invalid temperature {}", t)));
        }
        if self.timeout_ms == 0 {
            return Err(HarnessError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Counts for a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub planned: usize,
    pub completed: usize,
    pub failed: usize,
    /// Successful calls whose output had a parsable final letter
    pub parsed: usize,
}

/// Drives one backend through the full run grid
pub struct Harness {
    provider: Arc<dyn LLMProvider + Send + Sync>,
    config: HarnessConfig,
    scorer: Scorer,
    run_id: String,
}

impl Harness {
    pub fn new(
        provider: Arc<dyn LLMProvider + Send + Sync>,
        config: HarnessConfig,
    ) -> Result<Self, HarnessError> {
        config.validate()?;
        Ok(Self {
            provider,
            config,
            scorer: Scorer::text_only(),
            run_id: chrono::Utc::now().format("%Y%m%d-%H%M%S").to_string(),
        })
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Model recorded on rows when the backend never answered
    fn configured_model(&self) -> &str {
        self.config
            .model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Append results for every planned call to the file at `path`
    pub async fn run_to_path(
        &self,
        questions: &[QuestionRecord],
        path: impl AsRef<Path>,
        progress: &dyn ProgressCallback,
    ) -> Result<RunSummary, HarnessError> {
        let mut sink = JsonlWriter::append(path)?;
        self.run(questions, &mut sink, progress).await
    }

    /// Issue every planned call in order, writing one row per call.
    ///
    /// Backend failures become error rows; only output I/O aborts the loop.
    pub async fn run<W: Write>(
        &self,
        questions: &[QuestionRecord],
        sink: &mut JsonlWriter<W>,
        progress: &dyn ProgressCallback,
    ) -> Result<RunSummary, HarnessError> {
        let mut summary = RunSummary {
            planned: self.config.planned_calls(questions.len()),
            ..Default::default()
        };

        tracing::info!(
            "Run {}: {} questions, {} planned calls on {}",
            self.run_id,
            questions.len(),
            summary.planned,
            self.provider.name()
        );

        for question in questions {
            for &treatment in &self.config.treatments {
                let prompt = build_prompt(treatment, question);

                for &temperature in &self.config.temperatures {
                    for repeat in 0..self.config.repeats {
                        let key = CallKey {
                            qid: question.qid,
                            treatment,
                            temperature,
                            repeat,
                        };
                        progress.on_call_start(&key);

                        let record = match self.call(&prompt, temperature).await {
                            Ok(response) => {
                                let pred = self.scorer.score(&ScoringInput::text(&response.content));
                                if pred.is_some() {
                                    summary.parsed += 1;
                                }
                                tracing::debug!(
                                    "qid={} {} temp={} rep={} -> {:?} ({}ms)",
                                    key.qid,
                                    treatment,
                                    temperature,
                                    repeat,
                                    pred,
                                    response.latency_ms
                                );
                                ResponseRecord::success(key, response, pred, &self.run_id)
                            }
                            Err(e) => {
                                tracing::error!(
                                    "Call failed for qid={} {} temp={} rep={}: {}",
                                    key.qid,
                                    treatment,
                                    temperature,
                                    repeat,
                                    e
                                );
                                ResponseRecord::failure(
                                    key,
                                    self.configured_model(),
                                    e.to_string(),
                                    &self.run_id,
                                )
                            }
                        };

                        let success = !record.is_error();
                        sink.write_row(&record)?;
                        if success {
                            summary.completed += 1;
                        } else {
                            summary.failed += 1;
                        }

                        progress.on_call_complete(&key, success);
                        progress.on_progress(summary.completed + summary.failed, summary.planned);
                    }
                }
            }
        }

        tracing::info!(
            "Run {} finished: {} ok, {} failed, {} with a final letter",
            self.run_id,
            summary.completed,
            summary.failed,
            summary.parsed
        );
        Ok(summary)
    }

    /// One paced, bounded call to the backend.
    ///
    /// The timeout covers only the request itself, not the rate-limit wait.
    async fn call(&self, prompt: &str, temperature: f64) -> Result<CompletionResponse, ProviderError> {
        let mut request = CompletionRequest::new(prompt, self.config.max_output_tokens)
            .with_temperature(temperature as f32);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }

        let guard = self.provider.rate_limiter().acquire().await;
        if !guard.waited().is_zero() {
            tracing::debug!("Paced for {}ms before call", guard.waited().as_millis());
        }

        let timeout = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(timeout, self.provider.send(&request)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout {
                timeout_ms: self.config.timeout_ms,
            }),
        }
    }
}

/// Progress callback for tracking a run
pub trait ProgressCallback: Send + Sync {
    fn on_call_start(&self, key: &CallKey);
    fn on_call_complete(&self, key: &CallKey, success: bool);
    fn on_progress(&self, completed: usize, total: usize);
}

/// Default no-op progress callback
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_call_start(&self, _key: &CallKey) {}
    fn on_call_complete(&self, _key: &CallKey, _success: bool) {}
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// Console progress callback
pub struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_call_start(&self, _key: &CallKey) {}

    fn on_call_complete(&self, key: &CallKey, success: bool) {
        let status = if success { "OK" } else { "FAILED" };
        println!(
            "  {} qid={} {} temp={} rep={}",
            status, key.qid, key.treatment, key.temperature, key.repeat
        );
    }

    fn on_progress(&self, completed: usize, total: usize) {
        if completed == total || completed % 10 == 0 {
            println!("Progress: {}/{} calls complete", completed, total);
        }
    }
}
