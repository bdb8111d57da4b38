//! Prompting-treatment benchmark harness for multiple-choice exams
//!
//! This crate turns exam question and answer-key documents into a JSONL
//! dataset, runs every question through a model backend under a grid of
//! prompting treatments and temperatures, and scores the persisted outputs.
//!
//! # Features
//!
//! - PDF (or pre-extracted text) parsing into question records with gold letters
//! - Six prompting treatments (T0-T5) sharing a strict `Final:<LETTER>` contract
//! - Gemini, OpenAI and local OpenAI-compatible backends with client-side pacing
//! - Append-only JSONL outputs with per-call failure isolation
//! - Accuracy by treatment and temperature, exported as CSV
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mcq_bench::{
//!     config::Config,
//!     dataset::{read_jsonl, QuestionRecord},
//!     providers::{create_provider, Backend, ProviderOverrides},
//!     runner::{ConsoleProgress, Harness, HarnessConfig},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load_or_default();
//!     let provider = create_provider(Backend::Gemini, &config, &ProviderOverrides::default())?;
//!
//!     let questions: Vec<QuestionRecord> = read_jsonl("data/apchem_60.jsonl")?;
//!     let harness = Harness::new(provider, HarnessConfig::default())?;
//!     let summary = harness
//!         .run_to_path(&questions, "outputs/rq1_small_outputs.jsonl", &ConsoleProgress)
//!         .await?;
//!     println!("{} calls, {} failed", summary.planned, summary.failed);
//!     Ok(())
//! }
//! ```

pub mod analysis;
pub mod config;
pub mod dataset;
pub mod prompts;
pub mod providers;
pub mod reporting;
pub mod runner;

pub use config::Config;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::analysis::{AnalysisReport, Aggregator, ResponseFilter, Scorer, SummaryRow};
    pub use crate::config::Config;
    pub use crate::dataset::{Letter, QuestionRecord};
    pub use crate::prompts::{build_prompt, Treatment};
    pub use crate::providers::{
        create_provider, Backend, CompletionRequest, CompletionResponse, LLMProvider,
        ProviderError, ProviderResult,
    };
    pub use crate::reporting::{print_console_report, write_summary_csv, JsonSummary};
    pub use crate::runner::{Harness, HarnessConfig, ResponseRecord, RunSummary};
}
