//! Prediction extraction from model output
//!
//! A [`Scorer`] runs an ordered list of extractors and keeps the first
//! letter any of them finds. The default order trusts a structured field
//! before searching free text, since free text may mention several letters
//! before the real answer.

use regex::Regex;
use std::sync::LazyLock;

use crate::dataset::Letter;
use crate::runner::ResponseRecord;

/// `Final:B`, `final b`, `**Final:** C`
static FINAL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bFinal[\s:*]+([A-E])\b").expect("final line regex"));

/// What an extractor may look at
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    /// Structured predicted-letter field, if the response has one
    pub structured: Option<&'a str>,
    pub raw_text: &'a str,
}

impl<'a> ScoringInput<'a> {
    pub fn text(raw_text: &'a str) -> Self {
        Self {
            structured: None,
            raw_text,
        }
    }

    pub fn from_record(record: &'a ResponseRecord) -> Self {
        Self {
            structured: record.pred.as_deref(),
            raw_text: &record.raw_text,
        }
    }
}

/// One way of finding a predicted letter
pub trait PredictionExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, input: &ScoringInput<'_>) -> Option<Letter>;
}

/// Trust the structured field when it is exactly one valid letter
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredField;

impl PredictionExtractor for StructuredField {
    fn name(&self) -> &'static str {
        "structured_field"
    }

    fn extract(&self, input: &ScoringInput<'_>) -> Option<Letter> {
        input.structured.and_then(Letter::parse)
    }
}

/// Search free text for the first `Final:<LETTER>` marker
#[derive(Debug, Clone, Copy, Default)]
pub struct FinalLinePattern;

impl PredictionExtractor for FinalLinePattern {
    fn name(&self) -> &'static str {
        "final_line"
    }

    fn extract(&self, input: &ScoringInput<'_>) -> Option<Letter> {
        parse_final_letter(input.raw_text)
    }
}

/// First `Final` marker letter in `text`, uppercased
pub fn parse_final_letter(text: &str) -> Option<Letter> {
    FINAL_LINE
        .captures(text)
        .and_then(|caps| Letter::parse(&caps[1]))
}

/// Ordered extractor chain
pub struct Scorer {
    extractors: Vec<Box<dyn PredictionExtractor>>,
}

impl Scorer {
    pub fn new(extractors: Vec<Box<dyn PredictionExtractor>>) -> Self {
        Self { extractors }
    }

    /// Only the free-text pattern, for scoring fresh model output
    pub fn text_only() -> Self {
        Self::new(vec![Box::new(FinalLinePattern)])
    }

    /// First letter found, or `None` when no extractor applies
    pub fn score(&self, input: &ScoringInput<'_>) -> Option<Letter> {
        self.extractors.iter().find_map(|extractor| {
            let found = extractor.extract(input);
            if let Some(letter) = found {
                tracing::trace!(extractor = extractor.name(), %letter, "Prediction extracted");
            }
            found
        })
    }

    pub fn score_record(&self, record: &ResponseRecord) -> Option<Letter> {
        self.score(&ScoringInput::from_record(record))
    }

    pub fn extractor_names(&self) -> Vec<&'static str> {
        self.extractors.iter().map(|e| e.name()).collect()
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(vec![Box::new(StructuredField), Box::new(FinalLinePattern)])
    }
}
