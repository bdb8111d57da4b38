//! Exam dataset construction and storage
//!
//! Turns a question document and an answer-key document into an ordered
//! sequence of [`QuestionRecord`]s, persisted as newline-delimited JSON.

pub mod answers;
pub mod merge;
pub mod normalize;
pub mod pdf;
pub mod questions;
pub mod store;

pub use answers::{parse_answer_key, AnswerKey};
pub use merge::{merge, MergeOutcome};
pub use normalize::normalize;
pub use pdf::{extract_document_text, extract_pdf_text};
pub use questions::{parse_question_blocks, BlockParser, QuestionBlock, RegexBlockParser};
pub use store::{read_jsonl, write_answer_map, write_jsonl, JsonlWriter};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Error type for dataset building and storage
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing input document: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: String, message: String },

    #[error("Invalid JSON on line {line} of {path}: {source}")]
    Json {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type DatasetResult<T> = Result<T, DatasetError>;

/// An answer letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Letter {
    A,
    B,
    C,
    D,
    E,
}

impl Letter {
    /// All letters in canonical order
    pub const ALL: [Letter; 5] = [Letter::A, Letter::B, Letter::C, Letter::D, Letter::E];

    pub fn as_str(&self) -> &'static str {
        match self {
            Letter::A => "A",
            Letter::B => "B",
            Letter::C => "C",
            Letter::D => "D",
            Letter::E => "E",
        }
    }

    /// Parse a single letter, ignoring case and surrounding whitespace.
    ///
    /// Anything other than exactly one of A-E yields `None`.
    pub fn parse(s: &str) -> Option<Letter> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Some(Letter::A),
            "B" => Some(Letter::B),
            "C" => Some(Letter::C),
            "D" => Some(Letter::D),
            "E" => Some(Letter::E),
            _ => None,
        }
    }
}

impl std::fmt::Display for Letter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Letter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Letter::parse(s).ok_or_else(|| format!("Not an answer letter: {}", s))
    }
}

/// A single exam question with its choices and gold answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "QuestionRow", from = "QuestionRow")]
pub struct QuestionRecord {
    pub qid: u32,
    pub stem: String,
    /// Choice texts keyed by letter; iteration order is always A to E
    pub choices: BTreeMap<Letter, String>,
    pub gold: Option<Letter>,
}

impl QuestionRecord {
    pub fn new(qid: u32, stem: impl Into<String>) -> Self {
        Self {
            qid,
            stem: stem.into(),
            choices: BTreeMap::new(),
            gold: None,
        }
    }

    pub fn with_choice(mut self, letter: Letter, text: impl Into<String>) -> Self {
        self.choices.insert(letter, text.into());
        self
    }

    pub fn with_gold(mut self, gold: Letter) -> Self {
        self.gold = Some(gold);
        self
    }

    /// Letters that have a choice text, in A to E order
    pub fn letters(&self) -> Vec<Letter> {
        self.choices.keys().copied().collect()
    }

    /// Whether the record has enough choices to be asked
    pub fn is_scorable(&self) -> bool {
        self.choices.len() >= 2
    }
}

/// Persisted shape: `qid, stem, A..E, gold`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QuestionRow {
    qid: u32,
    #[serde(default)]
    stem: String,
    #[serde(rename = "A", default, skip_serializing_if = "Option::is_none")]
    a: Option<String>,
    #[serde(rename = "B", default, skip_serializing_if = "Option::is_none")]
    b: Option<String>,
    #[serde(rename = "C", default, skip_serializing_if = "Option::is_none")]
    c: Option<String>,
    #[serde(rename = "D", default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
    #[serde(rename = "E", default, skip_serializing_if = "Option::is_none")]
    e: Option<String>,
    /// Kept as raw text so that stray values read back as "unknown"
    #[serde(default, deserialize_with = "string_or_absent")]
    gold: Option<String>,
}

/// Read a JSON string as-is; any other value (number, bool, array, null) reads as `None`
pub(crate) fn string_or_absent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        _ => Ok(None),
    }
}

impl From<QuestionRecord> for QuestionRow {
    fn from(mut record: QuestionRecord) -> Self {
        Self {
            qid: record.qid,
            stem: record.stem,
            a: record.choices.remove(&Letter::A),
            b: record.choices.remove(&Letter::B),
            c: record.choices.remove(&Letter::C),
            d: record.choices.remove(&Letter::D),
            e: record.choices.remove(&Letter::E),
            gold: record.gold.map(|g| g.as_str().to_string()),
        }
    }
}

impl From<QuestionRow> for QuestionRecord {
    fn from(row: QuestionRow) -> Self {
        let choices = Letter::ALL
            .into_iter()
            .zip([row.a, row.b, row.c, row.d, row.e])
            .filter_map(|(letter, text)| text.map(|t| (letter, t)))
            .collect();

        Self {
            qid: row.qid,
            stem: row.stem,
            choices,
            gold: row.gold.as_deref().and_then(Letter::parse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_parse_is_case_insensitive() {
        assert_eq!(Letter::parse("b"), Some(Letter::B));
        assert_eq!(Letter::parse(" E "), Some(Letter::E));
        assert_eq!(Letter::parse("F"), None);
        assert_eq!(Letter::parse("AB"), None);
        assert_eq!(Letter::parse(""), None);
    }

    #[test]
    fn test_question_record_roundtrip() {
        let record = QuestionRecord::new(7, "Which gas is a noble gas?")
            .with_choice(Letter::A, "Nitrogen")
            .with_choice(Letter::B, "Argon")
            .with_choice(Letter::C, "Oxygen")
            .with_gold(Letter::B);

        let line = serde_json::to_string(&record).unwrap();
        let back: QuestionRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_question_record_wire_shape() {
        let record = QuestionRecord::new(3, "Stem").with_choice(Letter::D, "four");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["qid"], 3);
        assert_eq!(value["D"], "four");
        assert!(value.get("A").is_none());
        assert!(value["gold"].is_null());
    }

    #[test]
    fn test_invalid_gold_reads_as_unknown() {
        let record: QuestionRecord =
            serde_json::from_str(r#"{"qid": 1, "stem": "s", "A": "x", "gold": "Z"}"#).unwrap();
        assert_eq!(record.gold, None);

        let record: QuestionRecord =
            serde_json::from_str(r#"{"qid": 1, "stem": "s", "A": "x", "gold": "c"}"#).unwrap();
        assert_eq!(record.gold, Some(Letter::C));
    }

    #[test]
    fn test_non_string_gold_reads_as_unknown() {
        for gold in ["1", "0", "false", "[\"A\"]", "{\"letter\": \"A\"}", "null"] {
            let line = format!(r#"{{"qid": 1, "stem": "s", "A": "x", "B": "y", "gold": {}}}"#, gold);
            let record: QuestionRecord = serde_json::from_str(&line).unwrap();
            assert_eq!(record.gold, None, "gold={gold}");
            assert_eq!(record.choices.len(), 2);
        }
    }

    #[test]
    fn test_letters_follow_canonical_order() {
        let record = QuestionRecord::new(1, "s")
            .with_choice(Letter::C, "c")
            .with_choice(Letter::A, "a");
        assert_eq!(record.letters(), vec![Letter::A, Letter::C]);
        assert!(record.is_scorable());
    }
}
