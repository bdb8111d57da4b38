//! Persisted output rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::{string_or_absent, Letter};
use crate::prompts::Treatment;
use crate::providers::{CompletionResponse, Usage};

/// One model call, as appended to the outputs file.
///
/// Rows are never rewritten; reruns append new rows for the same tuple.
/// Reading is lenient so that files produced by older harness versions
/// still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub qid: u32,
    #[serde(default)]
    pub treatment: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub repeat: u32,
    /// Predicted letter as written by the harness; may hold junk in foreign files
    #[serde(default, deserialize_with = "string_or_absent")]
    pub pred: Option<String>,
    #[serde(default)]
    pub raw_text: String,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Identifies one planned call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallKey {
    pub qid: u32,
    pub treatment: Treatment,
    pub temperature: f64,
    pub repeat: u32,
}

impl ResponseRecord {
    /// Row for a successful call
    pub fn success(
        key: CallKey,
        response: CompletionResponse,
        pred: Option<Letter>,
        run_id: &str,
    ) -> Self {
        Self {
            qid: key.qid,
            treatment: Some(key.treatment.to_string()),
            temperature: Some(key.temperature),
            repeat: key.repeat,
            pred: pred.map(|p| p.to_string()),
            raw_text: response.content,
            usage: response.usage,
            model: response.model,
            error: None,
            run_id: Some(run_id.to_string()),
            created_at: Some(Utc::now()),
        }
    }

    /// Error-tagged row for a failed call
    pub fn failure(key: CallKey, model: &str, error: String, run_id: &str) -> Self {
        Self {
            qid: key.qid,
            treatment: Some(key.treatment.to_string()),
            temperature: Some(key.temperature),
            repeat: key.repeat,
            pred: None,
            raw_text: String::new(),
            usage: Usage::new(),
            model: model.to_string(),
            error: Some(error),
            run_id: Some(run_id.to_string()),
            created_at: Some(Utc::now()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
