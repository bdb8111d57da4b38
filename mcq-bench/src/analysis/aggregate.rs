//! Accuracy aggregation over persisted outputs

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::scoring::Scorer;
use crate::dataset::{Letter, QuestionRecord};
use crate::runner::ResponseRecord;

/// A response row joined with its gold answer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRow {
    pub qid: u32,
    pub treatment: Option<String>,
    pub temperature: Option<f64>,
    pub gold: Option<Letter>,
    pub pred: Option<Letter>,
    pub raw_text: String,
}

impl ScoredRow {
    pub fn has_gold(&self) -> bool {
        self.gold.is_some()
    }

    pub fn has_pred(&self) -> bool {
        self.pred.is_some()
    }

    /// Both gold and prediction are present
    pub fn is_scorable(&self) -> bool {
        self.has_gold() && self.has_pred()
    }

    pub fn is_correct(&self) -> bool {
        self.is_scorable() && self.gold == self.pred
    }
}

/// Column a summary can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupField {
    Treatment,
    Temperature,
}

impl GroupField {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupField::Treatment => "treatment",
            GroupField::Temperature => "temperature",
        }
    }
}

/// Render a temperature the way it was configured: `1.0`, `0.2`, `0.75`
pub fn format_temperature(temperature: f64) -> String {
    format!("{:?}", temperature)
}

/// Values of the grouping columns; unused columns stay `None`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupKey {
    pub treatment: Option<String>,
    pub temperature: Option<f64>,
}

impl GroupKey {
    fn for_row(row: &ScoredRow, fields: &[GroupField]) -> Self {
        Self {
            treatment: fields
                .contains(&GroupField::Treatment)
                .then(|| row.treatment.clone())
                .flatten(),
            temperature: fields
                .contains(&GroupField::Temperature)
                .then_some(row.temperature)
                .flatten(),
        }
    }

    /// Render the value of one grouping column
    pub fn value(&self, field: GroupField) -> String {
        match field {
            GroupField::Treatment => self.treatment.clone().unwrap_or_default(),
            GroupField::Temperature => self
                .temperature
                .map(format_temperature)
                .unwrap_or_default(),
        }
    }
}

impl Eq for GroupKey {}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.treatment.cmp(&other.treatment).then_with(|| {
            match (self.temperature, other.temperature) {
                (Some(a), Some(b)) => a.total_cmp(&b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            }
        })
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Accuracy for one group
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub key: GroupKey,
    /// Scorable rows in the group
    pub n: usize,
    /// `None` when the group has no scorable rows
    pub accuracy: Option<f64>,
    /// Rows with gold but no parsable prediction
    pub missing_pred: usize,
}

/// Restricts which output rows are analyzed
#[derive(Debug, Clone, Default)]
pub struct ResponseFilter {
    pub run_id: Option<String>,
    pub model: Option<String>,
}

impl ResponseFilter {
    pub fn matches(&self, record: &ResponseRecord) -> bool {
        let run_ok = self
            .run_id
            .as_ref()
            .map_or(true, |id| record.run_id.as_ref() == Some(id));
        let model_ok = self.model.as_ref().map_or(true, |m| &record.model == m);
        run_ok && model_ok
    }

    pub fn is_empty(&self) -> bool {
        self.run_id.is_none() && self.model.is_none()
    }
}

/// Everything one analysis pass computes
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub total_rows: usize,
    pub rows_with_gold: usize,
    pub rows_with_pred: usize,
    pub scorable_rows: usize,
    pub correct_rows: usize,
    /// Accuracy over scorable rows; `None` when nothing is scorable
    pub overall_accuracy: Option<f64>,
    pub group_by: Vec<GroupField>,
    pub groups: Vec<SummaryRow>,
    /// Rows with gold but no prediction
    pub missing_pred_rows: usize,
    /// First few such rows, for manual inspection
    pub missing_pred_examples: Vec<ScoredRow>,
}

/// Joins predictions with gold answers and computes accuracy
pub struct Aggregator {
    scorer: Scorer,
    max_examples: usize,
}

impl Aggregator {
    pub fn new(scorer: Scorer, max_examples: usize) -> Self {
        Self {
            scorer,
            max_examples,
        }
    }

    /// Score every response against the gold answers of `questions`
    pub fn score_rows(
        &self,
        questions: &[QuestionRecord],
        responses: &[ResponseRecord],
        filter: &ResponseFilter,
    ) -> Vec<ScoredRow> {
        let mut gold: HashMap<u32, Option<Letter>> = HashMap::new();
        for q in questions {
            gold.entry(q.qid).or_insert(q.gold);
        }

        responses
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| ScoredRow {
                qid: r.qid,
                treatment: r.treatment.clone(),
                temperature: r.temperature,
                gold: gold.get(&r.qid).copied().flatten(),
                pred: self.scorer.score_record(r),
                raw_text: r.raw_text.clone(),
            })
            .collect()
    }

    pub fn analyze(
        &self,
        questions: &[QuestionRecord],
        responses: &[ResponseRecord],
        filter: &ResponseFilter,
    ) -> AnalysisReport {
        let rows = self.score_rows(questions, responses, filter);
        self.summarize(&rows)
    }

    /// Build the report from already scored rows
    pub fn summarize(&self, rows: &[ScoredRow]) -> AnalysisReport {
        let scorable_rows = rows.iter().filter(|r| r.is_scorable()).count();
        let correct_rows = rows.iter().filter(|r| r.is_correct()).count();

        let mut group_by = Vec::new();
        if rows.iter().any(|r| r.treatment.is_some()) {
            group_by.push(GroupField::Treatment);
        }
        if rows.iter().any(|r| r.temperature.is_some()) {
            group_by.push(GroupField::Temperature);
        }

        let groups = if group_by.is_empty() {
            Vec::new()
        } else {
            group_rows(rows, &group_by)
        };

        let missing: Vec<&ScoredRow> = rows
            .iter()
            .filter(|r| r.has_gold() && !r.has_pred())
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                "{} rows had gold but no parsable final letter",
                missing.len()
            );
        }

        AnalysisReport {
            total_rows: rows.len(),
            rows_with_gold: rows.iter().filter(|r| r.has_gold()).count(),
            rows_with_pred: rows.iter().filter(|r| r.has_pred()).count(),
            scorable_rows,
            correct_rows,
            overall_accuracy: ratio(correct_rows, scorable_rows),
            group_by,
            groups,
            missing_pred_rows: missing.len(),
            missing_pred_examples: missing
                .into_iter()
                .take(self.max_examples)
                .cloned()
                .collect(),
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(Scorer::default(), 5)
    }
}

#[derive(Default)]
struct GroupTally {
    n: usize,
    correct: usize,
    missing_pred: usize,
}

/// Group rows that have gold, sorted by key
fn group_rows(rows: &[ScoredRow], fields: &[GroupField]) -> Vec<SummaryRow> {
    let mut tallies: BTreeMap<GroupKey, GroupTally> = BTreeMap::new();

    for row in rows.iter().filter(|r| r.has_gold()) {
        let tally = tallies.entry(GroupKey::for_row(row, fields)).or_default();
        if row.has_pred() {
            tally.n += 1;
            if row.is_correct() {
                tally.correct += 1;
            }
        } else {
            tally.missing_pred += 1;
        }
    }

    tallies
        .into_iter()
        .map(|(key, t)| SummaryRow {
            key,
            n: t.n,
            accuracy: ratio(t.correct, t.n),
            missing_pred: t.missing_pred,
        })
        .collect()
}

fn ratio(num: usize, den: usize) -> Option<f64> {
    (den > 0).then(|| num as f64 / den as f64)
}
