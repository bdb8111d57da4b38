//! Scoring and aggregation of model outputs

pub mod aggregate;
pub mod scoring;

pub use aggregate::{
    format_temperature, AnalysisReport, Aggregator, GroupField, GroupKey, ResponseFilter,
    ScoredRow, SummaryRow,
};
pub use scoring::{
    parse_final_letter, FinalLinePattern, PredictionExtractor, Scorer, ScoringInput,
    StructuredField,
};
