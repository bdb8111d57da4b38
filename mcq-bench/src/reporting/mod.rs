//! Results reporting

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use crate::analysis::{format_temperature, AnalysisReport, GroupField, ResponseFilter};

/// Errors while exporting results
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;

fn format_accuracy(acc: Option<f64>) -> String {
    acc.map(|a| a.to_string()).unwrap_or_default()
}

/// Write the grouped table as CSV: `<group keys>, n, acc, missing_pred`
pub fn write_summary<W: Write>(writer: W, report: &AnalysisReport) -> ReportResult<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = report.group_by.iter().map(GroupField::as_str).collect();
    header.extend(["n", "acc", "missing_pred"]);
    wtr.write_record(&header)?;

    for group in &report.groups {
        let mut record: Vec<String> = report
            .group_by
            .iter()
            .map(|&field| group.key.value(field))
            .collect();
        record.push(group.n.to_string());
        record.push(format_accuracy(group.accuracy));
        record.push(group.missing_pred.to_string());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write the grouped table to a CSV file, creating parent directories
pub fn write_summary_csv(path: impl AsRef<Path>, report: &AnalysisReport) -> ReportResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_summary(file, report)?;
    tracing::info!("Saved summary to {}", path.display());
    Ok(())
}

/// JSON summary export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSummary {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub total_rows: usize,
    pub rows_with_gold: usize,
    pub rows_with_pred: usize,
    pub scorable_rows: usize,
    pub overall_accuracy: Option<f64>,
    pub missing_pred_rows: usize,
    pub groups: Vec<GroupSummary>,
}

/// One row of the grouped table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub n: usize,
    pub acc: Option<f64>,
    pub missing_pred: usize,
}

impl JsonSummary {
    pub fn from_report(report: &AnalysisReport, filter: &ResponseFilter) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            run_id: filter.run_id.clone(),
            model: filter.model.clone(),
            total_rows: report.total_rows,
            rows_with_gold: report.rows_with_gold,
            rows_with_pred: report.rows_with_pred,
            scorable_rows: report.scorable_rows,
            overall_accuracy: report.overall_accuracy,
            missing_pred_rows: report.missing_pred_rows,
            groups: report
                .groups
                .iter()
                .map(|g| GroupSummary {
                    treatment: g.key.treatment.clone(),
                    temperature: g.key.temperature,
                    n: g.n,
                    acc: g.accuracy,
                    missing_pred: g.missing_pred,
                })
                .collect(),
        }
    }

    /// Write to JSON file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> ReportResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Generate a console report
pub fn print_console_report(report: &AnalysisReport) {
    println!("\n=== Accuracy Report ===\n");
    println!("Total rows: {}", report.total_rows);
    println!("Rows with gold: {}", report.rows_with_gold);
    println!("Rows with pred: {}", report.rows_with_pred);
    println!("Scorable rows: {}", report.scorable_rows);
    match report.overall_accuracy {
        Some(acc) => println!(
            "Overall accuracy: {:.3} ({}/{})",
            acc, report.correct_rows, report.scorable_rows
        ),
        None => println!("Overall accuracy: n/a (no scorable rows)"),
    }

    if !report.groups.is_empty() {
        println!("\nAccuracy by group:");
        println!("{:-<50}", "");

        let header: Vec<&str> = report.group_by.iter().map(GroupField::as_str).collect();
        println!(
            "  {:<24} {:>5} {:>7} {:>12}",
            header.join(" / "),
            "n",
            "acc",
            "missing_pred"
        );
        for group in &report.groups {
            let key: Vec<String> = report
                .group_by
                .iter()
                .map(|&field| group.key.value(field))
                .collect();
            let acc = group
                .accuracy
                .map(|a| format!("{:.3}", a))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "  {:<24} {:>5} {:>7} {:>12}",
                key.join(" / "),
                group.n,
                acc,
                group.missing_pred
            );
        }
    }

    if !report.missing_pred_examples.is_empty() {
        println!(
            "\nWARNING: {} rows had gold but no parsable Final letter. Examples:",
            report.missing_pred_rows
        );
        for row in &report.missing_pred_examples {
            println!(
                "  qid={} treatment={} temp={} gold={}: {}",
                row.qid,
                row.treatment.as_deref().unwrap_or("-"),
                row.temperature
                    .map(format_temperature)
                    .unwrap_or_else(|| "-".to_string()),
                row.gold.map(|g| g.to_string()).unwrap_or_default(),
                preview(&row.raw_text, 120)
            );
        }
    }

    println!("\n{:=<50}", "");
}
