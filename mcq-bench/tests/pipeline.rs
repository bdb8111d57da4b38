//! End-to-end: documents -> dataset -> run -> analysis, with an in-process backend

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use mcq_bench::analysis::{Aggregator, ResponseFilter, Scorer};
use mcq_bench::dataset::{
    extract_document_text, merge, parse_answer_key, parse_question_blocks, read_jsonl,
    write_answer_map, write_jsonl, Letter, QuestionRecord,
};
use mcq_bench::prompts::Treatment;
use mcq_bench::providers::{
    CompletionRequest, CompletionResponse, LLMProvider, ProviderError, ProviderResult, Usage,
};
use mcq_bench::reporting::{write_summary_csv, JsonSummary};
use mcq_bench::runner::{Harness, HarnessConfig, NoOpProgress, RateLimiter, ResponseRecord};

const QUESTIONS: &str = "AP Chemistry Practice Exam\n\
Section I\n\
1. Which element has the highest electronegativity?\n\
(A) Oxygen (B) Fluorine (C) Chlorine (D) Nitrogen\n\
2. What is the pH of pure water at 25 C?\n\
(A) 0 (B) 1 (C) 7 (D) 14\n\
3. Which gas is produced when zinc reacts with hydrochloric acid?\n\
(A) Oxygen (B) Chlorine (C) Hydrogen (D) Nitrogen (E) Helium\n\
4. Refer to the diagram on the next page.\n";

const ANSWERS: &str = "Answer Key\n1. B\n2. C\n3 C\n";

/// Answers from a lookup on the QID embedded in the prompt
struct LookupProvider {
    limiter: Arc<RateLimiter>,
    calls: Mutex<usize>,
}

impl LookupProvider {
    fn new() -> Self {
        Self {
            limiter: Arc::new(RateLimiter::unlimited()),
            calls: Mutex::new(0),
        }
    }

    fn reply_for(prompt: &str, temperature: f32) -> Option<String> {
        if prompt.contains("QID=1)") {
            Some("Fluorine is most electronegative.\nFinal:B".to_string())
        } else if prompt.contains("QID=2)") {
            // Cold runs answer correctly, hot runs drift
            if temperature < 0.5 {
                Some("Final: C".to_string())
            } else {
                Some("Final: D".to_string())
            }
        } else if prompt.contains("QID=3)") {
            Some("Hydrogen gas, I think.".to_string())
        } else {
            None
        }
    }
}

#[async_trait]
impl LLMProvider for LookupProvider {
    fn name(&self) -> &str {
        "lookup"
    }

    fn default_model(&self) -> &str {
        "lookup-1"
    }

    async fn send(&self, request: &CompletionRequest) -> ProviderResult<CompletionResponse> {
        *self.calls.lock().unwrap() += 1;

        let temperature = request.temperature.unwrap_or(1.0);
        match Self::reply_for(&request.prompt, temperature) {
            Some(content) => {
                let mut usage = Usage::new();
                usage.insert("totalTokenCount".into(), serde_json::json!(42));
                Ok(CompletionResponse {
                    content,
                    model: "lookup-1".to_string(),
                    usage,
                    finish_reason: "STOP".to_string(),
                    latency_ms: 0,
                })
            }
            None => Err(ProviderError::Api {
                status: 503,
                message: "model overloaded".to_string(),
            }),
        }
    }

    fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

fn build_dataset(dir: &TempDir) -> Vec<QuestionRecord> {
    let questions_txt = dir.path().join("questions.txt");
    let answers_txt = dir.path().join("answers.txt");
    std::fs::write(&questions_txt, QUESTIONS).unwrap();
    std::fs::write(&answers_txt, ANSWERS).unwrap();

    let blocks = parse_question_blocks(&extract_document_text(&questions_txt).unwrap());
    let answers = parse_answer_key(&extract_document_text(&answers_txt).unwrap());
    let outcome = merge(blocks, &answers);

    assert_eq!(outcome.records.len(), 4);
    assert_eq!(outcome.missing_choices, 1);
    assert_eq!(outcome.missing_answers, 1);

    let dataset = dir.path().join("data").join("dataset.jsonl");
    write_jsonl(&dataset, &outcome.records).unwrap();
    write_answer_map(dir.path().join("data").join("answers.json"), &answers).unwrap();

    read_jsonl(&dataset).unwrap()
}

#[test]
fn test_dataset_files() {
    let dir = TempDir::new().unwrap();
    let records = build_dataset(&dir);

    assert_eq!(records[0].choices[&Letter::B], "Fluorine");
    assert_eq!(records[2].choices.len(), 5);
    assert_eq!(records[2].gold, Some(Letter::C));
    assert!(records[3].choices.is_empty());
    assert_eq!(records[3].gold, None);

    let map: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("data").join("answers.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(map, serde_json::json!({"1": "B", "2": "C", "3": "C"}));

    let first_line = std::fs::read_to_string(dir.path().join("data").join("dataset.jsonl"))
        .unwrap()
        .lines()
        .next()
        .unwrap()
        .to_string();
    let row: serde_json::Value = serde_json::from_str(&first_line).unwrap();
    assert_eq!(row["A"], "Oxygen");
    assert_eq!(row["gold"], "B");
    assert!(row.get("E").is_none());
}

#[tokio::test]
async fn test_run_and_analyze() {
    let dir = TempDir::new().unwrap();
    let questions = build_dataset(&dir);
    let outputs = dir.path().join("outputs").join("run.jsonl");

    let provider = Arc::new(LookupProvider::new());
    let config = HarnessConfig {
        treatments: vec![Treatment::T0, Treatment::T3],
        temperatures: vec![0.2, 1.0],
        repeats: 1,
        ..Default::default()
    };
    let harness = Harness::new(provider.clone(), config).unwrap().with_run_id("first");
    let summary = harness
        .run_to_path(&questions, &outputs, &NoOpProgress)
        .await
        .unwrap();

    assert_eq!(summary.planned, 16);
    assert_eq!(summary.completed, 12);
    assert_eq!(summary.failed, 4);
    assert_eq!(summary.parsed, 8);
    assert_eq!(*provider.calls.lock().unwrap(), 16);

    let rows: Vec<ResponseRecord> = read_jsonl(&outputs).unwrap();
    assert_eq!(rows.len(), 16);
    let failed: Vec<_> = rows.iter().filter(|r| r.is_error()).collect();
    assert!(failed.iter().all(|r| r.qid == 4 && r.pred.is_none() && r.usage.is_empty()));
    assert_eq!(rows[0].usage["totalTokenCount"], 42);

    let report = Aggregator::default().analyze(&questions, &rows, &ResponseFilter::default());
    assert_eq!(report.total_rows, 16);
    // qid 4 has no gold
    assert_eq!(report.rows_with_gold, 12);
    assert_eq!(report.scorable_rows, 8);
    assert_eq!(report.correct_rows, 6);
    assert_eq!(report.overall_accuracy, Some(0.75));
    assert_eq!(report.missing_pred_rows, 4);

    // (T0, 0.2): q1 ok, q2 ok, q3 missing
    let cold = &report.groups[0];
    assert_eq!(cold.key.treatment.as_deref(), Some("T0"));
    assert_eq!(cold.key.temperature, Some(0.2));
    assert_eq!((cold.n, cold.accuracy, cold.missing_pred), (2, Some(1.0), 1));
    let hot = &report.groups[1];
    assert_eq!((hot.n, hot.accuracy, hot.missing_pred), (2, Some(0.5), 1));

    let csv_path = dir.path().join("outputs").join("summary.csv");
    write_summary_csv(&csv_path, &report).unwrap();
    let csv = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "treatment,temperature,n,acc,missing_pred");
    assert_eq!(lines[1], "T0,0.2,2,1,1");
    assert_eq!(lines[2], "T0,1.0,2,0.5,1");

    let json_path = dir.path().join("outputs").join("summary.json");
    JsonSummary::from_report(&report, &ResponseFilter::default())
        .write_to_file(&json_path)
        .unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(json["overall_accuracy"], 0.75);
}

#[tokio::test]
async fn test_rerun_appends_and_filters_by_run() {
    let dir = TempDir::new().unwrap();
    let questions = build_dataset(&dir);
    let outputs = dir.path().join("outputs.jsonl");

    let config = HarnessConfig {
        treatments: vec![Treatment::T1],
        temperatures: vec![1.0],
        ..Default::default()
    };

    for run_id in ["first", "second"] {
        let harness = Harness::new(Arc::new(LookupProvider::new()), config.clone())
            .unwrap()
            .with_run_id(run_id);
        harness
            .run_to_path(&questions, &outputs, &NoOpProgress)
            .await
            .unwrap();
    }

    let rows: Vec<ResponseRecord> = read_jsonl(&outputs).unwrap();
    assert_eq!(rows.len(), 8);

    let aggregator = Aggregator::new(Scorer::default(), 5);
    let all = aggregator.analyze(&questions, &rows, &ResponseFilter::default());
    assert_eq!(all.scorable_rows, 4);

    let filter = ResponseFilter {
        run_id: Some("second".into()),
        model: None,
    };
    let second = aggregator.analyze(&questions, &rows, &filter);
    assert_eq!(second.total_rows, 4);
    assert_eq!(second.scorable_rows, 2);
    assert_eq!(second.overall_accuracy, Some(0.5));
}
