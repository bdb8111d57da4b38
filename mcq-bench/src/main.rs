//! Multiple-choice benchmark CLI

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mcq_bench::{
    analysis::{Aggregator, ResponseFilter, Scorer},
    config::Config,
    dataset::{
        extract_document_text, merge, normalize, parse_answer_key, parse_question_blocks,
        read_jsonl, write_answer_map, write_jsonl, DatasetError, QuestionRecord,
    },
    prompts::{build_prompt, Treatment},
    providers::{create_provider, Backend, ProviderOverrides},
    reporting::{print_console_report, write_summary_csv, JsonSummary},
    runner::{ConsoleProgress, Harness, HarnessConfig, ResponseRecord},
};

#[derive(Parser)]
#[command(name = "mcq-bench")]
#[command(about = "Prompting-treatment benchmark for multiple-choice exams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the question dataset from the exam and answer-key documents
    BuildDataset {
        /// Questions document (.pdf, or .txt with extracted text)
        #[arg(long)]
        questions: Option<PathBuf>,

        /// Answer-key document (.pdf or .txt)
        #[arg(long)]
        answers: Option<PathBuf>,

        /// Output JSONL path
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output answer map JSON path
        #[arg(long)]
        answer_map: Option<PathBuf>,
    },

    /// Run every question under each treatment and temperature
    Run {
        /// Backend: gemini, openai or local
        #[arg(short, long)]
        backend: Option<String>,

        /// Model identifier (default: the backend's configured model)
        #[arg(short, long)]
        model: Option<String>,

        /// Question dataset (JSONL)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Outputs file (JSONL, appended)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Treatments to run
        #[arg(long, num_args = 1..)]
        treatments: Option<Vec<String>>,

        /// Sampling temperatures
        #[arg(long, num_args = 1..)]
        temps: Option<Vec<f64>>,

        /// Repeats per (question, treatment, temperature)
        #[arg(long)]
        repeats: Option<u32>,

        /// Output token cap per call
        #[arg(long)]
        max_output_tokens: Option<u32>,

        /// Requests per minute ceiling (0 disables pacing)
        #[arg(long)]
        rpm_limit: Option<u32>,

        /// Per-call timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Score persisted outputs against the gold answers
    Analyze {
        /// Question dataset (JSONL)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Outputs file (JSONL)
        #[arg(short, long)]
        outputs: Option<PathBuf>,

        /// Grouped summary CSV path
        #[arg(long)]
        summary_csv: Option<PathBuf>,

        /// Also write a JSON summary
        #[arg(long)]
        summary_json: Option<PathBuf>,

        /// Only rows from this run
        #[arg(long)]
        run_id: Option<String>,

        /// Only rows produced by this model
        #[arg(long)]
        model: Option<String>,
    },

    /// Render every (question, treatment) prompt to text files for review
    DumpPrompts {
        /// Question dataset (JSONL)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Output directory for prompt files
        #[arg(short, long, default_value = "outputs/prompts")]
        output: PathBuf,

        /// Treatments to render (default: all)
        #[arg(long, num_args = 1..)]
        treatments: Option<Vec<String>>,
    },

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/bench.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("mcq_bench=debug,info")
    } else {
        EnvFilter::new("mcq_bench=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load_or_default(),
    };

    match cli.command {
        Commands::BuildDataset {
            questions,
            answers,
            out,
            answer_map,
        } => {
            let questions = questions.unwrap_or_else(|| config.dataset.questions_pdf.clone());
            let answers = answers.unwrap_or_else(|| config.dataset.answers_pdf.clone());
            let out = out.unwrap_or_else(|| config.dataset.output.clone());
            let answer_map = answer_map.unwrap_or_else(|| config.dataset.answer_map.clone());
            build_dataset(&questions, &answers, &out, &answer_map)?;
        }

        Commands::Run {
            backend,
            model,
            data,
            out,
            treatments,
            temps,
            repeats,
            max_output_tokens,
            rpm_limit,
            timeout_ms,
        } => {
            let run = &config.run;
            let treatments = treatments.unwrap_or_else(|| run.treatments.clone());
            let harness_config = HarnessConfig {
                temperatures: temps.unwrap_or_else(|| run.temperatures.clone()),
                repeats: repeats.unwrap_or(run.repeats),
                max_output_tokens: max_output_tokens.unwrap_or(run.max_output_tokens),
                timeout_ms: timeout_ms.unwrap_or(run.timeout_ms),
                model: model.or_else(|| run.model.clone()),
                ..Default::default()
            }
            .with_treatment_names(treatments.as_slice())?;

            let backend: Backend = backend.as_deref().unwrap_or(&run.backend).parse()?;
            let data = data.unwrap_or_else(|| run.data.clone());
            let out = out.unwrap_or_else(|| run.out.clone());
            let overrides = ProviderOverrides {
                model: harness_config.model.clone(),
                rpm: rpm_limit.or(run.rpm_limit),
            };

            run_benchmark(&config, backend, overrides, harness_config, &data, &out).await?;
        }

        Commands::Analyze {
            data,
            outputs,
            summary_csv,
            summary_json,
            run_id,
            model,
        } => {
            let data = data.unwrap_or_else(|| config.run.data.clone());
            let outputs = outputs.unwrap_or_else(|| config.run.out.clone());
            let summary_csv = summary_csv.unwrap_or_else(|| config.analysis.summary_csv.clone());
            let filter = ResponseFilter { run_id, model };
            analyze(
                &config,
                &data,
                &outputs,
                &summary_csv,
                summary_json.as_deref(),
                &filter,
            )?;
        }

        Commands::DumpPrompts {
            data,
            output,
            treatments,
        } => {
            let treatments = match treatments {
                Some(names) => Treatment::parse_list(names.as_slice())?,
                None => Treatment::all(),
            };
            let data = data.unwrap_or_else(|| config.run.data.clone());
            dump_prompts(&data, &output, &treatments)?;
        }

        Commands::InitConfig { output } => {
            init_config(&output)?;
        }
    }

    Ok(())
}

fn build_dataset(
    questions_path: &Path,
    answers_path: &Path,
    out: &Path,
    answer_map: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    for input in [questions_path, answers_path] {
        if !input.exists() {
            return Err(DatasetError::MissingInput(input.to_path_buf()).into());
        }
    }

    println!("=== Building Dataset ===");
    println!("Questions: {}", questions_path.display());
    println!("Answers:   {}", answers_path.display());
    println!();

    let question_text = normalize(&extract_document_text(questions_path)?);
    let answer_text = normalize(&extract_document_text(answers_path)?);

    let blocks = parse_question_blocks(&question_text);
    let answers = parse_answer_key(&answer_text);
    let outcome = merge(blocks, &answers);

    write_jsonl(out, &outcome.records)?;
    write_answer_map(answer_map, &answers)?;

    println!("Parsed questions:     {}", outcome.records.len());
    println!("Answer key entries:   {}", answers.len());
    println!("Missing choices:      {}", outcome.missing_choices);
    println!("Missing answers:      {}", outcome.missing_answers);
    if outcome.duplicate_questions > 0 {
        println!("Duplicate questions:  {}", outcome.duplicate_questions);
    }
    println!();
    println!("Dataset written to:    {}", out.display());
    println!("Answer map written to: {}", answer_map.display());
    Ok(())
}

async fn run_benchmark(
    config: &Config,
    backend: Backend,
    overrides: ProviderOverrides,
    harness_config: HarnessConfig,
    data: &Path,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let questions: Vec<QuestionRecord> = read_jsonl(data)?;
    if questions.is_empty() {
        eprintln!("Warning: {} contains no questions", data.display());
    }

    let provider = create_provider(backend, config, &overrides)?;
    let harness = Harness::new(provider.clone(), harness_config)?;

    let treatments: Vec<&str> = harness.config().treatments.iter().map(|t| t.as_str()).collect();
    println!("=== Multiple-Choice Benchmark ===");
    println!("Run ID:     {}", harness.run_id());
    println!(
        "Backend:    {} | Model: {}",
        provider.name(),
        harness.config().model.as_deref().unwrap_or(provider.default_model())
    );
    println!("Questions:  {}", questions.len());
    println!("Treatments: {}", treatments.join(", "));
    println!("Temps:      {:?}", harness.config().temperatures);
    println!("Planned:    {} calls", harness.config().planned_calls(questions.len()));
    println!();

    let summary = harness.run_to_path(&questions, out, &ConsoleProgress).await?;

    println!();
    println!(
        "Completed: {} ok, {} failed, {} with a Final letter",
        summary.completed, summary.failed, summary.parsed
    );
    println!("Outputs appended to: {}", out.display());
    Ok(())
}

fn analyze(
    config: &Config,
    data: &Path,
    outputs: &Path,
    summary_csv: &Path,
    summary_json: Option<&Path>,
    filter: &ResponseFilter,
) -> Result<(), Box<dyn std::error::Error>> {
    let questions: Vec<QuestionRecord> = read_jsonl(data)?;
    let responses: Vec<ResponseRecord> = read_jsonl(outputs)?;

    if !filter.is_empty() {
        tracing::info!(
            "Filtering outputs by run_id={:?} model={:?}",
            filter.run_id,
            filter.model
        );
    }

    let aggregator = Aggregator::new(Scorer::default(), config.analysis.max_examples);
    let report = aggregator.analyze(&questions, &responses, filter);

    print_console_report(&report);
    write_summary_csv(summary_csv, &report)?;
    println!("Saved summary: {}", summary_csv.display());

    if let Some(path) = summary_json {
        JsonSummary::from_report(&report, filter).write_to_file(path)?;
        println!("Saved JSON summary: {}", path.display());
    }
    Ok(())
}

fn dump_prompts(
    data: &Path,
    output_dir: &Path,
    treatments: &[Treatment],
) -> Result<(), Box<dyn std::error::Error>> {
    let questions: Vec<QuestionRecord> = read_jsonl(data)?;

    std::fs::create_dir_all(output_dir)?;

    println!("=== Dumping Prompts ===");
    println!("Questions: {}", questions.len());
    println!("Output:    {}", output_dir.display());
    println!();

    let mut written = 0;
    for question in &questions {
        for &treatment in treatments {
            let filename = format!("q{:03}-{}.txt", question.qid, treatment.as_str().to_lowercase());
            std::fs::write(output_dir.join(filename), build_prompt(treatment, question))?;
            written += 1;
        }
    }

    println!("Wrote {} prompt files", written);
    Ok(())
}

fn init_config(output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    Config::default().save_toml(output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
