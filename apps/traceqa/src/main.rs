mod cli;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{CaptureArgs, Cli, CliCommand, EvaluateArgs, ExtractArgs, MatchArgs};
use output::{clip, format_accuracy, format_ms, CliOutput};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use traceqa_config::AppConfig;
use traceqa_core::artifacts::{read_capture, read_optional_text, read_qa_map, write_json};
use traceqa_core::{
    correlate_warnings, evaluate, overview, qa_pairs, reconstruct, resolve_expected,
    EvaluateOptions, EvaluationReport, FailurePolicy, FaqMatch, FaqMatcher, Overview, Transaction,
    WarningRecord,
};
use traceqa_matcher::HttpMatcher;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractSnapshot {
    transactions: usize,
    completed: usize,
    qa_pairs: usize,
    transactions_path: PathBuf,
    qa_pairs_path: PathBuf,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateSnapshot {
    evaluation_path: PathBuf,
    #[serde(flatten)]
    report: EvaluationReport,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_cfg(raw_config: Option<PathBuf>) -> Result<AppConfig> {
    let (path, cfg) = traceqa_config::load_or_default(raw_config.clone()).with_context(|| {
        format!(
            "failed to load config {}",
            raw_config
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<resolved>".to_string())
        )
    })?;
    match path {
        Some(path) => info!("using config {}", path.display()),
        None => info!("no config file found; using defaults"),
    }
    Ok(cfg)
}

fn out_dir_or(cfg: &AppConfig, out_dir: Option<PathBuf>) -> AppConfig {
    let mut cfg = cfg.clone();
    if let Some(dir) = out_dir {
        cfg.output.dir = traceqa_config::expand_path(&dir.to_string_lossy());
    }
    cfg
}

fn load_transactions(capture: &Path) -> Result<(Vec<traceqa_core::LogEntry>, Vec<Transaction>)> {
    let entries = read_capture(capture)?;
    let transactions = reconstruct(&entries);
    Ok((entries, transactions))
}

fn build_matcher(cfg: &AppConfig, faq: Option<PathBuf>) -> Result<FaqMatcher<HttpMatcher>> {
    let faq_path = faq.unwrap_or_else(|| PathBuf::from(&cfg.evaluation.faq_path));
    let faqs = read_qa_map(&faq_path)
        .with_context(|| format!("failed to load FAQ corpus {}", faq_path.display()))?;
    info!("loaded {} reference FAQs from {}", faqs.len(), faq_path.display());
    let client = HttpMatcher::new(cfg.matcher.clone())?;
    Ok(FaqMatcher::new(client, faqs)?)
}

fn cmd_extract(cfg: &AppConfig, args: ExtractArgs) -> Result<ExtractSnapshot> {
    let cfg = out_dir_or(cfg, args.out_dir);
    let (_, transactions) = load_transactions(&args.capture)?;
    let pairs = qa_pairs(&transactions);

    let transactions_path = cfg.output.transactions_path();
    let qa_pairs_path = cfg.output.qa_pairs_path();
    write_json(&transactions_path, &transactions)?;
    write_json(&qa_pairs_path, &pairs)?;

    Ok(ExtractSnapshot {
        transactions: transactions.len(),
        completed: transactions.iter().filter(|tx| tx.completed).count(),
        qa_pairs: pairs.len(),
        transactions_path,
        qa_pairs_path,
    })
}

fn cmd_stats(args: CaptureArgs) -> Result<Overview> {
    let (entries, transactions) = load_transactions(&args.capture)?;
    Ok(overview(&entries, &transactions))
}

fn cmd_warnings(args: CaptureArgs) -> Result<Vec<WarningRecord>> {
    let entries = read_capture(&args.capture)?;
    Ok(correlate_warnings(&entries))
}

async fn cmd_evaluate(cfg: &AppConfig, args: EvaluateArgs) -> Result<EvaluateSnapshot> {
    let cfg = out_dir_or(cfg, args.out_dir);
    let on_error = FailurePolicy::parse(&cfg.evaluation.on_match_error)?;
    let matcher = build_matcher(&cfg, args.faq)?;

    let override_path = args
        .expected
        .or_else(|| cfg.evaluation.expected_override_path());
    let override_raw = read_optional_text(override_path.as_deref())?;
    // Without an override the reference corpus doubles as the expected map.
    let expected = resolve_expected(matcher.faqs(), override_raw.as_deref())?;

    let (_, transactions) = load_transactions(&args.capture)?;
    let options = EvaluateOptions {
        timeout: Duration::from_secs_f64(cfg.matcher.timeout_seconds),
        on_error,
    };
    let report = evaluate(&transactions, &expected, &matcher, &options).await?;

    let evaluation_path = cfg.output.evaluation_path();
    write_json(&evaluation_path, &report)?;
    Ok(EvaluateSnapshot {
        evaluation_path,
        report,
    })
}

async fn cmd_match(cfg: &AppConfig, args: MatchArgs) -> Result<FaqMatch> {
    let matcher = build_matcher(cfg, args.faq)?;
    Ok(matcher.match_query(&args.query).await?)
}

fn render_extract(output: &CliOutput, snapshot: &ExtractSnapshot) -> Result<()> {
    if output.is_json() {
        return output.json(snapshot);
    }
    output.section(
        "Extract",
        &[
            format!(
                "transactions: {} ({} completed)",
                snapshot.transactions, snapshot.completed
            ),
            format!("clean QA pairs: {}", snapshot.qa_pairs),
            format!("wrote: {}", snapshot.transactions_path.display()),
            format!("wrote: {}", snapshot.qa_pairs_path.display()),
        ],
    );
    Ok(())
}

fn render_stats(output: &CliOutput, report: &Overview) -> Result<()> {
    if output.is_json() {
        return output.json(report);
    }

    let rt = &report.response_time_ms;
    let outliers = if rt.outliers.is_empty() {
        "none".to_string()
    } else {
        rt.outliers
            .iter()
            .map(|v| format!("{v:.2}"))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut lines = vec![
        format!("entries: {}", report.entry_count),
        format!(
            "transactions: {} ({} completed)",
            report.transaction_count, report.completed_count
        ),
        format!("user queries: {}", report.user_query_count),
        format!("response time mean: {}", format_ms(rt.mean)),
        format!("response time median: {}", format_ms(rt.median)),
        format!("response time outliers: {outliers}"),
        format!("warnings: {}", report.warning_count),
    ];
    if let Some(mean_us) = report.mean_span_duration_us {
        lines.push(format!("mean span duration: {mean_us:.0} µs"));
    }
    output.section("Overview", &lines);

    if !report.steps.is_empty() {
        let rows = report
            .steps
            .iter()
            .map(|step| {
                vec![
                    step.label.clone(),
                    step.durations_ms.len().to_string(),
                    format_ms(step.mean),
                    format_ms(step.median),
                    step.outliers.len().to_string(),
                ]
            })
            .collect::<Vec<_>>();
        output.table(
            "Steps",
            &["step", "samples", "mean", "median", "outliers"],
            &rows,
        );
    }

    if output.verbose && !report.status_codes.is_empty() {
        let rows = report
            .status_codes
            .iter()
            .map(|(code, count)| vec![code.clone(), count.to_string()])
            .collect::<Vec<_>>();
        output.table("Status Codes", &["status", "count"], &rows);
    }
    Ok(())
}

fn render_warnings(output: &CliOutput, records: &[WarningRecord]) -> Result<()> {
    if output.is_json() {
        return output.json(records);
    }
    if records.is_empty() {
        output.section("Warnings", &["none".to_string()]);
        return Ok(());
    }
    let rows = records
        .iter()
        .map(|record| {
            vec![
                record.trace_id.clone().unwrap_or_else(|| "-".to_string()),
                record
                    .question
                    .as_deref()
                    .map(|q| clip(q, 60))
                    .unwrap_or_else(|| "-".to_string()),
                record
                    .message
                    .as_deref()
                    .map(|m| clip(m, 60))
                    .unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    output.table(
        &format!("Warnings ({})", records.len()),
        &["trace", "question", "message"],
        &rows,
    );
    Ok(())
}

fn render_evaluate(output: &CliOutput, snapshot: &EvaluateSnapshot) -> Result<()> {
    if output.is_json() {
        return output.json(snapshot);
    }
    let report = &snapshot.report;
    let rows = report
        .results
        .iter()
        .map(|result| {
            vec![
                clip(&result.query, 40),
                clip(&result.expected, 40),
                clip(result.actual.as_deref().unwrap_or("-"), 40),
                clip(&result.matched, 40),
                format!("{:.2}", result.similarity),
                if result.correct { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    output.table(
        "Matches",
        &["query", "expected", "actual", "matched", "score", "correct"],
        &rows,
    );

    let mut lines = vec![
        format!("accuracy: {}", format_accuracy(report.accuracy)),
        format!("correct: {}/{}", report.correct_count, report.results.len()),
        format!("wrote: {}", snapshot.evaluation_path.display()),
    ];
    if !report.failures.is_empty() {
        lines.push(format!("failed matches: {}", report.failures.len()));
        if output.verbose {
            for failure in &report.failures {
                lines.push(format!("  {}: {}", clip(&failure.query, 40), failure.error));
            }
        }
    }
    output.section("Evaluation", &lines);
    Ok(())
}

fn render_match(output: &CliOutput, faq: &FaqMatch) -> Result<()> {
    if output.is_json() {
        return output.json(faq);
    }
    output.section(
        "Match",
        &[
            format!("question: {}", faq.question),
            format!("score: {:.3}", faq.similarity),
            format!("answer: {}", faq.answer),
        ],
    );
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let output = CliOutput::from_cli(&cli);
    let cfg = load_cfg(cli.config.clone())?;

    match cli.command {
        CliCommand::Extract(args) => render_extract(&output, &cmd_extract(&cfg, args)?),
        CliCommand::Stats(args) => render_stats(&output, &cmd_stats(args)?),
        CliCommand::Warnings(args) => render_warnings(&output, &cmd_warnings(args)?),
        CliCommand::Evaluate(args) => render_evaluate(&output, &cmd_evaluate(&cfg, args).await?),
        CliCommand::Match(args) => render_match(&output, &cmd_match(&cfg, args).await?),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
