use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Auto,
    Plain,
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "traceqa",
    about = "Rebuild question/answer transactions from agent telemetry and score them against an FAQ corpus"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Auto)]
    pub output: OutputFormat,
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Write reconstructed transactions and the clean query/answer map.
    Extract(ExtractArgs),
    /// Response-time, step and warning statistics for a capture.
    Stats(CaptureArgs),
    /// Warnings paired with the question in flight.
    Warnings(CaptureArgs),
    /// Match every answered query against the FAQ corpus and report accuracy.
    Evaluate(EvaluateArgs),
    /// Match a single query against the FAQ corpus.
    Match(MatchArgs),
}

#[derive(Debug, Args)]
pub struct CaptureArgs {
    #[arg(value_name = "CAPTURE")]
    pub capture: PathBuf,
}

#[derive(Debug, Args)]
pub struct ExtractArgs {
    #[arg(value_name = "CAPTURE")]
    pub capture: PathBuf,
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct EvaluateArgs {
    #[arg(value_name = "CAPTURE")]
    pub capture: PathBuf,
    #[arg(long, value_name = "PATH")]
    pub faq: Option<PathBuf>,
    #[arg(long, value_name = "PATH")]
    pub expected: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    pub out_dir: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MatchArgs {
    #[arg(value_name = "QUERY")]
    pub query: String,
    #[arg(long, value_name = "PATH")]
    pub faq: Option<PathBuf>,
}
