use crate::cli::{Cli, OutputFormat};
use anyhow::Result;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Plain,
    Json,
}

pub struct CliOutput {
    pub mode: OutputMode,
    pub verbose: bool,
}

impl CliOutput {
    pub fn from_cli(cli: &Cli) -> Self {
        let mode = match cli.output {
            OutputFormat::Auto | OutputFormat::Plain => OutputMode::Plain,
            OutputFormat::Json => OutputMode::Json,
        };
        Self {
            mode,
            verbose: cli.verbose,
        }
    }

    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    pub fn json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn section(&self, title: &str, lines: &[String]) {
        if self.mode == OutputMode::Json {
            return;
        }
        println!("{title}");
        for line in lines {
            println!("  {line}");
        }
    }

    pub fn table(&self, title: &str, headers: &[&str], rows: &[Vec<String>]) {
        if self.mode == OutputMode::Json {
            return;
        }
        println!("{title}");
        println!("{}", headers.join(" | "));
        let divider = headers.iter().map(|_| "---").collect::<Vec<_>>().join("+");
        println!("{divider}");
        for row in rows {
            println!("{}", row.join(" | "));
        }
    }
}

pub fn format_ms(value: f64) -> String {
    format!("{value:.2} ms")
}

pub fn format_accuracy(accuracy: Option<f64>) -> String {
    accuracy
        .map(|value| format!("{value:.1}%"))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Shortens long answers for table cells.
pub fn clip(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let mut out: String = flat.chars().take(max_chars.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
