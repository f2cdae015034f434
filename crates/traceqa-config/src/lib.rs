use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatcherConfig {
    #[serde(default = "default_matcher_url")]
    pub url: String,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvaluationConfig {
    #[serde(default = "default_faq_path")]
    pub faq_path: String,
    #[serde(default)]
    pub expected_path: String,
    #[serde(default = "default_on_match_error")]
    pub on_match_error: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_transactions_file")]
    pub transactions_file: String,
    #[serde(default = "default_qa_pairs_file")]
    pub qa_pairs_file: String,
    #[serde(default = "default_evaluation_file")]
    pub evaluation_file: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            url: default_matcher_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            faq_path: default_faq_path(),
            expected_path: String::new(),
            on_match_error: default_on_match_error(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            transactions_file: default_transactions_file(),
            qa_pairs_file: default_qa_pairs_file(),
            evaluation_file: default_evaluation_file(),
        }
    }
}

impl OutputConfig {
    pub fn transactions_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.transactions_file)
    }

    pub fn qa_pairs_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.qa_pairs_file)
    }

    pub fn evaluation_path(&self) -> PathBuf {
        Path::new(&self.dir).join(&self.evaluation_file)
    }
}

impl EvaluationConfig {
    pub fn expected_override_path(&self) -> Option<PathBuf> {
        if self.expected_path.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.expected_path))
        }
    }
}

fn default_matcher_url() -> String {
    "http://127.0.0.1:8000/match".to_string()
}

fn default_timeout_seconds() -> f64 {
    10.0
}

fn default_faq_path() -> String {
    "data/qa_pairs.json".to_string()
}

fn default_on_match_error() -> String {
    "skip".to_string()
}

fn default_output_dir() -> String {
    "out".to_string()
}

fn default_transactions_file() -> String {
    "extracted_queries.json".to_string()
}

fn default_qa_pairs_file() -> String {
    "qa_pairs.json".to_string()
}

fn default_evaluation_file() -> String {
    "evaluation.json".to_string()
}

pub fn expand_path(path: &str) -> String {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            return format!("{}/{}", home.to_string_lossy(), stripped);
        }
    }
    path.to_string()
}

fn home_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".traceqa").join("config.toml"))
}

fn repo_default_config_path() -> PathBuf {
    PathBuf::from("config/traceqa.toml")
}

fn resolve_config_path_with_overrides(
    raw_path: Option<PathBuf>,
    env_keys: &[&str],
    home_path: Option<PathBuf>,
    repo_default: PathBuf,
) -> Option<PathBuf> {
    if let Some(path) = raw_path {
        return Some(path);
    }

    for key in env_keys {
        if let Ok(value) = std::env::var(key) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
    }

    if let Some(path) = home_path {
        if path.exists() {
            return Some(path);
        }
    }

    if repo_default.exists() {
        return Some(repo_default);
    }

    None
}

/// CLI path, then `TRACEQA_CONFIG`, then `~/.traceqa/config.toml`, then
/// `config/traceqa.toml`. `None` means built-in defaults apply.
pub fn resolve_config_path(raw_path: Option<PathBuf>) -> Option<PathBuf> {
    resolve_config_path_with_overrides(
        raw_path,
        &["TRACEQA_CONFIG"],
        home_config_path(),
        repo_default_config_path(),
    )
}

fn normalize_config(mut cfg: AppConfig) -> Result<AppConfig> {
    if !cfg.matcher.timeout_seconds.is_finite() {
        bail!("matcher.timeout_seconds must be a number");
    }
    cfg.matcher.timeout_seconds = cfg.matcher.timeout_seconds.max(1.0);
    cfg.evaluation.faq_path = expand_path(&cfg.evaluation.faq_path);
    cfg.evaluation.expected_path = expand_path(&cfg.evaluation.expected_path);
    cfg.output.dir = expand_path(&cfg.output.dir);
    Ok(cfg)
}

pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("failed to read config {}", path.as_ref().display()))?;
    let cfg: AppConfig = toml::from_str(&content).context("failed to parse TOML config")?;
    normalize_config(cfg)
}

/// Loads the resolved config file, or defaults when none exists.
pub fn load_or_default(raw_path: Option<PathBuf>) -> Result<(Option<PathBuf>, AppConfig)> {
    match resolve_config_path(raw_path) {
        Some(path) => {
            let cfg = load_config(&path)?;
            Ok((Some(path), cfg))
        }
        None => Ok((None, normalize_config(AppConfig::default())?)),
    }
}
