use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One normalized event. Flat captures map onto it directly; span captures
/// are flattened into it by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Seconds since the unix epoch.
    pub timestamp: f64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub span_id: Option<String>,
    #[serde(default)]
    pub duration_us: Option<u64>,
    #[serde(default)]
    pub status_code: Option<String>,
}

impl LogEntry {
    pub fn is_warning(&self) -> bool {
        self.severity
            .as_deref()
            .map(|level| {
                let level = level.trim();
                level.eq_ignore_ascii_case("warn") || level.eq_ignore_ascii_case("warning")
            })
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpanTag {
    pub key: String,
    #[serde(default)]
    pub value: Value,
}

/// Jaeger-style span. `start_time` is in microseconds since the epoch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default, rename = "spanID")]
    pub span_id: Option<String>,
    #[serde(default)]
    pub start_time: Option<f64>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tags: Vec<SpanTag>,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Span {
    pub fn tag(&self, key: &str) -> Option<&Value> {
        self.tags
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| &tag.value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub trace_id: Option<String>,
    pub spans: Vec<Span>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub query: String,
    pub answer: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub trace_id: Option<String>,
    pub response_time_ms: Option<f64>,
    pub completed: bool,
}

impl Transaction {
    pub fn is_clean(&self) -> bool {
        self.completed
            && !self.query.trim().is_empty()
            && self
                .answer
                .as_deref()
                .map(|answer| !answer.trim().is_empty())
                .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarningRecord {
    pub trace_id: Option<String>,
    pub question: Option<String>,
    pub span_id: Option<String>,
    pub timestamp: f64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepStat {
    pub label: String,
    pub durations_ms: Vec<f64>,
    pub mean: f64,
    pub median: f64,
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub entry_count: usize,
    pub transaction_count: usize,
    pub completed_count: usize,
    pub user_query_count: usize,
    pub response_time_ms: SeriesStats,
    pub warning_count: usize,
    pub steps: Vec<StepStat>,
    pub status_codes: BTreeMap<String, usize>,
    pub mean_span_duration_us: Option<f64>,
}

/// Answer returned for a query by the FAQ matcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaqMatch {
    pub question: String,
    pub similarity: f64,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub query: String,
    pub expected: String,
    pub actual: Option<String>,
    pub matched: String,
    pub matched_question: String,
    pub similarity: f64,
    pub correct: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFailure {
    pub query: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationReport {
    pub results: Vec<MatchResult>,
    pub failures: Vec<MatchFailure>,
    pub correct_count: usize,
    pub accuracy: Option<f64>,
}
