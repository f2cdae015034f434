use crate::error::{CoreError, CoreResult};
use crate::model::{LogEntry, Span, Trace};
use serde_json::{Map, Value};
use tracing::debug;

const MICROS_PER_SECOND: f64 = 1_000_000.0;

const TRACE_ID_KEYS: [&str; 3] = ["trace_id", "otelTraceID", "traceId"];
const SEVERITY_KEYS: [&str; 3] = ["severity_text", "severity", "level"];
const SEVERITY_TAG: &str = "severity_text";
const STATUS_CODE_TAG: &str = "http.status_code";

fn to_str(value: Option<&Value>) -> Option<String> {
    let text = match value {
        None | Some(Value::Null) => return None,
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

fn to_f64(value: Option<&Value>) -> Option<f64> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn first_str(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| to_str(obj.get(*key)))
}

fn spans_of(value: &Value) -> Option<&Vec<Value>> {
    value.get("spans").and_then(Value::as_array)
}

fn flat_entry(index: usize, item: &Value) -> Option<LogEntry> {
    let Some(obj) = item.as_object() else {
        debug!("skipping capture entry {index}: not an object");
        return None;
    };
    let Some(timestamp) = to_f64(obj.get("timestamp")) else {
        debug!("skipping capture entry {index}: missing or unreadable timestamp");
        return None;
    };

    Some(LogEntry {
        timestamp,
        body: obj.get("body").and_then(Value::as_str).map(str::to_string),
        trace_id: first_str(obj, &TRACE_ID_KEYS),
        severity: first_str(obj, &SEVERITY_KEYS),
        span_id: None,
        duration_us: None,
        status_code: None,
    })
}

fn parse_trace(value: &Value) -> Trace {
    let trace_id = value
        .as_object()
        .and_then(|obj| first_str(obj, &["traceID", "traceId", "trace_id"]));

    let mut spans = Vec::new();
    for (idx, raw) in spans_of(value).into_iter().flatten().enumerate() {
        match serde_json::from_value::<Span>(raw.clone()) {
            Ok(span) => spans.push(span),
            Err(err) => debug!("skipping malformed span {idx}: {err}"),
        }
    }

    Trace { trace_id, spans }
}

fn span_entry(trace: &Trace, span: &Span) -> Option<LogEntry> {
    let Some(start_time) = span.start_time.filter(|t| t.is_finite()) else {
        debug!("skipping span {:?}: missing startTime", span.span_id);
        return None;
    };

    Some(LogEntry {
        timestamp: start_time / MICROS_PER_SECOND,
        body: span.operation_name.clone(),
        trace_id: trace.trace_id.clone(),
        severity: to_str(span.tag(SEVERITY_TAG)),
        span_id: span.span_id.clone(),
        duration_us: span
            .duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d as u64),
        status_code: to_str(span.tag(STATUS_CODE_TAG)),
    })
}

/// Flattens traces into entries. Span order inside a trace is not trusted;
/// the final sort restores temporal order.
pub fn flatten_traces(traces: &[Trace]) -> Vec<LogEntry> {
    traces
        .iter()
        .flat_map(|trace| trace.spans.iter().filter_map(|span| span_entry(trace, span)))
        .collect()
}

fn sort_entries(mut entries: Vec<LogEntry>) -> Vec<LogEntry> {
    // Vec::sort_by is stable, so ties keep capture order.
    entries.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    entries
}

/// Normalizes a parsed capture into one timestamp-ordered entry sequence.
///
/// Accepted shapes:
/// - a flat array of `{timestamp, body, trace_id?}` objects (array items that
///   carry a `spans` array are read as traces instead),
/// - an object with a `data` array of traces,
/// - a single trace object with a `spans` array.
///
/// Span `startTime` values are microseconds and are converted to seconds.
pub fn normalize(capture: &Value) -> CoreResult<Vec<LogEntry>> {
    let entries = match capture {
        Value::Array(items) => {
            let mut entries = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                if spans_of(item).is_some() {
                    entries.extend(flatten_traces(&[parse_trace(item)]));
                } else if let Some(entry) = flat_entry(idx, item) {
                    entries.push(entry);
                }
            }
            entries
        }
        Value::Object(obj) => {
            if let Some(Value::Array(data)) = obj.get("data") {
                let traces: Vec<Trace> = data.iter().map(parse_trace).collect();
                flatten_traces(&traces)
            } else if spans_of(capture).is_some() {
                flatten_traces(&[parse_trace(capture)])
            } else {
                return Err(CoreError::format(
                    "expected an array of entries or an object with a `data` or `spans` array",
                ));
            }
        }
        _ => {
            return Err(CoreError::format(
                "capture must be a JSON array or object",
            ))
        }
    };

    debug!("normalized {} log entries", entries.len());
    Ok(sort_entries(entries))
}

pub fn normalize_str(raw: &str) -> CoreResult<Vec<LogEntry>> {
    let capture: Value = serde_json::from_str(raw)
        .map_err(|err| CoreError::format(format!("invalid JSON: {err}")))?;
    normalize(&capture)
}
