use crate::marker::{classify, Marker};
use crate::model::{LogEntry, WarningRecord};
use std::collections::HashMap;

/// Pairs every WARN entry with the question context that was in flight when
/// it was logged.
///
/// Context is tracked per trace. A warning without its own trace id borrows
/// the trace id and context of the latest question marker seen anywhere.
pub fn correlate_warnings(entries: &[LogEntry]) -> Vec<WarningRecord> {
    let mut last_trace_id: Option<String> = None;
    let mut last_context: Option<String> = None;
    let mut context_by_trace = HashMap::<String, String>::new();
    let mut records = Vec::new();

    for entry in entries {
        if let Some(body) = entry.body.as_deref() {
            if let Marker::Context { context_query, .. } = classify(body) {
                let context = context_query.unwrap_or_else(|| body.to_string());
                if let Some(trace_id) = &entry.trace_id {
                    context_by_trace.insert(trace_id.clone(), context.clone());
                }
                last_trace_id = entry.trace_id.clone();
                last_context = Some(context);
            }
        }

        if !entry.is_warning() {
            continue;
        }

        let (trace_id, question) = match &entry.trace_id {
            Some(trace_id) => (
                Some(trace_id.clone()),
                context_by_trace.get(trace_id).cloned(),
            ),
            None => (last_trace_id.clone(), last_context.clone()),
        };

        records.push(WarningRecord {
            trace_id,
            question,
            span_id: entry.span_id.clone(),
            timestamp: entry.timestamp,
            message: entry.body.clone(),
        });
    }

    records
}
