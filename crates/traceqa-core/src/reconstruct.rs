use crate::marker::{classify, Marker};
use crate::model::{LogEntry, Transaction};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::debug;

pub(crate) fn to_datetime(timestamp: f64) -> Option<DateTime<Utc>> {
    if !timestamp.is_finite() {
        return None;
    }
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
}

/// Incremental transaction builder over a timestamp-ordered entry stream.
///
/// In-flight transactions are keyed by trace id so interleaved sessions do
/// not bleed into each other. Entries without a trace id attach to the most
/// recently opened transaction.
#[derive(Debug, Default)]
pub struct Reconstructor {
    open: Vec<Transaction>,
    finished: Vec<Transaction>,
}

impl Reconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot_for(&self, trace_id: Option<&str>) -> Option<usize> {
        match trace_id {
            Some(id) => self
                .open
                .iter()
                .rposition(|tx| tx.trace_id.as_deref() == Some(id))
                .or_else(|| self.open.iter().rposition(|tx| tx.trace_id.is_none())),
            None => self.open.len().checked_sub(1),
        }
    }

    fn finalize(&mut self, idx: usize) {
        let tx = self.open.remove(idx);
        self.finished.push(tx);
    }

    pub fn observe(&mut self, entry: &LogEntry) {
        let Some(body) = entry.body.as_deref() else {
            return;
        };

        match classify(body) {
            Marker::Start { query } => {
                let trace_id = entry.trace_id.clone();
                if let Some(idx) = self.open.iter().position(|tx| tx.trace_id == trace_id) {
                    debug!(
                        "force-closing transaction {:?} on new query start",
                        self.open[idx].query
                    );
                    self.finalize(idx);
                }
                self.open.push(Transaction {
                    query,
                    answer: None,
                    start_time: to_datetime(entry.timestamp),
                    end_time: None,
                    trace_id,
                    response_time_ms: None,
                    completed: false,
                });
            }
            Marker::Context {
                context_query,
                current_input,
            } => {
                let Some(context_query) = context_query else {
                    return;
                };
                let Some(idx) = self.slot_for(entry.trace_id.as_deref()) else {
                    return;
                };
                let tx = &mut self.open[idx];
                if tx.query.is_empty() {
                    tx.query = context_query;
                }
                if let Some(answer) = current_input {
                    tx.answer = Some(answer);
                }
            }
            Marker::ChatOutput { answer } => {
                if answer.is_empty() {
                    return;
                }
                let Some(idx) = self.slot_for(entry.trace_id.as_deref()) else {
                    return;
                };
                let tx = &mut self.open[idx];
                if tx.answer.as_deref().map(str::is_empty).unwrap_or(true) {
                    tx.answer = Some(answer);
                }
            }
            Marker::End { seconds } => {
                let Some(idx) = self.slot_for(entry.trace_id.as_deref()) else {
                    return;
                };
                let tx = &mut self.open[idx];
                tx.end_time = to_datetime(entry.timestamp);
                tx.response_time_ms = Some(seconds * 1000.0);
                tx.completed = true;
                self.finalize(idx);
            }
            Marker::Step { .. } | Marker::Unrecognized => {}
        }
    }

    /// Flushes whatever is still open, in the order it was opened.
    pub fn finish(mut self) -> Vec<Transaction> {
        let open = std::mem::take(&mut self.open);
        self.finished.extend(open);
        self.finished
    }
}

pub fn reconstruct(entries: &[LogEntry]) -> Vec<Transaction> {
    let mut reconstructor = Reconstructor::new();
    for entry in entries {
        reconstructor.observe(entry);
    }
    let transactions = reconstructor.finish();
    debug!(
        "reconstructed {} transactions from {} entries",
        transactions.len(),
        entries.len()
    );
    transactions
}

/// query -> answer for completed transactions with both sides present.
/// A later transaction with the same query replaces an earlier one.
pub fn qa_pairs(transactions: &[Transaction]) -> BTreeMap<String, String> {
    let mut pairs = BTreeMap::new();
    for tx in transactions.iter().filter(|tx| tx.is_clean()) {
        if let Some(answer) = &tx.answer {
            pairs.insert(tx.query.clone(), answer.clone());
        }
    }
    pairs
}
