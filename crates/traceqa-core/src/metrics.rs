use crate::marker::{classify, Marker};
use crate::model::{LogEntry, Overview, SeriesStats, StepStat, Transaction};
use std::collections::{BTreeMap, HashSet};

const OUTLIER_SIGMAS: f64 = 2.0;

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

pub fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn population_std_dev(xs: &[f64], mean: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let variance = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
    variance.sqrt()
}

/// Values more than two population standard deviations away from the mean,
/// in input order.
pub fn outliers(xs: &[f64]) -> Vec<f64> {
    let center = mean(xs);
    let std_dev = population_std_dev(xs, center);
    if std_dev == 0.0 {
        return Vec::new();
    }

    let threshold = OUTLIER_SIGMAS * std_dev;
    xs.iter()
        .copied()
        .filter(|x| (x - center).abs() > threshold)
        .collect()
}

pub fn series_stats(xs: &[f64]) -> SeriesStats {
    SeriesStats {
        count: xs.len(),
        mean: mean(xs),
        median: median(xs),
        outliers: outliers(xs),
    }
}

/// Dwell time per step label: the gap between each step marker and the next
/// step marker of any label, in milliseconds, across the whole stream.
pub fn step_durations(entries: &[LogEntry]) -> Vec<StepStat> {
    let markers: Vec<(f64, String)> = entries
        .iter()
        .filter_map(|entry| match classify(entry.body.as_deref()?) {
            Marker::Step { label } => Some((entry.timestamp, label)),
            _ => None,
        })
        .collect();

    let mut by_label = BTreeMap::<String, Vec<f64>>::new();
    for (_, label) in &markers {
        by_label.entry(label.clone()).or_default();
    }
    for pair in markers.windows(2) {
        let (start, label) = &pair[0];
        let (next, _) = &pair[1];
        if let Some(durations) = by_label.get_mut(label) {
            durations.push((next - start) * 1000.0);
        }
    }

    by_label
        .into_iter()
        .map(|(label, durations_ms)| StepStat {
            mean: mean(&durations_ms),
            median: median(&durations_ms),
            outliers: outliers(&durations_ms),
            label,
            durations_ms,
        })
        .collect()
}

/// Distinct traces with at least one query-start marker. Start markers
/// without a trace id have nothing to dedup on and count individually.
pub fn user_query_count(entries: &[LogEntry]) -> usize {
    let mut traces = HashSet::<&str>::new();
    let mut untraced = 0usize;
    for entry in entries {
        let Some(body) = entry.body.as_deref() else {
            continue;
        };
        if !matches!(classify(body), Marker::Start { .. }) {
            continue;
        }
        match entry.trace_id.as_deref() {
            Some(trace_id) => {
                traces.insert(trace_id);
            }
            None => untraced += 1,
        }
    }
    traces.len() + untraced
}

pub fn response_times_ms(transactions: &[Transaction]) -> Vec<f64> {
    transactions
        .iter()
        .filter(|tx| tx.completed)
        .filter_map(|tx| tx.response_time_ms)
        .collect()
}

pub fn status_code_distribution(entries: &[LogEntry]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for code in entries.iter().filter_map(|entry| entry.status_code.as_ref()) {
        *counts.entry(code.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn mean_span_duration_us(entries: &[LogEntry]) -> Option<f64> {
    let durations: Vec<f64> = entries
        .iter()
        .filter_map(|entry| entry.duration_us.map(|d| d as f64))
        .collect();
    if durations.is_empty() {
        None
    } else {
        Some(mean(&durations))
    }
}

pub fn overview(entries: &[LogEntry], transactions: &[Transaction]) -> Overview {
    Overview {
        entry_count: entries.len(),
        transaction_count: transactions.len(),
        completed_count: transactions.iter().filter(|tx| tx.completed).count(),
        user_query_count: user_query_count(entries),
        response_time_ms: series_stats(&response_times_ms(transactions)),
        warning_count: entries.iter().filter(|entry| entry.is_warning()).count(),
        steps: step_durations(entries),
        status_codes: status_code_distribution(entries),
        mean_span_duration_us: mean_span_duration_us(entries),
    }
}
