//! Rolling-average regression detection.

use crate::history::HistoryEntry;
use crate::model::{MetricKey, MetricSnapshot, Regression};

/// Number of most recent history runs forming the baseline.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Fewer windowed runs than this and no baseline exists.
pub const MIN_BASELINE_RUNS: usize = 2;

/// Reported instead of a ratio when the baseline average is zero.
pub const PERCENT_CHANGE_UNDEFINED: &str = "N/A";

/// Flag every metric in `current` that exceeds its rolling average by more
/// than `threshold_percent`. Improvements are never reported.
pub fn detect_regressions(
    current: &MetricSnapshot,
    entry: Option<&HistoryEntry>,
    threshold_percent: f64,
    window_size: usize,
) -> Vec<Regression> {
    let Some(entry) = entry else {
        return Vec::new();
    };

    let start = entry.runs.len().saturating_sub(window_size);
    let window = &entry.runs[start..];
    if window.len() < MIN_BASELINE_RUNS {
        return Vec::new();
    }

    let factor = 1.0 + threshold_percent / 100.0;
    let mut regressions = Vec::new();

    for key in MetricKey::ALL {
        let Some(current_value) = current.get(key) else {
            continue;
        };

        let historical: Vec<f64> = window.iter().filter_map(|r| r.metrics.get(key)).collect();
        if historical.is_empty() {
            continue;
        }
        let avg = historical.iter().sum::<f64>() / historical.len() as f64;

        if current_value > avg * factor {
            regressions.push(Regression {
                metric: key,
                current: current_value,
                avg,
                percent_change: format_percent_change(current_value, avg),
            });
        }
    }

    regressions
}

/// `((current - avg) / avg) * 100` to one decimal, or the undefined sentinel for a zero baseline.
pub fn format_percent_change(current: f64, avg: f64) -> String {
    if avg == 0.0 {
        return PERCENT_CHANGE_UNDEFINED.to_string();
    }
    let pct = (current - avg) / avg * 100.0;
    if !pct.is_finite() {
        return PERCENT_CHANGE_UNDEFINED.to_string();
    }
    format!("{:.1}%", pct)
}
