//! Fold aggregated audits, assertions and history into one [`AnalysisResult`].
//!
//! Two passes. Every (profile, URL) is first evaluated against the history as
//! loaded. The results are then folded into the [`History`] once per key, so
//! URLs that share a `"{profile}:{pathname}"` key (query strings, scheme)
//! contribute a single run and a single failure step per cycle.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::aggregate::{aggregate_runs, group_by_url, AuditedUrl};
use crate::artifacts::ProfileArtifact;
use crate::history::{timestamp, History, HistoryEntry, HistoryRun};
use crate::model::{
    AnalysisResult, AssertionResult, FlaggedRegression, MetricSnapshot, Profile, ProfileResult,
    UrlResult,
};
use crate::regression::{detect_regressions, DEFAULT_WINDOW_SIZE};

pub const DEFAULT_THRESHOLD_PERCENT: f64 = 10.0;

#[derive(Debug, Clone, Copy)]
pub struct AnalysisOptions {
    pub threshold_percent: f64,
    pub window_size: usize,
    pub now: DateTime<Utc>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            window_size: DEFAULT_WINDOW_SIZE,
            now: Utc::now(),
        }
    }
}

/// History keys touched by this cycle.
pub fn active_keys(audited: &[AuditedUrl]) -> HashSet<String> {
    audited.iter().map(AuditedUrl::history_key).collect()
}

/// Failed assertions that apply to `url`.
pub fn scoped_failed_assertions(
    assertions: &[AssertionResult],
    url: &str,
) -> Vec<AssertionResult> {
    assertions
        .iter()
        .filter(|a| !a.passed && a.applies_to(url))
        .cloned()
        .collect()
}

/// Evaluate one (profile, URL) against `history` without touching it.
///
/// `consecutive_failures` is left at 0; [`fold_key`] owns the counter.
pub fn evaluate_profile(
    history: &History,
    audited: &AuditedUrl,
    assertions: &[AssertionResult],
    options: &AnalysisOptions,
) -> ProfileResult {
    let regressions = detect_regressions(
        &audited.median,
        history.entry(&audited.history_key()),
        options.threshold_percent,
        options.window_size,
    );
    let failed_assertions = scoped_failed_assertions(assertions, &audited.url);
    let passed = regressions.is_empty() && failed_assertions.is_empty();

    ProfileResult {
        profile: audited.profile,
        metrics: audited.median,
        runs: if audited.runs.len() > 1 {
            audited.runs.clone()
        } else {
            Vec::new()
        },
        regressions,
        failed_assertions,
        consecutive_failures: 0,
        passed,
        report_url: audited.report_url.clone(),
    }
}

/// Everything one cycle observed for a single history key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyObservation {
    /// Median snapshot of each URL mapping to the key.
    pub snapshots: Vec<MetricSnapshot>,
    pub failed: bool,
}

impl KeyObservation {
    fn record(&mut self, result: &ProfileResult) {
        self.snapshots.push(result.metrics);
        self.failed |= !result.passed;
    }
}

/// One fold step: append a single run for `key` and advance its failure count.
///
/// The run is the per-metric median over every snapshot in `observation`.
pub fn fold_key(
    mut history: History,
    key: &str,
    observation: &KeyObservation,
    now: DateTime<Utc>,
) -> (History, u32) {
    let now = timestamp(now);
    let entry = history
        .paths
        .entry(key.to_string())
        .or_insert_with(|| HistoryEntry {
            consecutive_failures: 0,
            last_seen: now.clone(),
            runs: Vec::new(),
        });
    entry.consecutive_failures = if observation.failed {
        entry.consecutive_failures.saturating_add(1)
    } else {
        0
    };
    entry.last_seen = now.clone();
    entry.runs.push(HistoryRun {
        metrics: aggregate_runs(&observation.snapshots),
        timestamp: now,
    });
    let consecutive_failures = entry.consecutive_failures;

    debug!(
        key = %key,
        urls = observation.snapshots.len(),
        failed = observation.failed,
        consecutive_failures,
        "recorded cycle"
    );
    (history, consecutive_failures)
}

/// Run the whole analysis. Returns the result and the updated history.
pub fn analyze(
    audited: &[AuditedUrl],
    artifacts: &[ProfileArtifact],
    history: History,
    options: &AnalysisOptions,
) -> (AnalysisResult, History) {
    let assertions: BTreeMap<Profile, &[AssertionResult]> = artifacts
        .iter()
        .map(|a| (a.profile, a.assertions.as_slice()))
        .collect();

    let mut evaluated: Vec<(String, String, Vec<(String, ProfileResult)>)> = Vec::new();
    let mut observations: BTreeMap<String, KeyObservation> = BTreeMap::new();

    for (url, profiles) in group_by_url(audited) {
        let pathname = profiles
            .first()
            .map(|a| a.pathname.clone())
            .unwrap_or_default();
        let mut results = Vec::with_capacity(profiles.len());
        for item in profiles {
            let scoped = assertions.get(&item.profile).copied().unwrap_or_default();
            let result = evaluate_profile(&history, item, scoped, options);
            let key = item.history_key();
            observations.entry(key.clone()).or_default().record(&result);
            results.push((key, result));
        }
        evaluated.push((url, pathname, results));
    }

    let mut history = history;
    let mut failures: BTreeMap<String, u32> = BTreeMap::new();
    for (key, observation) in &observations {
        let (next, count) = fold_key(history, key, observation, options.now);
        history = next;
        failures.insert(key.clone(), count);
    }

    let mut urls = Vec::with_capacity(evaluated.len());
    let mut flagged = Vec::new();
    for (url, pathname, results) in evaluated {
        let profiles: Vec<ProfileResult> = results
            .into_iter()
            .map(|(key, mut result)| {
                result.consecutive_failures = failures.get(&key).copied().unwrap_or_default();
                result
            })
            .collect();

        flagged.extend(profiles.iter().flat_map(|p| {
            p.regressions.iter().map(|r| FlaggedRegression {
                url: url.clone(),
                profile: p.profile,
                regression: r.clone(),
            })
        }));

        urls.push(UrlResult {
            passed: profiles.iter().all(|p| p.passed),
            url,
            pathname,
            profiles,
        });
    }

    let result = AnalysisResult {
        passed: urls.iter().all(|u| u.passed),
        has_regressions: !flagged.is_empty(),
        regressions: flagged,
        urls,
    };
    (result, history)
}
