//! Collapse repeated audit runs into one snapshot per (profile, URL).

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::artifacts::{parse_raw_result, pathname_of, ProfileArtifact};
use crate::model::{MetricKey, MetricSnapshot, Profile};

/// One audited URL under one profile, with its median snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditedUrl {
    pub profile: Profile,
    pub url: String,
    pub pathname: String,
    pub median: MetricSnapshot,
    pub runs: Vec<MetricSnapshot>,
    pub report_url: Option<String>,
}

impl AuditedUrl {
    /// History key, `"{profile}:{pathname}"`.
    pub fn history_key(&self) -> String {
        history_key(self.profile, &self.pathname)
    }
}

pub fn history_key(profile: Profile, pathname: &str) -> String {
    format!("{}:{}", profile, pathname)
}

/// Median of `values`; mean of the two middle values for an even count.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let count = sorted.len();
    let mid = count / 2;
    if count % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Per-metric median across runs, skipping runs where the metric is absent.
pub fn aggregate_runs(runs: &[MetricSnapshot]) -> MetricSnapshot {
    if let [only] = runs {
        return *only;
    }

    let mut out = MetricSnapshot::default();
    for key in MetricKey::ALL {
        let values: Vec<f64> = runs.iter().filter_map(|r| r.get(key)).collect();
        out.set(key, median(&values));
    }
    out
}

/// Parse every raw result and bucket by (profile, URL).
///
/// Output is sorted by profile, then URL.
pub fn collect_audited_urls(artifacts: &[ProfileArtifact]) -> Vec<AuditedUrl> {
    let mut buckets: BTreeMap<(Profile, String), Vec<MetricSnapshot>> = BTreeMap::new();

    for artifact in artifacts {
        for path in &artifact.raw_result_paths {
            let Some(run) = parse_raw_result(path) else {
                continue;
            };
            if run.url.is_empty() {
                warn!(path = %path.display(), "raw result has no URL, skipping");
                continue;
            }
            buckets
                .entry((artifact.profile, run.url))
                .or_default()
                .push(run.metrics);
        }
    }

    let links: BTreeMap<Profile, &BTreeMap<String, String>> = artifacts
        .iter()
        .map(|a| (a.profile, &a.report_links))
        .collect();

    buckets
        .into_iter()
        .map(|((profile, url), runs)| {
            debug!(profile = %profile, url = %url, runs = runs.len(), "aggregating runs");
            let report_url = links
                .get(&profile)
                .and_then(|l| l.get(&url))
                .cloned();
            AuditedUrl {
                profile,
                pathname: pathname_of(&url),
                median: aggregate_runs(&runs),
                runs,
                url,
                report_url,
            }
        })
        .collect()
}

/// Regroup per-(profile, URL) snapshots by URL, profiles nested beneath.
pub fn group_by_url(audited: &[AuditedUrl]) -> BTreeMap<String, Vec<&AuditedUrl>> {
    let mut grouped: BTreeMap<String, Vec<&AuditedUrl>> = BTreeMap::new();
    for item in audited {
        grouped.entry(item.url.clone()).or_default().push(item);
    }
    for profiles in grouped.values_mut() {
        profiles.sort_by_key(|a| a.profile);
    }
    grouped
}
