//! Discovery and parsing of per-profile audit artifacts.
//!
//! # Layout
//!
//! ```text
//! <results-root>/
//!   lighthouse-results-mobile/
//!     profile.txt               # "mobile"
//!     lhr-1700000000000.json    # raw results (also read from .lighthouseci/)
//!     assertion-results.json    # optional
//!     links.json                # optional, URL -> shareable report link
//! ```
//!
//! Directories without a recognised profile marker are skipped. Per-file
//! problems are logged and recovered; only failing to list the root is an error.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ArtifactError;
use crate::model::{AssertionResult, MetricKey, MetricSnapshot, Profile};

pub const ARTIFACT_DIR_PREFIX: &str = "lighthouse-results-";
pub const PROFILE_MARKER_FILE: &str = "profile.txt";
pub const ASSERTIONS_FILE: &str = "assertion-results.json";
pub const LINKS_FILE: &str = "links.json";
const NESTED_RESULTS_DIR: &str = ".lighthouseci";

/// Everything one profile shard left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileArtifact {
    pub profile: Profile,
    pub raw_result_paths: Vec<PathBuf>,
    pub assertions: Vec<AssertionResult>,
    pub report_links: BTreeMap<String, String>,
}

impl ProfileArtifact {
    pub fn failed_assertions(&self) -> impl Iterator<Item = &AssertionResult> {
        self.assertions.iter().filter(|a| !a.passed)
    }
}

/// Metrics and canonical URL extracted from one raw result file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRun {
    pub url: String,
    pub metrics: MetricSnapshot,
}

/// Find every profile artifact under `root`, sorted by profile.
pub fn discover_artifacts(root: &Path) -> Result<Vec<ProfileArtifact>, ArtifactError> {
    if !root.exists() {
        warn!(root = %root.display(), "results directory does not exist");
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(root).map_err(|e| ArtifactError::Io {
        path: root.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(ARTIFACT_DIR_PREFIX))
        })
        .collect();
    dirs.sort();

    let mut by_profile: BTreeMap<Profile, ProfileArtifact> = BTreeMap::new();
    for dir in dirs {
        let Some(profile) = read_profile_marker(&dir) else {
            continue;
        };

        let artifact = ProfileArtifact {
            profile,
            raw_result_paths: list_raw_results(&dir),
            assertions: read_assertions(&dir.join(ASSERTIONS_FILE)),
            report_links: read_links(&dir.join(LINKS_FILE)),
        };
        debug!(
            dir = %dir.display(),
            profile = %profile,
            results = artifact.raw_result_paths.len(),
            assertions = artifact.assertions.len(),
            "discovered artifact"
        );

        match by_profile.get_mut(&profile) {
            Some(existing) => {
                warn!(profile = %profile, dir = %dir.display(), "merging duplicate profile artifact");
                existing.raw_result_paths.extend(artifact.raw_result_paths);
                existing.assertions.extend(artifact.assertions);
                existing.report_links.extend(artifact.report_links);
            }
            None => {
                by_profile.insert(profile, artifact);
            }
        }
    }

    Ok(by_profile.into_values().collect())
}

fn read_profile_marker(dir: &Path) -> Option<Profile> {
    let marker = dir.join(PROFILE_MARKER_FILE);
    let content = match fs::read_to_string(&marker) {
        Ok(c) => c,
        Err(_) => {
            debug!(dir = %dir.display(), "no profile marker, skipping");
            return None;
        }
    };
    match content.parse::<Profile>() {
        Ok(profile) => Some(profile),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "unrecognised profile marker, skipping");
            None
        }
    }
}

fn list_raw_results(dir: &Path) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for candidate in [dir.to_path_buf(), dir.join(NESTED_RESULTS_DIR)] {
        let Ok(entries) = fs::read_dir(&candidate) else {
            continue;
        };
        paths.extend(
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_file() && is_raw_result_name(p)),
        );
    }
    paths.sort();
    paths
}

fn is_raw_result_name(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("lhr-") && n.ends_with(".json"))
}

fn read_assertions(path: &Path) -> Vec<AssertionResult> {
    read_optional_json(path).unwrap_or_default()
}

fn read_links(path: &Path) -> BTreeMap<String, String> {
    read_optional_json(path).unwrap_or_default()
}

fn read_optional_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read artifact file");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "malformed artifact file, ignoring");
            None
        }
    }
}

/// Parse one raw result file. Returns `None` (and logs) when it is unreadable.
pub fn parse_raw_result(path: &Path) -> Option<RawRun> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read raw result");
            return None;
        }
    };
    match serde_json::from_str::<Value>(&content) {
        Ok(doc) => Some(RawRun {
            url: extract_url(&doc),
            metrics: extract_metrics(&doc),
        }),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse raw result, skipping");
            None
        }
    }
}

/// Read `audits.<id>.numericValue` for every tracked metric.
pub fn extract_metrics(doc: &Value) -> MetricSnapshot {
    let mut snapshot = MetricSnapshot::default();
    for key in MetricKey::ALL {
        let value = doc
            .get("audits")
            .and_then(|a| a.get(key.audit_id()))
            .and_then(|a| a.get("numericValue"))
            .and_then(Value::as_f64);
        snapshot.set(key, value);
    }
    snapshot
}

/// `requestedUrl`, then `finalUrl`, else the empty string.
pub fn extract_url(doc: &Value) -> String {
    ["requestedUrl", "finalUrl"]
        .iter()
        .find_map(|field| {
            doc.get(*field)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        })
        .unwrap_or_default()
        .to_string()
}

/// Path component of `raw_url`; the raw string when it does not parse as a URL.
pub fn pathname_of(raw_url: &str) -> String {
    match url::Url::parse(raw_url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => raw_url.to_string(),
    }
}
