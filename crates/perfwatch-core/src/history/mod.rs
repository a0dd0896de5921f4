//! Rolling per-key metric history persisted as one JSON document.
//!
//! ```json
//! {
//!   "version": 1,
//!   "lastUpdated": "2026-03-01T12:00:00Z",
//!   "paths": {
//!     "mobile:/pricing": {
//!       "consecutiveFailures": 0,
//!       "lastSeen": "2026-03-01T12:00:00Z",
//!       "runs": [{ "metrics": { "speed-index": 3100 }, "timestamp": "..." }]
//!     }
//!   }
//! }
//! ```
//!
//! A missing or unreadable document loads as empty. Writes go through the
//! advisory lock in [`lock`] and replace the file atomically.

pub mod lock;

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{HistoryError, HistoryResult};
use crate::model::MetricSnapshot;

pub use lock::{lock_path_for, HistoryLock, LockOptions};

pub const HISTORY_VERSION: u32 = 1;
pub const DEFAULT_MAX_RUNS_PER_KEY: usize = 20;
pub const DEFAULT_STALE_DAYS: i64 = 30;

/// One persisted cycle for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRun {
    pub metrics: MetricSnapshot,
    pub timestamp: String,
}

/// History for one `profile:pathname` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub consecutive_failures: u32,
    pub last_seen: String,
    #[serde(default)]
    pub runs: Vec<HistoryRun>,
}

/// The whole persisted document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub version: u32,
    pub last_updated: String,
    #[serde(default)]
    pub paths: BTreeMap<String, HistoryEntry>,
}

impl Default for History {
    fn default() -> Self {
        Self::empty()
    }
}

impl History {
    pub fn empty() -> Self {
        Self {
            version: HISTORY_VERSION,
            last_updated: timestamp(Utc::now()),
            paths: BTreeMap::new(),
        }
    }

    pub fn entry(&self, key: &str) -> Option<&HistoryEntry> {
        self.paths.get(key)
    }

    /// Parse a document; `None` for malformed JSON or an unsupported version.
    pub fn parse(content: &str) -> Option<Self> {
        let history: History = serde_json::from_str(content).ok()?;
        (history.version == HISTORY_VERSION).then_some(history)
    }

    /// Keep only the newest `max_runs` runs of every entry.
    pub fn trim_runs(&mut self, max_runs: usize) {
        for entry in self.paths.values_mut() {
            let excess = entry.runs.len().saturating_sub(max_runs);
            if excess > 0 {
                entry.runs.drain(..excess);
            }
        }
    }
}

/// ISO-8601 timestamp in the form written to the document.
pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Remove entries not in `active_keys` whose `lastSeen` is unparseable or
/// older than `stale_days` before `now`. Returns the removed keys, sorted.
///
/// A `stale_days` too large to represent means no dated entry is stale.
pub fn cleanup_stale_paths(
    history: &mut History,
    active_keys: &HashSet<String>,
    stale_days: i64,
    now: DateTime<Utc>,
) -> Vec<String> {
    let cutoff = Duration::try_days(stale_days).and_then(|age| now.checked_sub_signed(age));
    let mut removed = Vec::new();

    history.paths.retain(|key, entry| {
        if active_keys.contains(key) {
            return true;
        }
        let keep = match DateTime::parse_from_rfc3339(&entry.last_seen) {
            Ok(seen) => cutoff.map_or(true, |cutoff| seen.with_timezone(&Utc) >= cutoff),
            Err(_) => false,
        };
        if !keep {
            removed.push(key.clone());
        }
        keep
    });

    if !removed.is_empty() {
        info!(count = removed.len(), keys = ?removed, "removed stale history entries");
    }
    removed
}

/// File-backed history with locked, atomic writes.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    path: PathBuf,
    max_runs_per_key: usize,
    lock_options: LockOptions,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_runs_per_key: DEFAULT_MAX_RUNS_PER_KEY,
            lock_options: LockOptions::default(),
        }
    }

    pub fn with_max_runs(mut self, max_runs_per_key: usize) -> Self {
        self.max_runs_per_key = max_runs_per_key;
        self
    }

    pub fn with_lock_options(mut self, options: LockOptions) -> Self {
        self.lock_options = options;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. Never fails: absent or corrupt history loads empty.
    pub fn load(&self) -> History {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no history yet, starting empty");
                return History::empty();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "history is unreadable, resetting");
                return History::empty();
            }
        };
        match History::parse(&content) {
            Some(history) => {
                debug!(path = %self.path.display(), keys = history.paths.len(), "loaded history");
                history
            }
            None => {
                warn!(path = %self.path.display(), "history is corrupt or has an unsupported version, resetting");
                History::empty()
            }
        }
    }

    /// Persist `history` under the lock.
    pub fn save(&self, history: &History) -> HistoryResult<()> {
        let _lock = HistoryLock::acquire(&self.path, &self.lock_options)?;
        self.write_locked(history.clone())
    }

    /// Locked read-modify-write: the lock is held from load through write.
    pub fn update<T, F>(&self, f: F) -> HistoryResult<T>
    where
        F: FnOnce(History) -> (History, T),
    {
        let _lock = HistoryLock::acquire(&self.path, &self.lock_options)?;
        let (history, out) = f(self.load());
        self.write_locked(history)?;
        Ok(out)
    }

    fn write_locked(&self, mut history: History) -> HistoryResult<()> {
        history.trim_runs(self.max_runs_per_key);
        history.version = HISTORY_VERSION;
        history.last_updated = timestamp(Utc::now());

        let json = serde_json::to_string_pretty(&history).map_err(|e| HistoryError::Serialize {
            message: e.to_string(),
        })?;
        write_atomic(&self.path, json.as_bytes())?;

        info!(
            path = %self.path.display(),
            keys = history.paths.len(),
            "saved history"
        );
        Ok(())
    }
}

/// Write to a temp file next to `path`, then rename it into place.
fn write_atomic(path: &Path, content: &[u8]) -> HistoryResult<()> {
    let io_err = |p: &Path, e: std::io::Error| HistoryError::Io {
        path: p.to_path_buf(),
        message: e.to_string(),
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| io_err(&dir, e))?;
    temp.write_all(content).map_err(|e| io_err(temp.path(), e))?;
    temp.write_all(b"\n").map_err(|e| io_err(path, e))?;
    temp.as_file().sync_all().map_err(|e| io_err(path, e))?;
    temp.persist(path).map_err(|e| io_err(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MetricKey;
    use std::time::Duration as StdDuration;
    use tempfile::TempDir;

    fn run(fcp: f64) -> HistoryRun {
        HistoryRun {
            metrics: MetricSnapshot::default().with(MetricKey::FirstContentfulPaint, fcp),
            timestamp: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    fn entry(last_seen: &str) -> HistoryEntry {
        HistoryEntry {
            consecutive_failures: 0,
            last_seen: last_seen.into(),
            runs: vec![run(1.0)],
        }
    }

    #[test]
    fn test_load_missing_and_corrupt_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path().join("history.json"));
        assert!(store.load().paths.is_empty());

        fs::write(store.path(), "{ broken").unwrap();
        let history = store.load();
        assert_eq!(history.version, HISTORY_VERSION);
        assert!(history.paths.is_empty());

        fs::write(store.path(), r#"{"version": 2, "lastUpdated": "x", "paths": {}}"#).unwrap();
        assert!(store.load().paths.is_empty());
    }

    #[test]
    fn test_save_trims_to_newest_runs_in_order() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path().join("history.json")).with_max_runs(3);

        let mut history = History::empty();
        history.paths.insert(
            "mobile:/".into(),
            HistoryEntry {
                consecutive_failures: 0,
                last_seen: "2026-01-01T00:00:00Z".into(),
                runs: (0..10).map(|i| run(i as f64)).collect(),
            },
        );
        store.save(&history).unwrap();

        let loaded = store.load();
        let kept: Vec<f64> = loaded.paths["mobile:/"]
            .runs
            .iter()
            .map(|r| r.metrics.first_contentful_paint.unwrap())
            .collect();
        assert_eq!(kept, vec![7.0, 8.0, 9.0]);
        assert!(!lock_path_for(store.path()).exists());
    }

    #[test]
    fn test_saved_document_uses_wire_names() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path().join("nested/history.json"));
        let mut history = History::empty();
        history.paths.insert("desktop:/a".into(), entry("2026-01-01T00:00:00Z"));
        store.save(&history).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert!(raw["lastUpdated"].is_string());
        assert_eq!(raw["paths"]["desktop:/a"]["consecutiveFailures"], 0);
        assert!(raw["paths"]["desktop:/a"]["lastSeen"].is_string());
    }

    #[test]
    fn test_save_refuses_when_lock_held() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path().join("history.json")).with_lock_options(
            LockOptions {
                attempts: 2,
                backoff: StdDuration::from_millis(1),
                stale_after: StdDuration::from_secs(3600),
            },
        );
        fs::write(lock_path_for(store.path()), "999").unwrap();

        let err = store.save(&History::empty()).unwrap_err();
        assert!(err.is_lock_held());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_update_threads_history_through_closure() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path().join("history.json"));

        let count = store
            .update(|mut h| {
                h.paths.insert("tablet:/".into(), entry("2026-01-01T00:00:00Z"));
                let n = h.paths.len();
                (h, n)
            })
            .unwrap();
        assert_eq!(count, 1);
        assert!(store.load().entry("tablet:/").is_some());
    }

    #[test]
    fn test_cleanup_removes_only_inactive_stale_entries() {
        let now = Utc::now();
        let sixty_days_ago = timestamp(now - Duration::days(60));
        let yesterday = timestamp(now - Duration::days(1));

        let mut history = History::empty();
        history.paths.insert("mobile:/old".into(), entry(&sixty_days_ago));
        history.paths.insert("mobile:/active-old".into(), entry(&sixty_days_ago));
        history.paths.insert("mobile:/recent".into(), entry(&yesterday));
        history.paths.insert("mobile:/garbage".into(), entry("not a date"));

        let active: HashSet<String> = ["mobile:/active-old".to_string()].into();
        let removed = cleanup_stale_paths(&mut history, &active, 30, now);

        assert_eq!(removed, vec!["mobile:/garbage", "mobile:/old"]);
        assert!(history.paths.contains_key("mobile:/active-old"));
        assert!(history.paths.contains_key("mobile:/recent"));
    }

    #[test]
    fn test_cleanup_with_unrepresentable_age_keeps_dated_entries() {
        let now = Utc::now();
        let mut history = History::empty();
        history
            .paths
            .insert("mobile:/old".into(), entry(&timestamp(now - Duration::days(3650))));
        history.paths.insert("mobile:/garbage".into(), entry("not a date"));

        let removed = cleanup_stale_paths(&mut history, &HashSet::new(), i64::MAX, now);

        assert_eq!(removed, vec!["mobile:/garbage"]);
        assert!(history.paths.contains_key("mobile:/old"));
    }

    #[test]
    fn test_load_unreadable_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path().join("history.json"));
        fs::write(store.path(), [0xff, 0xfe, 0x00]).unwrap();
        assert!(store.load().paths.is_empty());
    }
}
