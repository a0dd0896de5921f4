//! Report cycle configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analysis::DEFAULT_THRESHOLD_PERCENT;
use crate::error::ConfigError;
use crate::history::{LockOptions, DEFAULT_MAX_RUNS_PER_KEY, DEFAULT_STALE_DAYS};
use crate::paths::resolve_in_workspace;
use crate::policy::FailOn;
use crate::regression::DEFAULT_WINDOW_SIZE;

/// Everything one report cycle needs. Paths are workspace-relative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct ReportConfig {
    pub workspace: PathBuf,
    pub results_dir: String,
    pub history_path: String,
    pub output_dir: String,
    pub threshold_percent: f64,
    pub window_size: usize,
    pub max_runs_per_key: usize,
    pub stale_days: i64,
    pub fail_on: FailOn,
    pub lock_attempts: u32,
    pub lock_backoff_ms: u64,
    pub lock_stale_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            results_dir: "lighthouse-results".to_string(),
            history_path: ".perfwatch/history.json".to_string(),
            output_dir: ".perfwatch/out".to_string(),
            threshold_percent: DEFAULT_THRESHOLD_PERCENT,
            window_size: DEFAULT_WINDOW_SIZE,
            max_runs_per_key: DEFAULT_MAX_RUNS_PER_KEY,
            stale_days: DEFAULT_STALE_DAYS,
            fail_on: FailOn::default(),
            lock_attempts: LockOptions::default().attempts,
            lock_backoff_ms: 200,
            lock_stale_secs: 120,
        }
    }
}

/// Validated, workspace-resolved paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub results_dir: PathBuf,
    pub history_path: PathBuf,
    pub output_dir: PathBuf,
}

impl ReportConfig {
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn lock_options(&self) -> LockOptions {
        LockOptions {
            attempts: self.lock_attempts,
            backoff: Duration::from_millis(self.lock_backoff_ms),
            stale_after: Duration::from_secs(self.lock_stale_secs),
        }
    }

    /// Check numeric ranges and resolve every path inside the workspace.
    pub fn validate(&self) -> Result<ResolvedPaths, ConfigError> {
        if !self.threshold_percent.is_finite() || self.threshold_percent < 0.0 {
            return Err(ConfigError::Invalid {
                field: "threshold_percent",
                message: format!("must be a non-negative number, got {}", self.threshold_percent),
            });
        }
        if self.window_size == 0 {
            return Err(ConfigError::Invalid {
                field: "window_size",
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_runs_per_key == 0 {
            return Err(ConfigError::Invalid {
                field: "max_runs_per_key",
                message: "must be at least 1".to_string(),
            });
        }
        if self.stale_days < 1 {
            return Err(ConfigError::Invalid {
                field: "stale_days",
                message: format!("must be at least 1, got {}", self.stale_days),
            });
        }
        if self.lock_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "lock_attempts",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(ResolvedPaths {
            results_dir: resolve(&self.workspace, "results_dir", &self.results_dir)?,
            history_path: resolve(&self.workspace, "history_path", &self.history_path)?,
            output_dir: resolve(&self.workspace, "output_dir", &self.output_dir)?,
        })
    }
}

fn resolve(workspace: &Path, field: &'static str, value: &str) -> Result<PathBuf, ConfigError> {
    resolve_in_workspace(workspace, value).map_err(|source| ConfigError::UnsafePath { field, source })
}
