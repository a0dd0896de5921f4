//! Performance audit analysis for CI.
//!
//! Reads per-profile audit artifacts, aggregates repeated runs by median,
//! detects regressions against a rolling per-`profile:pathname` history and
//! writes machine-readable outputs plus a markdown job summary.
//!
//! # Quick Start
//!
//! ```no_run
//! use perfwatch_core::{run_report_cycle, CycleSinks, ReportConfig};
//!
//! # fn example() -> Result<(), perfwatch_core::CycleError> {
//! let config = ReportConfig::default().with_workspace("/path/to/repo");
//! let outcome = run_report_cycle(&config, &CycleSinks::default())?;
//! println!("regressions: {}", outcome.analysis.regressions.len());
//! # Ok(())
//! # }
//! ```
//!
//! # History
//!
//! The history file is read-modify-written under an advisory `{path}.lock`
//! and replaced atomically. Concurrent writers back off and retry; a lock older
//! than the stale age is reclaimed.

pub mod aggregate;
pub mod analysis;
pub mod artifacts;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod outputs;
pub mod paths;
pub mod pipeline;
pub mod policy;
pub mod regression;
pub mod report;

pub use aggregate::{aggregate_runs, collect_audited_urls, history_key, median, AuditedUrl};
pub use analysis::{analyze, AnalysisOptions, DEFAULT_THRESHOLD_PERCENT};
pub use artifacts::{discover_artifacts, ProfileArtifact};
pub use config::{ReportConfig, ResolvedPaths};
pub use error::{
    ArtifactError, ConfigError, CycleError, HistoryError, HistoryResult, PathSafetyError,
};
pub use history::{
    cleanup_stale_paths, History, HistoryEntry, HistoryRun, HistoryStore, LockOptions,
};
pub use model::{
    AnalysisResult, AssertionLevel, AssertionResult, FlaggedRegression, MetricKey,
    MetricSnapshot, Profile, ProfileResult, Regression, UrlResult,
};
pub use paths::resolve_in_workspace;
pub use pipeline::{run_report_cycle, run_report_cycle_at, CycleOutcome, CycleSinks};
pub use policy::FailOn;
pub use regression::{detect_regressions, DEFAULT_WINDOW_SIZE};
pub use report::{
    all_clear_document, failure_document, render_markdown, summary_document, ReportContext,
    ReportDocument,
};
