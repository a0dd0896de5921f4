//! One report cycle: discover, aggregate, analyze against history, write outputs.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::aggregate::{collect_audited_urls, AuditedUrl};
use crate::analysis::{active_keys, analyze, AnalysisOptions};
use crate::artifacts::{discover_artifacts, ProfileArtifact};
use crate::config::{ReportConfig, ResolvedPaths};
use crate::error::{CycleError, HistoryError};
use crate::history::{cleanup_stale_paths, HistoryStore};
use crate::model::AnalysisResult;
use crate::outputs::{append_github_output, append_step_summary, write_output_files, OutputFiles};
use crate::report::{render_markdown, summary_document, ReportContext};

/// Where cycle results go besides the output directory.
#[derive(Debug, Clone, Default)]
pub struct CycleSinks {
    /// GitHub Actions step output file (`$GITHUB_OUTPUT`).
    pub github_output: Option<PathBuf>,
    /// GitHub Actions job summary file (`$GITHUB_STEP_SUMMARY`).
    pub step_summary: Option<PathBuf>,
    pub run_url: Option<String>,
    pub commit: Option<String>,
}

#[derive(Debug)]
pub struct CycleOutcome {
    pub analysis: AnalysisResult,
    pub artifacts: Vec<ProfileArtifact>,
    /// The fail-on policy tripped on failed assertions.
    pub policy_failed: bool,
    /// History could not be persisted; results come from an unlocked read.
    pub history_error: Option<HistoryError>,
    pub removed_keys: Vec<String>,
    pub outputs: OutputFiles,
    pub context: ReportContext,
}

/// Run one cycle with the current time.
pub fn run_report_cycle(
    config: &ReportConfig,
    sinks: &CycleSinks,
) -> Result<CycleOutcome, CycleError> {
    run_report_cycle_at(config, sinks, Utc::now())
}

/// Run one cycle as of `now`.
pub fn run_report_cycle_at(
    config: &ReportConfig,
    sinks: &CycleSinks,
    now: DateTime<Utc>,
) -> Result<CycleOutcome, CycleError> {
    let paths = config.validate()?;
    let artifacts = discover_artifacts(&paths.results_dir)?;
    let context = ReportContext {
        threshold_percent: config.threshold_percent,
        run_url: sinks.run_url.clone(),
        commit: sinks.commit.clone(),
    };

    if artifacts.is_empty() {
        warn!(
            results_dir = %paths.results_dir.display(),
            "no audit artifacts found, writing empty outputs"
        );
        let analysis = AnalysisResult {
            passed: true,
            ..AnalysisResult::default()
        };
        let outputs = emit(&paths, sinks, &analysis, &context)?;
        return Ok(CycleOutcome {
            analysis,
            artifacts,
            policy_failed: false,
            history_error: None,
            removed_keys: Vec::new(),
            outputs,
            context,
        });
    }

    let audited = collect_audited_urls(&artifacts);
    let options = AnalysisOptions {
        threshold_percent: config.threshold_percent,
        window_size: config.window_size,
        now,
    };

    let store = HistoryStore::new(&paths.history_path)
        .with_max_runs(config.max_runs_per_key)
        .with_lock_options(config.lock_options());

    let (analysis, removed_keys, history_error) =
        match analyze_with_history(&store, &audited, &artifacts, &options, config.stale_days) {
            Ok((analysis, removed)) => (analysis, removed, None),
            Err(e) => {
                error!(
                    path = %store.path().display(),
                    error = %e,
                    "history not updated; analyzing against an unlocked read"
                );
                let (analysis, _) = analyze(&audited, &artifacts, store.load(), &options);
                (analysis, Vec::new(), Some(e))
            }
        };

    let policy_failed = config.fail_on.should_fail(&artifacts);
    let outputs = emit(&paths, sinks, &analysis, &context)?;

    info!(
        urls = analysis.urls.len(),
        regressions = analysis.regressions.len(),
        failed_assertions = analysis.failed_assertion_count(),
        passed = analysis.passed,
        policy = %config.fail_on,
        policy_failed,
        "report cycle complete"
    );

    Ok(CycleOutcome {
        analysis,
        artifacts,
        policy_failed,
        history_error,
        removed_keys,
        outputs,
        context,
    })
}

/// Locked read-analyze-cleanup-write against the history file.
fn analyze_with_history(
    store: &HistoryStore,
    audited: &[AuditedUrl],
    artifacts: &[ProfileArtifact],
    options: &AnalysisOptions,
    stale_days: i64,
) -> Result<(AnalysisResult, Vec<String>), HistoryError> {
    let active = active_keys(audited);
    store.update(|history| {
        let (analysis, mut history) = analyze(audited, artifacts, history, options);
        let removed = cleanup_stale_paths(&mut history, &active, stale_days, options.now);
        (history, (analysis, removed))
    })
}

fn emit(
    paths: &ResolvedPaths,
    sinks: &CycleSinks,
    analysis: &AnalysisResult,
    context: &ReportContext,
) -> Result<OutputFiles, CycleError> {
    let outputs = write_output_files(&paths.output_dir, analysis)?;
    if let Some(path) = &sinks.github_output {
        append_github_output(path, analysis)?;
    }
    if let Some(path) = &sinks.step_summary {
        let markdown = render_markdown(&summary_document(analysis, context));
        append_step_summary(path, &markdown)?;
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_results_dir_yields_empty_outputs() {
        let ws = tempfile::tempdir().unwrap();
        let config = ReportConfig::default().with_workspace(ws.path());
        let outcome = run_report_cycle(&config, &CycleSinks::default()).unwrap();

        assert!(outcome.analysis.passed);
        assert!(outcome.analysis.urls.is_empty());
        assert!(!outcome.policy_failed);
        assert!(outcome.history_error.is_none());
        assert_eq!(
            fs::read_to_string(&outcome.outputs.has_regressions).unwrap(),
            "false"
        );
        assert!(!ws.path().join(".perfwatch/history.json").exists());
    }

    #[test]
    fn test_unsafe_config_is_rejected() {
        let ws = tempfile::tempdir().unwrap();
        let config = ReportConfig {
            output_dir: "/tmp/out".into(),
            ..ReportConfig::default().with_workspace(ws.path())
        };
        assert!(matches!(
            run_report_cycle(&config, &CycleSinks::default()),
            Err(CycleError::Config(_))
        ));
    }
}
