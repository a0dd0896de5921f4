use anyhow::Context;
use tracing::{info, warn};

use perfwatch_core::{run_report_cycle, CycleOutcome, CycleSinks, ReportConfig};
use perfwatch_tracker::{
    GitHubClient, IssueManager, IssueOutcome, IssueSettings, LabelSpec, TrackerConfig,
};

use super::super::args::ReportArgs;
use crate::exit_codes::{INTERNAL_ERROR, POLICY_FAILED, SUCCESS};

pub async fn run(args: ReportArgs) -> anyhow::Result<i32> {
    let config = report_config(&args);
    let sinks = CycleSinks {
        github_output: args.github_output.clone(),
        step_summary: args.step_summary.clone(),
        run_url: args.run_url.clone().or_else(run_url_from_env),
        commit: args.commit.clone(),
    };

    let outcome = tokio::task::spawn_blocking(move || run_report_cycle(&config, &sinks))
        .await
        .context("report cycle task panicked")?
        .context("report cycle failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&outcome.analysis)
                .context("failed to serialize analysis")?
        );
    }

    if outcome.artifacts.is_empty() {
        info!("no artifacts, skipping tracking issue");
    } else if let Some(issue) = sync_issue(&args, &outcome).await {
        info!(outcome = ?issue, "tracking issue reconciled");
    }

    Ok(exit_code(&outcome))
}

fn report_config(args: &ReportArgs) -> ReportConfig {
    ReportConfig {
        workspace: args.workspace.clone(),
        results_dir: args.results_dir.clone(),
        history_path: args.history_path.clone(),
        output_dir: args.output_dir.clone(),
        threshold_percent: args.threshold,
        window_size: args.window_size,
        max_runs_per_key: args.max_runs,
        stale_days: args.stale_days,
        fail_on: args.fail_on,
        lock_attempts: args.lock_attempts,
        lock_backoff_ms: args.lock_backoff_ms,
        lock_stale_secs: args.lock_stale_secs,
    }
}

/// Link to the current GitHub Actions run, when running inside one.
fn run_url_from_env() -> Option<String> {
    let server = std::env::var("GITHUB_SERVER_URL").ok()?;
    let repo = std::env::var("GITHUB_REPOSITORY").ok()?;
    let run_id = std::env::var("GITHUB_RUN_ID").ok()?;
    Some(format!(
        "{}/{}/actions/runs/{}",
        server.trim_end_matches('/'),
        repo,
        run_id
    ))
}

async fn sync_issue(args: &ReportArgs, outcome: &CycleOutcome) -> Option<IssueOutcome> {
    if args.no_issue {
        info!("tracking issue disabled");
        return None;
    }

    let (Some(token), Some(repository)) = (&args.github_token, &args.repository) else {
        info!("no token or repository configured, skipping tracking issue");
        return None;
    };

    let tracker_config = TrackerConfig::from_env()
        .with_url(args.api_url.clone())
        .with_token(token.clone())
        .with_repository(repository.clone());
    let client = match GitHubClient::new(tracker_config) {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "cannot create issue tracker client, skipping tracking issue");
            return None;
        }
    };

    let defaults = IssueSettings::default();
    let settings = IssueSettings {
        title: args.issue_title.clone(),
        tracking_label: LabelSpec {
            name: args.issue_label.clone(),
            ..defaults.tracking_label
        },
        extra_labels: defaults.extra_labels,
    };

    let manager = IssueManager::with_settings(client, settings);
    Some(manager.reconcile(&outcome.analysis, &outcome.context).await)
}

fn exit_code(outcome: &CycleOutcome) -> i32 {
    if let Some(e) = &outcome.history_error {
        warn!(error = %e, "history was not persisted");
        return INTERNAL_ERROR;
    }
    if outcome.policy_failed {
        return POLICY_FAILED;
    }
    SUCCESS
}
