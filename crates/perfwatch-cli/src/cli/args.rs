use clap::{Parser, Subcommand};
use std::path::PathBuf;

use perfwatch_core::FailOn;
use perfwatch_tracker::{DEFAULT_ISSUE_TITLE, DEFAULT_TRACKING_LABEL};

#[derive(Parser)]
#[command(
    name = "perfwatch",
    version,
    about = "Performance audit reporting for CI: median aggregation, rolling-baseline regressions, tracking issues"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze audit artifacts, update history, write outputs and sync the tracking issue
    Report(ReportArgs),
    Version,
}

#[derive(Parser, Debug, Clone)]
pub struct ReportArgs {
    /// Root all other paths are resolved against
    #[arg(long, env = "GITHUB_WORKSPACE", default_value = ".")]
    pub workspace: PathBuf,

    /// Directory holding the per-profile artifact directories (workspace-relative)
    #[arg(long, env = "PERFWATCH_RESULTS_DIR", default_value = "lighthouse-results")]
    pub results_dir: String,

    /// History document (workspace-relative)
    #[arg(
        long,
        env = "PERFWATCH_HISTORY_PATH",
        default_value = ".perfwatch/history.json"
    )]
    pub history_path: String,

    /// Where results.json, regressions.json and has-regressions are written (workspace-relative)
    #[arg(long, env = "PERFWATCH_OUTPUT_DIR", default_value = ".perfwatch/out")]
    pub output_dir: String,

    /// Percent above the rolling average that counts as a regression
    #[arg(long, env = "PERFWATCH_THRESHOLD", default_value_t = perfwatch_core::DEFAULT_THRESHOLD_PERCENT)]
    pub threshold: f64,

    /// Number of most recent historical runs in the rolling average
    #[arg(long, env = "PERFWATCH_WINDOW_SIZE", default_value_t = perfwatch_core::DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    #[arg(long, env = "PERFWATCH_MAX_RUNS", default_value_t = perfwatch_core::history::DEFAULT_MAX_RUNS_PER_KEY)]
    pub max_runs: usize,

    /// Days after which history for pages no longer audited is dropped
    #[arg(long, env = "PERFWATCH_STALE_DAYS", default_value_t = perfwatch_core::history::DEFAULT_STALE_DAYS)]
    pub stale_days: i64,

    /// Which failed assertions fail the job: error, warn or never
    #[arg(long, env = "PERFWATCH_FAIL_ON", default_value = "error")]
    pub fail_on: FailOn,

    #[arg(long, env = "PERFWATCH_LOCK_ATTEMPTS", default_value_t = 5)]
    pub lock_attempts: u32,

    #[arg(long, env = "PERFWATCH_LOCK_BACKOFF_MS", default_value_t = 200)]
    pub lock_backoff_ms: u64,

    /// Age after which an existing history lock is treated as abandoned
    #[arg(long, env = "PERFWATCH_LOCK_STALE_SECS", default_value_t = 120)]
    pub lock_stale_secs: u64,

    /// GitHub Actions step output file
    #[arg(long, env = "GITHUB_OUTPUT")]
    pub github_output: Option<PathBuf>,

    /// GitHub Actions job summary file
    #[arg(long, env = "GITHUB_STEP_SUMMARY")]
    pub step_summary: Option<PathBuf>,

    /// Link to this CI run, shown in the summary and issue
    #[arg(long, env = "PERFWATCH_RUN_URL")]
    pub run_url: Option<String>,

    #[arg(long, env = "GITHUB_SHA")]
    pub commit: Option<String>,

    /// Skip tracking-issue updates
    #[arg(long, env = "PERFWATCH_NO_ISSUE")]
    pub no_issue: bool,

    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Repository as owner/name
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub repository: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = "https://api.github.com")]
    pub api_url: String,

    #[arg(long, default_value = DEFAULT_ISSUE_TITLE)]
    pub issue_title: String,

    #[arg(long, default_value = DEFAULT_TRACKING_LABEL)]
    pub issue_label: String,

    /// Print the analysis result as JSON on stdout
    #[arg(long)]
    pub json: bool,
}
