//! Tracking-issue lifecycle for performance reports.
//!
//! The [`IssueManager`] keeps exactly one open issue per repository in line
//! with the latest [`AnalysisResult`](perfwatch_core::AnalysisResult): it opens
//! the issue when a cycle fails, comments while failures continue and closes it
//! once everything passes. [`GitHubClient`] is the production [`IssueTracker`].
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `GITHUB_TOKEN` | Token used for the issues API |
//! | `GITHUB_REPOSITORY` | `owner/name` of the repository |
//! | `GITHUB_API_URL` | API base URL (default: `https://api.github.com`) |
//! | `PERFWATCH_TRACKER_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `PERFWATCH_TRACKER_MAX_RETRIES` | Max retries for transient failures (default: 3) |

pub mod client;
pub mod error;
pub mod github;
pub mod lifecycle;
pub mod types;

pub use client::IssueTracker;
pub use error::{TrackerError, TrackerResult};
pub use github::{GitHubClient, TRACKER_USER_AGENT};
pub use lifecycle::{
    IssueAction, IssueManager, IssueOutcome, IssueSettings, DEFAULT_EXTRA_LABEL,
    DEFAULT_ISSUE_TITLE, DEFAULT_TRACKING_LABEL,
};
pub use types::{Issue, LabelOutcome, LabelSpec, RepoSlug, TrackerConfig};
