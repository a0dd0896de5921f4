//! The issue tracker seam.

use async_trait::async_trait;

use crate::error::TrackerResult;
use crate::types::{Issue, LabelOutcome, LabelSpec};

/// Operations the tracking-issue lifecycle needs from an issue tracker.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Open issues carrying `label`. Pull requests are never returned.
    async fn list_open_issues(&self, label: &str) -> TrackerResult<Vec<Issue>>;

    async fn create_issue(&self, title: &str, body: &str, labels: &[String])
        -> TrackerResult<Issue>;

    async fn comment_on_issue(&self, number: u64, body: &str) -> TrackerResult<()>;

    async fn close_issue(&self, number: u64) -> TrackerResult<()>;

    /// Create `label`; an existing label of the same name is not an error.
    async fn create_label(&self, label: &LabelSpec) -> TrackerResult<LabelOutcome>;
}
