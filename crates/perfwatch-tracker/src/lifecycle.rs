//! Tracking-issue lifecycle.
//!
//! One open issue per repository, found by its label and title:
//!
//! | Open issue | Cycle passed | Action |
//! |------------|--------------|--------|
//! | no  | no  | ensure labels, create issue |
//! | yes | no  | comment with the failure report |
//! | yes | yes | comment all-clear, close |
//! | no  | yes | nothing |
//!
//! Tracker failures are logged and reported in the outcome; they never fail
//! the cycle.

use std::fmt;

use perfwatch_core::model::AnalysisResult;
use perfwatch_core::report::{
    all_clear_document, failure_document, render_markdown, ReportContext,
};
use tracing::{info, warn};

use crate::client::IssueTracker;
use crate::error::TrackerError;
use crate::types::{Issue, LabelOutcome, LabelSpec};

pub const DEFAULT_ISSUE_TITLE: &str = "Performance regressions detected";
pub const DEFAULT_TRACKING_LABEL: &str = "performance-regression";
pub const DEFAULT_EXTRA_LABEL: &str = "performance";

/// Title and labels of the tracking issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueSettings {
    pub title: String,
    /// Used to find the issue; always attached.
    pub tracking_label: LabelSpec,
    pub extra_labels: Vec<LabelSpec>,
}

impl Default for IssueSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_ISSUE_TITLE.to_string(),
            tracking_label: LabelSpec::new(DEFAULT_TRACKING_LABEL, "d73a4a")
                .with_description("Performance budget or regression failure"),
            extra_labels: vec![LabelSpec::new(DEFAULT_EXTRA_LABEL, "fbca04")],
        }
    }
}

impl IssueSettings {
    fn all_labels(&self) -> impl Iterator<Item = &LabelSpec> {
        std::iter::once(&self.tracking_label).chain(self.extra_labels.iter())
    }

    fn label_names(&self) -> Vec<String> {
        self.all_labels().map(|l| l.name.clone()).collect()
    }

    fn matches(&self, issue: &Issue) -> bool {
        issue.title == self.title || issue.title.contains(&self.title)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueAction {
    Create,
    Comment,
    Close,
}

impl fmt::Display for IssueAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IssueAction::Create => "create",
            IssueAction::Comment => "comment",
            IssueAction::Close => "close",
        })
    }
}

/// What [`IssueManager::reconcile`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueOutcome {
    Created { number: u64 },
    Commented { number: u64 },
    Closed { number: u64 },
    NoAction,
    Failed { action: IssueAction, message: String },
}

impl IssueOutcome {
    fn failed(action: IssueAction, error: &TrackerError) -> Self {
        warn!(action = %action, error = %error, "tracking issue update failed");
        IssueOutcome::Failed {
            action,
            message: error.to_string(),
        }
    }
}

pub struct IssueManager<T> {
    tracker: T,
    settings: IssueSettings,
}

impl<T: IssueTracker> IssueManager<T> {
    pub fn new(tracker: T) -> Self {
        Self::with_settings(tracker, IssueSettings::default())
    }

    pub fn with_settings(tracker: T, settings: IssueSettings) -> Self {
        Self { tracker, settings }
    }

    pub fn settings(&self) -> &IssueSettings {
        &self.settings
    }

    /// Bring the tracking issue in line with `analysis`.
    pub async fn reconcile(&self, analysis: &AnalysisResult, ctx: &ReportContext) -> IssueOutcome {
        let existing = self.find_tracking_issue().await;

        match (existing, analysis.passed) {
            (None, false) => self.open_issue(analysis, ctx).await,
            (Some(issue), false) => {
                let body = render_markdown(&failure_document(analysis, ctx));
                match self.tracker.comment_on_issue(issue.number, &body).await {
                    Ok(()) => {
                        info!(number = issue.number, "commented on tracking issue");
                        IssueOutcome::Commented {
                            number: issue.number,
                        }
                    }
                    Err(e) => IssueOutcome::failed(IssueAction::Comment, &e),
                }
            }
            (Some(issue), true) => {
                let body = render_markdown(&all_clear_document(analysis, ctx));
                if let Err(e) = self.tracker.comment_on_issue(issue.number, &body).await {
                    warn!(number = issue.number, error = %e, "all-clear comment failed, closing anyway");
                }
                match self.tracker.close_issue(issue.number).await {
                    Ok(()) => {
                        info!(number = issue.number, "closed tracking issue");
                        IssueOutcome::Closed {
                            number: issue.number,
                        }
                    }
                    Err(e) => IssueOutcome::failed(IssueAction::Close, &e),
                }
            }
            (None, true) => IssueOutcome::NoAction,
        }
    }

    async fn find_tracking_issue(&self) -> Option<Issue> {
        match self
            .tracker
            .list_open_issues(&self.settings.tracking_label.name)
            .await
        {
            Ok(issues) => issues.into_iter().find(|i| self.settings.matches(i)),
            Err(e) => {
                warn!(error = %e, "failed to look up tracking issue, assuming none");
                None
            }
        }
    }

    async fn open_issue(&self, analysis: &AnalysisResult, ctx: &ReportContext) -> IssueOutcome {
        self.ensure_labels().await;

        let body = render_markdown(&failure_document(analysis, ctx));
        match self
            .tracker
            .create_issue(&self.settings.title, &body, &self.settings.label_names())
            .await
        {
            Ok(issue) => {
                info!(number = issue.number, "opened tracking issue");
                IssueOutcome::Created {
                    number: issue.number,
                }
            }
            Err(e) => IssueOutcome::failed(IssueAction::Create, &e),
        }
    }

    async fn ensure_labels(&self) {
        for label in self.settings.all_labels() {
            match self.tracker.create_label(label).await {
                Ok(LabelOutcome::Created) => info!(label = %label.name, "created label"),
                Ok(LabelOutcome::AlreadyExists) => {}
                Err(e) => warn!(label = %label.name, error = %e, "failed to create label"),
            }
        }
    }
}
