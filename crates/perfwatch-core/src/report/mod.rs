//! Structured report documents built from an [`AnalysisResult`].
//!
//! Builders here decide *what* is shown; [`markdown`] decides how it looks.

pub mod markdown;

use serde::Serialize;

use crate::model::{AnalysisResult, AssertionLevel, MetricKey, ProfileResult, UrlResult};
use crate::regression::PERCENT_CHANGE_UNDEFINED;

pub use markdown::render_markdown;

/// Marker used to recognise documents written by this tool.
pub const REPORT_MARKER: &str = "<!-- perfwatch-report -->";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Pass,
    Fail,
}

impl Status {
    pub fn from_passed(passed: bool) -> Self {
        if passed {
            Status::Pass
        } else {
            Status::Fail
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Block {
    Paragraph(String),
    List(Vec<String>),
    Table(Table),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub heading: String,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    pub title: String,
    pub status: Status,
    pub sections: Vec<Section>,
}

/// Context outside the analysis that appears in documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportContext {
    pub threshold_percent: f64,
    /// Link to the CI run that produced the report.
    pub run_url: Option<String>,
    pub commit: Option<String>,
}

/// Job summary: every URL, every profile.
pub fn summary_document(analysis: &AnalysisResult, ctx: &ReportContext) -> ReportDocument {
    let mut sections = vec![overview_section(analysis, ctx)];

    if analysis.urls.is_empty() {
        sections.push(Section {
            heading: "Results".to_string(),
            blocks: vec![Block::Paragraph(
                "No audit results were found for this run.".to_string(),
            )],
        });
    } else {
        sections.push(Section {
            heading: "Results".to_string(),
            blocks: vec![Block::Table(results_table(&analysis.urls))],
        });
    }

    if let Some(section) = regressions_section(analysis) {
        sections.push(section);
    }
    if let Some(section) = assertions_section(&analysis.urls) {
        sections.push(section);
    }

    ReportDocument {
        title: "Performance Report".to_string(),
        status: Status::from_passed(analysis.passed),
        sections,
    }
}

/// Body of the tracking issue (and of its follow-up comments) while failing.
pub fn failure_document(analysis: &AnalysisResult, ctx: &ReportContext) -> ReportDocument {
    let failing: Vec<UrlResult> = analysis
        .urls
        .iter()
        .filter(|u| !u.passed)
        .cloned()
        .collect();

    let mut sections = vec![overview_section(analysis, ctx)];
    sections.push(Section {
        heading: "Failing pages".to_string(),
        blocks: vec![Block::Table(failing_table(&failing))],
    });
    if let Some(section) = regressions_section(analysis) {
        sections.push(section);
    }
    if let Some(section) = assertions_section(&failing) {
        sections.push(section);
    }

    ReportDocument {
        title: "Performance regressions detected".to_string(),
        status: Status::Fail,
        sections,
    }
}

/// Comment posted before the tracking issue is closed.
pub fn all_clear_document(analysis: &AnalysisResult, ctx: &ReportContext) -> ReportDocument {
    ReportDocument {
        title: "All clear".to_string(),
        status: Status::Pass,
        sections: vec![Section {
            heading: "Resolved".to_string(),
            blocks: vec![Block::Paragraph(format!(
                "All {} audited page(s) are within budget and show no regressions. Closing this issue.",
                analysis.urls.len()
            ))]
            .into_iter()
            .chain(run_link_block(ctx))
            .collect(),
        }],
    }
}

fn run_link_block(ctx: &ReportContext) -> Option<Block> {
    ctx.run_url
        .as_ref()
        .map(|url| Block::Paragraph(format!("[View workflow run]({})", url)))
}

fn overview_section(analysis: &AnalysisResult, ctx: &ReportContext) -> Section {
    let failing = analysis.urls.iter().filter(|u| !u.passed).count();
    let mut items = vec![
        format!("Pages audited: {}", analysis.urls.len()),
        format!("Failing pages: {}", failing),
        format!("Regressions: {}", analysis.regressions.len()),
        format!("Failed assertions: {}", analysis.failed_assertion_count()),
        format!("Regression threshold: {}%", ctx.threshold_percent),
    ];
    if let Some(commit) = &ctx.commit {
        items.push(format!("Commit: `{}`", commit));
    }

    let mut blocks = vec![Block::List(items)];
    blocks.extend(run_link_block(ctx));
    Section {
        heading: "Overview".to_string(),
        blocks,
    }
}

fn metric_headers(leading: &[&str]) -> Vec<String> {
    leading
        .iter()
        .map(|s| s.to_string())
        .chain(MetricKey::ALL.iter().map(|k| k.label().to_string()))
        .chain(["Status".to_string()])
        .collect()
}

fn profile_row(url: &UrlResult, profile: &ProfileResult) -> Vec<String> {
    let mut row = vec![url.pathname.clone(), profile.profile.to_string()];
    row.extend(MetricKey::ALL.iter().map(|key| {
        let value = profile
            .metrics
            .get(*key)
            .map(|v| key.format_value(v))
            .unwrap_or_else(|| "-".to_string());
        if profile.regressions.iter().any(|r| r.metric == *key) {
            format!("**{}**", value)
        } else {
            value
        }
    }));
    row.push(status_cell(profile));
    row
}

fn status_cell(profile: &ProfileResult) -> String {
    let base = if profile.passed { "pass" } else { "fail" };
    match &profile.report_url {
        Some(link) => format!("{} ([report]({}))", base, link),
        None => base.to_string(),
    }
}

fn results_table(urls: &[UrlResult]) -> Table {
    Table {
        headers: metric_headers(&["Page", "Profile"]),
        rows: urls
            .iter()
            .flat_map(|u| u.profiles.iter().map(move |p| profile_row(u, p)))
            .collect(),
    }
}

fn failing_table(urls: &[UrlResult]) -> Table {
    Table {
        headers: vec![
            "Page".to_string(),
            "Profile".to_string(),
            "Regressions".to_string(),
            "Failed assertions".to_string(),
            "Consecutive failures".to_string(),
        ],
        rows: urls
            .iter()
            .flat_map(|u| {
                u.profiles.iter().filter(|p| !p.passed).map(move |p| {
                    vec![
                        u.pathname.clone(),
                        p.profile.to_string(),
                        p.regressions.len().to_string(),
                        p.failed_assertions.len().to_string(),
                        p.consecutive_failures.to_string(),
                    ]
                })
            })
            .collect(),
    }
}

fn regressions_section(analysis: &AnalysisResult) -> Option<Section> {
    if analysis.regressions.is_empty() {
        return None;
    }
    let rows = analysis
        .regressions
        .iter()
        .map(|f| {
            let r = &f.regression;
            vec![
                f.url.clone(),
                f.profile.to_string(),
                r.metric.label().to_string(),
                r.metric.format_value(r.current),
                r.metric.format_value(r.avg),
                signed_change(&r.percent_change),
            ]
        })
        .collect();
    Some(Section {
        heading: "Regressions".to_string(),
        blocks: vec![Block::Table(Table {
            headers: ["URL", "Profile", "Metric", "Current", "Rolling avg", "Change"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rows,
        })],
    })
}

fn signed_change(percent_change: &str) -> String {
    if percent_change == PERCENT_CHANGE_UNDEFINED {
        percent_change.to_string()
    } else {
        format!("+{}", percent_change)
    }
}

fn assertions_section(urls: &[UrlResult]) -> Option<Section> {
    let items: Vec<String> = urls
        .iter()
        .flat_map(|u| {
            u.profiles.iter().flat_map(move |p| {
                p.failed_assertions.iter().map(move |a| {
                    format!(
                        "`{}` ({}) on {} [{}]: expected {} {}, got {}",
                        a.audit_id,
                        match a.level {
                            AssertionLevel::Warn => "warn",
                            AssertionLevel::Error => "error",
                        },
                        u.pathname,
                        p.profile,
                        a.operator,
                        a.expected,
                        a.actual
                    )
                })
            })
        })
        .collect();
    if items.is_empty() {
        return None;
    }
    Some(Section {
        heading: "Failed assertions".to_string(),
        blocks: vec![Block::List(items)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssertionResult, FlaggedRegression, MetricSnapshot, Profile, Regression};

    fn failing_analysis() -> AnalysisResult {
        let regression = Regression {
            metric: MetricKey::LargestContentfulPaint,
            current: 3000.0,
            avg: 2000.0,
            percent_change: "50.0%".into(),
        };
        let profile = ProfileResult {
            profile: Profile::Mobile,
            metrics: MetricSnapshot::default().with(MetricKey::LargestContentfulPaint, 3000.0),
            runs: vec![],
            regressions: vec![regression.clone()],
            failed_assertions: vec![AssertionResult {
                audit_id: "largest-contentful-paint".into(),
                level: AssertionLevel::Warn,
                name: None,
                actual: 3000.0,
                expected: 2500.0,
                operator: "<=".into(),
                passed: false,
                url: None,
            }],
            consecutive_failures: 2,
            passed: false,
            report_url: Some("https://reports/1".into()),
        };
        AnalysisResult {
            urls: vec![UrlResult {
                url: "https://example.com/".into(),
                pathname: "/".into(),
                profiles: vec![profile],
                passed: false,
            }],
            regressions: vec![FlaggedRegression {
                url: "https://example.com/".into(),
                profile: Profile::Mobile,
                regression,
            }],
            has_regressions: true,
            passed: false,
        }
    }

    #[test]
    fn test_summary_document_sections() {
        let doc = summary_document(&failing_analysis(), &ReportContext::default());
        assert_eq!(doc.status, Status::Fail);
        let headings: Vec<&str> = doc.sections.iter().map(|s| s.heading.as_str()).collect();
        assert_eq!(
            headings,
            vec!["Overview", "Results", "Regressions", "Failed assertions"]
        );
        let Block::Table(table) = &doc.sections[1].blocks[0] else {
            panic!("results should be a table");
        };
        assert_eq!(table.headers.len(), 2 + MetricKey::ALL.len() + 1);
        assert_eq!(table.rows[0][3], "**3000ms**");
        assert_eq!(table.rows[0][2], "-");
    }

    #[test]
    fn test_empty_summary_says_nothing_found() {
        let doc = summary_document(
            &AnalysisResult {
                passed: true,
                ..AnalysisResult::default()
            },
            &ReportContext::default(),
        );
        assert_eq!(doc.status, Status::Pass);
        assert_eq!(
            doc.sections[1].blocks,
            vec![Block::Paragraph(
                "No audit results were found for this run.".into()
            )]
        );
    }

    #[test]
    fn test_failure_document_lists_only_failing_profiles() {
        let doc = failure_document(&failing_analysis(), &ReportContext::default());
        let Block::Table(table) = &doc.sections[1].blocks[0] else {
            panic!("failing pages should be a table");
        };
        assert_eq!(table.rows, vec![vec!["/", "mobile", "1", "1", "2"]]);

        let Block::Table(regressions) = &doc.sections[2].blocks[0] else {
            panic!("regressions should be a table");
        };
        assert_eq!(regressions.rows[0][5], "+50.0%");
    }

    #[test]
    fn test_undefined_change_is_not_signed() {
        assert_eq!(signed_change("N/A"), "N/A");
        assert_eq!(signed_change("12.5%"), "+12.5%");
    }

    #[test]
    fn test_all_clear_includes_run_link() {
        let ctx = ReportContext {
            run_url: Some("https://ci/run/1".into()),
            ..ReportContext::default()
        };
        let doc = all_clear_document(&AnalysisResult::default(), &ctx);
        assert_eq!(doc.sections[0].blocks.len(), 2);
    }
}
