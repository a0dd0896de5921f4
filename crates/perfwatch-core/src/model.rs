//! Shared data model: profiles, metric snapshots, assertions and analysis results.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Device profile an audit shard ran under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Mobile,
    Tablet,
    Desktop,
}

impl Profile {
    pub const ALL: [Profile; 3] = [Profile::Mobile, Profile::Tablet, Profile::Desktop];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Mobile => "mobile",
            Profile::Tablet => "tablet",
            Profile::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = UnknownProfile;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" => Ok(Profile::Mobile),
            "tablet" => Ok(Profile::Tablet),
            "desktop" => Ok(Profile::Desktop),
            _ => Err(UnknownProfile(s.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown profile '{0}' (expected mobile, tablet or desktop)")]
pub struct UnknownProfile(pub String);

/// One of the six tracked metrics. The wire form is the audit id.
///
/// Every tracked metric is "lower is better".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKey {
    FirstContentfulPaint,
    LargestContentfulPaint,
    CumulativeLayoutShift,
    TotalBlockingTime,
    SpeedIndex,
    Interactive,
}

impl MetricKey {
    pub const ALL: [MetricKey; 6] = [
        MetricKey::FirstContentfulPaint,
        MetricKey::LargestContentfulPaint,
        MetricKey::CumulativeLayoutShift,
        MetricKey::TotalBlockingTime,
        MetricKey::SpeedIndex,
        MetricKey::Interactive,
    ];

    /// Audit id in the raw result document.
    pub fn audit_id(&self) -> &'static str {
        match self {
            MetricKey::FirstContentfulPaint => "first-contentful-paint",
            MetricKey::LargestContentfulPaint => "largest-contentful-paint",
            MetricKey::CumulativeLayoutShift => "cumulative-layout-shift",
            MetricKey::TotalBlockingTime => "total-blocking-time",
            MetricKey::SpeedIndex => "speed-index",
            MetricKey::Interactive => "interactive",
        }
    }

    /// Short label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::FirstContentfulPaint => "FCP",
            MetricKey::LargestContentfulPaint => "LCP",
            MetricKey::CumulativeLayoutShift => "CLS",
            MetricKey::TotalBlockingTime => "TBT",
            MetricKey::SpeedIndex => "SI",
            MetricKey::Interactive => "TTI",
        }
    }

    /// Human-readable value, milliseconds for timings and unitless for CLS.
    pub fn format_value(&self, value: f64) -> String {
        match self {
            MetricKey::CumulativeLayoutShift => format!("{:.3}", value),
            _ => format!("{:.0}ms", value),
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.audit_id())
    }
}

/// Per-metric values of one audit (or one aggregate). Absent values stay absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    #[serde(
        rename = "first-contentful-paint",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub first_contentful_paint: Option<f64>,
    #[serde(
        rename = "largest-contentful-paint",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub largest_contentful_paint: Option<f64>,
    #[serde(
        rename = "cumulative-layout-shift",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub cumulative_layout_shift: Option<f64>,
    #[serde(
        rename = "total-blocking-time",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_blocking_time: Option<f64>,
    #[serde(rename = "speed-index", default, skip_serializing_if = "Option::is_none")]
    pub speed_index: Option<f64>,
    #[serde(rename = "interactive", default, skip_serializing_if = "Option::is_none")]
    pub interactive: Option<f64>,
}

impl MetricSnapshot {
    pub fn get(&self, key: MetricKey) -> Option<f64> {
        match key {
            MetricKey::FirstContentfulPaint => self.first_contentful_paint,
            MetricKey::LargestContentfulPaint => self.largest_contentful_paint,
            MetricKey::CumulativeLayoutShift => self.cumulative_layout_shift,
            MetricKey::TotalBlockingTime => self.total_blocking_time,
            MetricKey::SpeedIndex => self.speed_index,
            MetricKey::Interactive => self.interactive,
        }
    }

    /// Sets a metric value. Non-finite values are stored as absent.
    pub fn set(&mut self, key: MetricKey, value: Option<f64>) {
        let value = value.filter(|v| v.is_finite());
        let slot = match key {
            MetricKey::FirstContentfulPaint => &mut self.first_contentful_paint,
            MetricKey::LargestContentfulPaint => &mut self.largest_contentful_paint,
            MetricKey::CumulativeLayoutShift => &mut self.cumulative_layout_shift,
            MetricKey::TotalBlockingTime => &mut self.total_blocking_time,
            MetricKey::SpeedIndex => &mut self.speed_index,
            MetricKey::Interactive => &mut self.interactive,
        };
        *slot = value;
    }

    pub fn with(mut self, key: MetricKey, value: f64) -> Self {
        self.set(key, Some(value));
        self
    }

    pub fn is_empty(&self) -> bool {
        MetricKey::ALL.iter().all(|k| self.get(*k).is_none())
    }
}

/// Severity an assertion was configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionLevel {
    Warn,
    Error,
}

/// One assertion outcome as written by the external audit runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub audit_id: String,
    pub level: AssertionLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub actual: f64,
    #[serde(default)]
    pub expected: f64,
    #[serde(default)]
    pub operator: String,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl AssertionResult {
    /// Whether this assertion is scoped to `url`. Unscoped assertions apply to every URL.
    pub fn applies_to(&self, url: &str) -> bool {
        match &self.url {
            None => true,
            Some(scoped) => scoped.trim_end_matches('/') == url.trim_end_matches('/'),
        }
    }
}

/// A metric whose current value exceeds its rolling average by more than the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Regression {
    pub metric: MetricKey,
    pub current: f64,
    pub avg: f64,
    pub percent_change: String,
}

/// Result for one URL under one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResult {
    pub profile: Profile,
    pub metrics: MetricSnapshot,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub runs: Vec<MetricSnapshot>,
    pub regressions: Vec<Regression>,
    pub failed_assertions: Vec<AssertionResult>,
    pub consecutive_failures: u32,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_url: Option<String>,
}

/// All profile results for one audited URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlResult {
    pub url: String,
    pub pathname: String,
    pub profiles: Vec<ProfileResult>,
    pub passed: bool,
}

/// A regression with the (url, profile) it was detected under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedRegression {
    pub url: String,
    pub profile: Profile,
    #[serde(flatten)]
    pub regression: Regression,
}

/// Root value of one report cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub urls: Vec<UrlResult>,
    pub regressions: Vec<FlaggedRegression>,
    pub has_regressions: bool,
    pub passed: bool,
}

impl AnalysisResult {
    pub fn failed(&self) -> bool {
        !self.passed
    }

    pub fn failed_assertion_count(&self) -> usize {
        self.urls
            .iter()
            .flat_map(|u| u.profiles.iter())
            .map(|p| p.failed_assertions.len())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parse_is_case_insensitive_and_trimmed() {
        assert_eq!(" Mobile\n".parse::<Profile>().unwrap(), Profile::Mobile);
        assert_eq!("DESKTOP".parse::<Profile>().unwrap(), Profile::Desktop);
        assert!("watch".parse::<Profile>().is_err());
    }

    #[test]
    fn test_snapshot_serializes_absent_metrics_as_missing() {
        let snap = MetricSnapshot::default().with(MetricKey::FirstContentfulPaint, 1000.0);
        let json = serde_json::to_value(snap).unwrap();
        assert_eq!(json, serde_json::json!({"first-contentful-paint": 1000.0}));

        let back: MetricSnapshot =
            serde_json::from_value(serde_json::json!({"speed-index": null})).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_snapshot_rejects_non_finite() {
        let mut snap = MetricSnapshot::default();
        snap.set(MetricKey::SpeedIndex, Some(f64::NAN));
        snap.set(MetricKey::Interactive, Some(f64::NEG_INFINITY));
        assert!(snap.is_empty());
    }

    #[test]
    fn test_assertion_scope() {
        let mut a = AssertionResult {
            audit_id: "speed-index".into(),
            level: AssertionLevel::Error,
            name: None,
            actual: 5000.0,
            expected: 4000.0,
            operator: "<=".into(),
            passed: false,
            url: None,
        };
        assert!(a.applies_to("https://example.com/a"));
        a.url = Some("https://example.com/a/".into());
        assert!(a.applies_to("https://example.com/a"));
        assert!(!a.applies_to("https://example.com/b"));
    }

    #[test]
    fn test_flagged_regression_is_flat() {
        let flagged = FlaggedRegression {
            url: "https://example.com/".into(),
            profile: Profile::Mobile,
            regression: Regression {
                metric: MetricKey::FirstContentfulPaint,
                current: 1200.0,
                avg: 1000.0,
                percent_change: "20.0%".into(),
            },
        };
        let json = serde_json::to_value(&flagged).unwrap();
        assert_eq!(json["metric"], "first-contentful-paint");
        assert_eq!(json["profile"], "mobile");
        assert_eq!(json["percentChange"], "20.0%");
    }
}
