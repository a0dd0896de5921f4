//! End-to-end report cycles against a temporary workspace.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, TimeZone, Utc};
use perfwatch_core::history::{lock_path_for, timestamp};
use perfwatch_core::{
    run_report_cycle_at, CycleSinks, FailOn, History, HistoryEntry, HistoryError, HistoryStore,
    ReportConfig,
};
use serde_json::json;
use tempfile::TempDir;

const PAGE: &str = "https://example.com/pricing";

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() + Duration::days(n)
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// Replace the mobile shard with one raw result per FCP value.
fn write_mobile_shard(ws: &Path, fcp_runs: &[f64], assertions: serde_json::Value) {
    let dir = ws.join("lighthouse-results/lighthouse-results-mobile");
    let _ = fs::remove_dir_all(&dir);
    write(&dir.join("profile.txt"), "mobile\n");
    for (i, fcp) in fcp_runs.iter().enumerate() {
        let lhr = json!({
            "requestedUrl": PAGE,
            "audits": {
                "first-contentful-paint": {"numericValue": fcp},
                "largest-contentful-paint": {"numericValue": 2000.0}
            }
        });
        write(&dir.join(format!("lhr-{}.json", i)), &lhr.to_string());
    }
    write(&dir.join("assertion-results.json"), &assertions.to_string());
    write(
        &dir.join("links.json"),
        &serde_json::to_string(&BTreeMap::from([(PAGE, "https://storage.example/report/1")]))
            .unwrap(),
    );
}

fn config(ws: &TempDir) -> ReportConfig {
    ReportConfig::default().with_workspace(ws.path())
}

fn history_of(ws: &TempDir) -> History {
    HistoryStore::new(ws.path().join(".perfwatch/history.json")).load()
}

#[test]
fn test_regression_detected_after_baseline_builds() {
    let ws = TempDir::new().unwrap();
    let cfg = config(&ws);
    let sinks = CycleSinks::default();

    for (n, fcp) in [1000.0, 1000.0].into_iter().enumerate() {
        write_mobile_shard(ws.path(), &[fcp], json!([]));
        let outcome = run_report_cycle_at(&cfg, &sinks, day(n as i64)).unwrap();
        assert!(outcome.analysis.passed);
        assert!(outcome.history_error.is_none());
    }

    write_mobile_shard(ws.path(), &[1250.0, 1150.0, 1200.0], json!([]));
    let outcome = run_report_cycle_at(&cfg, &sinks, day(2)).unwrap();

    assert!(outcome.analysis.has_regressions);
    assert!(!outcome.analysis.passed);
    assert!(!outcome.policy_failed, "regressions alone never fail the job");

    let flagged = &outcome.analysis.regressions[0];
    assert_eq!(flagged.url, PAGE);
    assert_eq!(flagged.regression.current, 1200.0);
    assert_eq!(flagged.regression.avg, 1000.0);
    assert_eq!(flagged.regression.percent_change, "20.0%");

    let profile = &outcome.analysis.urls[0].profiles[0];
    assert_eq!(profile.runs.len(), 3);
    assert_eq!(profile.consecutive_failures, 1);
    assert_eq!(
        profile.report_url.as_deref(),
        Some("https://storage.example/report/1")
    );

    let history = history_of(&ws);
    let entry = history.entry("mobile:/pricing").unwrap();
    assert_eq!(entry.runs.len(), 3);
    assert_eq!(entry.consecutive_failures, 1);
    assert!(!lock_path_for(&ws.path().join(".perfwatch/history.json")).exists());

    assert_eq!(
        fs::read_to_string(&outcome.outputs.has_regressions).unwrap(),
        "true"
    );
}

#[test]
fn test_failed_error_assertion_trips_policy() {
    let ws = TempDir::new().unwrap();
    write_mobile_shard(
        ws.path(),
        &[1000.0],
        json!([{
            "auditId": "first-contentful-paint",
            "level": "error",
            "actual": 1000.0,
            "expected": 800.0,
            "operator": "<=",
            "passed": false
        }]),
    );

    let outcome = run_report_cycle_at(&config(&ws), &CycleSinks::default(), day(0)).unwrap();
    assert!(outcome.policy_failed);
    assert_eq!(outcome.analysis.failed_assertion_count(), 1);

    let lenient = ReportConfig {
        fail_on: FailOn::Never,
        ..config(&ws)
    };
    let outcome = run_report_cycle_at(&lenient, &CycleSinks::default(), day(1)).unwrap();
    assert!(!outcome.policy_failed);
    assert_eq!(outcome.analysis.urls[0].profiles[0].consecutive_failures, 2);
}

#[test]
fn test_held_lock_skips_history_write_but_still_reports() {
    let ws = TempDir::new().unwrap();
    write_mobile_shard(ws.path(), &[1000.0], json!([]));
    let history_path = ws.path().join(".perfwatch/history.json");
    write(&lock_path_for(&history_path), "4242");

    let cfg = ReportConfig {
        lock_attempts: 2,
        lock_backoff_ms: 1,
        ..config(&ws)
    };
    let outcome = run_report_cycle_at(&cfg, &CycleSinks::default(), day(0)).unwrap();

    match &outcome.history_error {
        Some(HistoryError::LockHeld { holder, .. }) => {
            assert_eq!(holder.as_deref(), Some("4242"))
        }
        other => panic!("expected LockHeld, got {other:?}"),
    }
    assert_eq!(outcome.analysis.urls.len(), 1);
    assert!(outcome.outputs.results.exists());
    assert!(!history_path.exists());
    assert!(lock_path_for(&history_path).exists(), "foreign lock is left alone");
}

#[test]
fn test_stale_keys_are_cleaned_up_and_active_keys_kept() {
    let ws = TempDir::new().unwrap();
    let store = HistoryStore::new(ws.path().join(".perfwatch/history.json"));
    let mut seeded = History::empty();
    for (key, seen) in [
        ("desktop:/gone", day(-60)),
        ("desktop:/recent", day(-5)),
        ("mobile:/pricing", day(-90)),
    ] {
        seeded.paths.insert(
            key.to_string(),
            HistoryEntry {
                consecutive_failures: 0,
                last_seen: timestamp(seen),
                runs: vec![],
            },
        );
    }
    store.save(&seeded).unwrap();

    write_mobile_shard(ws.path(), &[1000.0], json!([]));
    let outcome = run_report_cycle_at(&config(&ws), &CycleSinks::default(), day(0)).unwrap();

    assert_eq!(outcome.removed_keys, vec!["desktop:/gone".to_string()]);
    let history = history_of(&ws);
    assert!(history.entry("desktop:/recent").is_some());
    assert!(history.entry("mobile:/pricing").is_some());
    assert!(history.entry("desktop:/gone").is_none());
}

#[test]
fn test_github_sinks_receive_outputs_and_summary() {
    let ws = TempDir::new().unwrap();
    write_mobile_shard(ws.path(), &[1000.0], json!([]));
    let sinks = CycleSinks {
        github_output: Some(ws.path().join("gh_output")),
        step_summary: Some(ws.path().join("gh_summary.md")),
        run_url: Some("https://ci.example/runs/7".into()),
        commit: None,
    };

    run_report_cycle_at(&config(&ws), &sinks, day(0)).unwrap();

    let output = fs::read_to_string(ws.path().join("gh_output")).unwrap();
    assert!(output.lines().any(|l| l.starts_with("results=[{")));
    assert!(output.lines().any(|l| l == "regressions=[]"));
    assert!(output.lines().any(|l| l == "has-regressions=false"));

    let summary = fs::read_to_string(ws.path().join("gh_summary.md")).unwrap();
    assert!(summary.contains("## Performance Report ✅ PASS"));
    assert!(summary.contains("| /pricing | mobile |"));
    assert!(summary.contains("https://ci.example/runs/7"));
}

#[test]
fn test_query_variants_of_one_page_append_a_single_run() {
    let ws = TempDir::new().unwrap();
    let dir = ws.path().join("lighthouse-results/lighthouse-results-mobile");
    write(&dir.join("profile.txt"), "mobile");
    for (i, (url, fcp)) in [
        ("https://e.com/a?x=1", 900.0),
        ("https://e.com/a?x=2", 1100.0),
    ]
    .into_iter()
    .enumerate()
    {
        let lhr = json!({
            "requestedUrl": url,
            "audits": {"first-contentful-paint": {"numericValue": fcp}}
        });
        write(&dir.join(format!("lhr-{}.json", i)), &lhr.to_string());
    }

    let outcome = run_report_cycle_at(&config(&ws), &CycleSinks::default(), day(0)).unwrap();
    assert_eq!(outcome.analysis.urls.len(), 2);

    let history = history_of(&ws);
    let entry = history.entry("mobile:/a").unwrap();
    assert_eq!(entry.runs.len(), 1);
    assert_eq!(
        entry.runs[0]
            .metrics
            .get(perfwatch_core::model::MetricKey::FirstContentfulPaint),
        Some(1000.0)
    );
    assert_eq!(entry.consecutive_failures, 0);
}

#[test]
fn test_huge_stale_days_keeps_history() {
    let ws = TempDir::new().unwrap();
    let cfg = ReportConfig {
        stale_days: i64::MAX,
        ..config(&ws)
    };
    assert!(cfg.validate().is_ok());

    write_mobile_shard(ws.path(), &[1000.0], json!([]));
    let outcome = run_report_cycle_at(&cfg, &CycleSinks::default(), day(0)).unwrap();
    assert!(outcome.history_error.is_none());
    assert!(outcome.removed_keys.is_empty());
    assert!(history_of(&ws).entry("mobile:/pricing").is_some());
}
