//! Machine-readable outputs of a report cycle.
//!
//! Files land in the output directory; GitHub Actions output and step-summary
//! files are appended to when configured.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::CycleError;
use crate::model::AnalysisResult;

pub const RESULTS_FILE: &str = "results.json";
pub const REGRESSIONS_FILE: &str = "regressions.json";
pub const HAS_REGRESSIONS_FILE: &str = "has-regressions";

const DELIMITER_BASE: &str = "PERFWATCH_EOF";

/// Paths of the files written by [`write_output_files`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    pub results: PathBuf,
    pub regressions: PathBuf,
    pub has_regressions: PathBuf,
}

/// Write `results.json`, `regressions.json` and `has-regressions` into `dir`.
pub fn write_output_files(dir: &Path, analysis: &AnalysisResult) -> Result<OutputFiles, CycleError> {
    fs::create_dir_all(dir).map_err(|e| output_err(dir, e))?;

    let files = OutputFiles {
        results: dir.join(RESULTS_FILE),
        regressions: dir.join(REGRESSIONS_FILE),
        has_regressions: dir.join(HAS_REGRESSIONS_FILE),
    };

    write_file(&files.results, &to_pretty(&files.results, &analysis.urls)?)?;
    write_file(
        &files.regressions,
        &to_pretty(&files.regressions, &analysis.regressions)?,
    )?;
    write_file(&files.has_regressions, &analysis.has_regressions.to_string())?;

    info!(
        dir = %dir.display(),
        urls = analysis.urls.len(),
        regressions = analysis.regressions.len(),
        "wrote outputs"
    );
    Ok(files)
}

/// Append `results`, `regressions` and `has-regressions` to a GitHub Actions output file.
pub fn append_github_output(path: &Path, analysis: &AnalysisResult) -> Result<(), CycleError> {
    let results = to_compact(path, &analysis.urls)?;
    let regressions = to_compact(path, &analysis.regressions)?;

    let mut content = String::new();
    content.push_str(&output_entry("results", &results));
    content.push_str(&output_entry("regressions", &regressions));
    content.push_str(&output_entry(
        "has-regressions",
        &analysis.has_regressions.to_string(),
    ));

    append(path, &content)?;
    debug!(path = %path.display(), "appended step outputs");
    Ok(())
}

/// Append rendered markdown to the job step summary.
pub fn append_step_summary(path: &Path, markdown: &str) -> Result<(), CycleError> {
    let mut content = markdown.to_string();
    if !content.ends_with('\n') {
        content.push('\n');
    }
    append(path, &content)?;
    debug!(path = %path.display(), bytes = content.len(), "appended step summary");
    Ok(())
}

/// One output entry. Values spanning lines use the heredoc form with a
/// delimiter that does not occur in the value.
fn output_entry(name: &str, value: &str) -> String {
    if !value.contains('\n') && !value.contains('\r') {
        return format!("{}={}\n", name, value);
    }
    let mut delimiter = DELIMITER_BASE.to_string();
    let mut n = 0u32;
    while value.contains(&delimiter) {
        n += 1;
        delimiter = format!("{}_{}", DELIMITER_BASE, n);
    }
    format!("{}<<{}\n{}\n{}\n", name, delimiter, value, delimiter)
}

fn to_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<String, CycleError> {
    serde_json::to_string_pretty(value).map_err(|e| CycleError::Output {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn to_compact<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<String, CycleError> {
    serde_json::to_string(value).map_err(|e| CycleError::Output {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_file(path: &Path, content: &str) -> Result<(), CycleError> {
    fs::write(path, content).map_err(|e| output_err(path, e))
}

fn append(path: &Path, content: &str) -> Result<(), CycleError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| output_err(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| output_err(path, e))
}

fn output_err(path: &Path, e: std::io::Error) -> CycleError {
    CycleError::Output {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}
