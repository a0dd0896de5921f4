//! Job failure policy. Only failed assertions can fail the job; regressions never do.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::artifacts::ProfileArtifact;
use crate::model::AssertionLevel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailOn {
    /// Fail on any failed error-level assertion.
    #[default]
    Error,
    /// Fail on any failed assertion.
    Warn,
    Never,
}

impl FailOn {
    pub fn should_fail(&self, artifacts: &[ProfileArtifact]) -> bool {
        let mut failed = artifacts.iter().flat_map(|a| a.failed_assertions());
        match self {
            FailOn::Never => false,
            FailOn::Warn => failed.next().is_some(),
            FailOn::Error => failed.any(|a| a.level == AssertionLevel::Error),
        }
    }
}

impl fmt::Display for FailOn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailOn::Error => "error",
            FailOn::Warn => "warn",
            FailOn::Never => "never",
        })
    }
}

impl FromStr for FailOn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(FailOn::Error),
            "warn" => Ok(FailOn::Warn),
            "never" => Ok(FailOn::Never),
            other => Err(format!(
                "unknown fail-on policy '{}' (expected error, warn or never)",
                other
            )),
        }
    }
}
