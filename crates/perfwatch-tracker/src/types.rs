//! Tracker data types and client configuration.

use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};

/// An issue as returned by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

/// A label to ensure on the repository before it is attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSpec {
    pub name: String,
    /// Hex color without the leading `#`.
    pub color: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LabelSpec {
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: color.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOutcome {
    Created,
    AlreadyExists,
}

/// `owner/name` of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSlug {
    pub owner: String,
    pub name: String,
}

impl RepoSlug {
    pub fn parse(slug: &str) -> TrackerResult<Self> {
        let invalid = || TrackerError::Config {
            message: format!("repository must be 'owner/name', got '{}'", slug),
        };
        let (owner, name) = slug.trim().split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }
        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for RepoSlug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Issue tracker client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base URL of the API.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Authentication token.
    #[serde(default)]
    pub token: Option<String>,

    /// Repository as `owner/name`.
    #[serde(default)]
    pub repository: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            repository: None,
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

impl TrackerConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `GITHUB_API_URL` | API base URL |
    /// | `GITHUB_TOKEN` | Authentication token |
    /// | `GITHUB_REPOSITORY` | `owner/name` |
    /// | `PERFWATCH_TRACKER_TIMEOUT` | Request timeout in seconds |
    /// | `PERFWATCH_TRACKER_MAX_RETRIES` | Max retries for transient failures |
    pub fn from_env() -> Self {
        Self {
            api_url: std::env::var("GITHUB_API_URL").unwrap_or_else(|_| default_api_url()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()),
            repository: std::env::var("GITHUB_REPOSITORY")
                .ok()
                .filter(|r| !r.is_empty()),
            timeout_secs: std::env::var("PERFWATCH_TRACKER_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            max_retries: std::env::var("PERFWATCH_TRACKER_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_retries),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Token and repository are both required to talk to the tracker.
    pub fn is_complete(&self) -> bool {
        self.token.is_some() && self.repository.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_repo_slug() {
        let slug = RepoSlug::parse("acme/site").unwrap();
        assert_eq!(slug.owner, "acme");
        assert_eq!(slug.to_string(), "acme/site");

        for bad in ["acme", "/site", "acme/", "a/b/c"] {
            assert!(
                matches!(RepoSlug::parse(bad), Err(TrackerError::Config { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::remove_var("GITHUB_API_URL");
        std::env::set_var("GITHUB_TOKEN", "");
        std::env::set_var("GITHUB_REPOSITORY", "acme/site");
        std::env::set_var("PERFWATCH_TRACKER_MAX_RETRIES", "7");

        let config = TrackerConfig::from_env();
        assert_eq!(config.api_url, "https://api.github.com");
        assert!(config.token.is_none(), "empty token counts as unset");
        assert_eq!(config.repository.as_deref(), Some("acme/site"));
        assert_eq!(config.max_retries, 7);
        assert!(!config.is_complete());

        std::env::remove_var("GITHUB_TOKEN");
        std::env::remove_var("GITHUB_REPOSITORY");
        std::env::remove_var("PERFWATCH_TRACKER_MAX_RETRIES");
    }

    #[test]
    fn test_config_builder() {
        let config = TrackerConfig::default()
            .with_url("https://ghe.example/api/v3")
            .with_token("t")
            .with_repository("acme/site");
        assert_eq!(config.api_url, "https://ghe.example/api/v3");
        assert!(config.is_complete());
    }
}
