//! GitHub issues client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::IssueTracker;
use crate::error::{TrackerError, TrackerResult};
use crate::types::{Issue, LabelOutcome, LabelSpec, RepoSlug, TrackerConfig};

mod http;

use http::HttpBackend;

pub const TRACKER_USER_AGENT: &str = concat!("perfwatch-tracker/", env!("CARGO_PKG_VERSION"));

const PAGE_SIZE: u32 = 100;

/// Issue listing entry; pull requests carry a `pull_request` object.
#[derive(Debug, Deserialize)]
struct IssueListing {
    number: u64,
    title: String,
    #[serde(default)]
    html_url: Option<String>,
    #[serde(default)]
    pull_request: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: HttpBackend,
    base_url: String,
    repo: RepoSlug,
}

impl GitHubClient {
    /// Token and repository are required.
    pub fn new(config: TrackerConfig) -> TrackerResult<Self> {
        let token = config.token.clone().ok_or_else(|| TrackerError::Config {
            message: "no token configured (set GITHUB_TOKEN)".to_string(),
        })?;
        let repo = config
            .repository
            .as_deref()
            .ok_or_else(|| TrackerError::Config {
                message: "no repository configured (set GITHUB_REPOSITORY)".to_string(),
            })
            .and_then(RepoSlug::parse)?;

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(TRACKER_USER_AGENT));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(default_headers)
            .build()
            .map_err(|e| TrackerError::Network {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http: HttpBackend {
                client,
                token,
                max_retries: config.max_retries,
            },
            base_url: config.api_url.trim_end_matches('/').to_string(),
            repo,
        })
    }

    pub fn from_env() -> TrackerResult<Self> {
        Self::new(TrackerConfig::from_env())
    }

    pub fn repository(&self) -> &RepoSlug {
        &self.repo
    }

    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.base_url, self.repo.owner, self.repo.name, tail
        )
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn list_open_issues(&self, label: &str) -> TrackerResult<Vec<Issue>> {
        let url = self.repo_url("issues");
        debug!(url = %url, label = %label, "listing open issues");

        let page_size = PAGE_SIZE.to_string();
        let query = reqwest::Url::parse_with_params(
            &url,
            &[
                ("state", "open"),
                ("labels", label),
                ("per_page", page_size.as_str()),
            ],
        )
        .map_err(|e| TrackerError::Config {
            message: format!("invalid API URL {}: {}", url, e),
        })?;

        let response = self
            .http
            .request(Method::GET, query.as_str(), None)
            .await?;
        let listing: Vec<IssueListing> =
            response
                .json()
                .await
                .map_err(|e| TrackerError::InvalidResponse {
                    message: format!("failed to parse issue listing: {}", e),
                })?;

        Ok(listing
            .into_iter()
            .filter(|i| i.pull_request.is_none())
            .map(|i| Issue {
                number: i.number,
                title: i.title,
                html_url: i.html_url,
            })
            .collect())
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> TrackerResult<Issue> {
        let url = self.repo_url("issues");
        debug!(url = %url, title = %title, "creating issue");
        let payload = json!({ "title": title, "body": body, "labels": labels });
        self.http.json(Method::POST, &url, Some(&payload)).await
    }

    async fn comment_on_issue(&self, number: u64, body: &str) -> TrackerResult<()> {
        let url = self.repo_url(&format!("issues/{}/comments", number));
        debug!(url = %url, "commenting on issue");
        self.http
            .request(Method::POST, &url, Some(&json!({ "body": body })))
            .await?;
        Ok(())
    }

    async fn close_issue(&self, number: u64) -> TrackerResult<()> {
        let url = self.repo_url(&format!("issues/{}", number));
        debug!(url = %url, "closing issue");
        self.http
            .request(Method::PATCH, &url, Some(&json!({ "state": "closed" })))
            .await?;
        Ok(())
    }

    async fn create_label(&self, label: &LabelSpec) -> TrackerResult<LabelOutcome> {
        let url = self.repo_url("labels");
        debug!(url = %url, label = %label.name, "creating label");
        let payload = serde_json::to_value(label).map_err(|e| TrackerError::InvalidResponse {
            message: format!("failed to encode label: {}", e),
        })?;
        match self.http.request(Method::POST, &url, Some(&payload)).await {
            Ok(_) => Ok(LabelOutcome::Created),
            Err(TrackerError::AlreadyExists { .. }) => Ok(LabelOutcome::AlreadyExists),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_token_and_repository() {
        let err = GitHubClient::new(TrackerConfig::default().with_repository("acme/site"))
            .unwrap_err();
        assert!(matches!(err, TrackerError::Config { .. }));

        let err = GitHubClient::new(TrackerConfig::default().with_token("t")).unwrap_err();
        assert!(matches!(err, TrackerError::Config { .. }));

        let client = GitHubClient::new(
            TrackerConfig::default()
                .with_token("t")
                .with_repository("acme/site")
                .with_url("https://ghe.example/api/v3/"),
        )
        .unwrap();
        assert_eq!(
            client.repo_url("labels"),
            "https://ghe.example/api/v3/repos/acme/site/labels"
        );
    }
}
