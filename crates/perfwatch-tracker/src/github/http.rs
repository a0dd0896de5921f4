//! HTTP layer: status mapping and retry.
//!
//! Status codes are interpreted here only; `github/mod.rs` works with
//! typed results.

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{TrackerError, TrackerResult};

const ACCEPT_VALUE: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "x-github-api-version";
const API_VERSION: &str = "2022-11-28";
const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub(crate) struct HttpBackend {
    pub(crate) client: reqwest::Client,
    pub(crate) token: String,
    pub(crate) max_retries: u32,
}

impl HttpBackend {
    /// Send a request and decode the JSON response.
    pub(crate) async fn json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> TrackerResult<T> {
        let response = self.request(method, url, body).await?;
        response
            .json()
            .await
            .map_err(|e| TrackerError::InvalidResponse {
                message: format!("failed to parse response from {}: {}", url, e),
            })
    }

    /// Send a request, retrying rate limits and transient failures.
    pub(crate) async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> TrackerResult<reqwest::Response> {
        use rand::Rng;

        let mut retries = 0;
        let max_retries = self.max_retries;

        loop {
            match self.request_once(method.clone(), url, body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && retries < max_retries => {
                    retries += 1;

                    let backoff = match &e {
                        TrackerError::RateLimited {
                            retry_after: Some(retry_after),
                        } => {
                            let base_ms = (*retry_after).min(MAX_RETRY_AFTER).as_millis() as u64;
                            let jitter_factor: f64 =
                                rand::thread_rng().gen_range(0.9_f64..=1.1_f64);
                            let jittered_ms = ((base_ms as f64) * jitter_factor).round() as u64;
                            Duration::from_millis(jittered_ms.max(100))
                        }
                        _ => {
                            let base_ms = backoff_base(retries).as_millis() as u64;
                            let jittered_ms = rand::thread_rng().gen_range(0..=base_ms);
                            Duration::from_millis(jittered_ms.max(10))
                        }
                    };

                    warn!(
                        error = %e,
                        retry = retries,
                        max_retries = max_retries,
                        backoff_ms = backoff.as_millis(),
                        "retrying request"
                    );

                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn request_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> TrackerResult<reqwest::Response> {
        debug!(method = %method, url = %url, "tracker request");

        let mut request = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, ACCEPT_VALUE)
            .header(API_VERSION_HEADER, API_VERSION);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        match status.as_u16() {
            200..=299 => Ok(response),

            401 => Err(TrackerError::Unauthorized {
                message: "invalid or expired token".to_string(),
            }),

            403 | 429 if is_rate_limited(&response) => Err(TrackerError::RateLimited {
                retry_after: retry_after(&response),
            }),

            403 => Err(TrackerError::Unauthorized {
                message: format!("token lacks permission for {}", url),
            }),

            404 => Err(TrackerError::NotFound {
                resource: url.to_string(),
            }),

            422 => {
                let text = response.text().await.unwrap_or_default();
                if is_already_exists(&text) {
                    Err(TrackerError::AlreadyExists {
                        resource: url.to_string(),
                    })
                } else {
                    Err(TrackerError::InvalidResponse {
                        message: format!("HTTP 422: {}", text),
                    })
                }
            }

            _ if status.is_server_error() => {
                let message = response.text().await.unwrap_or_else(|_| status.to_string());
                Err(TrackerError::Network {
                    message: format!("HTTP {}: {}", status.as_u16(), message),
                })
            }

            _ => {
                let message = response.text().await.unwrap_or_else(|_| status.to_string());
                Err(TrackerError::InvalidResponse {
                    message: format!("HTTP {}: {}", status.as_u16(), message),
                })
            }
        }
    }
}

/// Exponential base delay for the `retry`-th retry, capped at 30s.
fn backoff_base(retry: u32) -> Duration {
    Duration::from_secs(1u64 << retry.min(5)).min(MAX_BACKOFF)
}

fn is_rate_limited(response: &reqwest::Response) -> bool {
    if response.status() == StatusCode::TOO_MANY_REQUESTS {
        return true;
    }
    let headers = response.headers();
    headers.contains_key(reqwest::header::RETRY_AFTER)
        || headers
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0")
}

fn retry_after(response: &reqwest::Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// A 422 validation body whose errors carry `code: already_exists`.
fn is_already_exists(body: &str) -> bool {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("errors").and_then(Value::as_array).cloned())
        .is_some_and(|errors| {
            errors
                .iter()
                .any(|e| e.get("code").and_then(Value::as_str) == Some("already_exists"))
        })
}
