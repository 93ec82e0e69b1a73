//! GitHub REST implementation of the issue-tracker capability.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use fault_report_core::{
    CreateIssueRequest, EditIssueRequest, IssueTracker, RepoRef, TrackedIssue,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::github_transport_helpers::{
    is_rate_limited_forbidden, is_retryable_github_status, is_retryable_transport_error,
    is_unapplied_github_status, is_unapplied_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};

pub const DEFAULT_GITHUB_API_BASE: &str = "https://api.github.com";
const SEARCH_PAGE_SIZE: &str = "30";
const ERROR_BODY_MAX_CHARS: usize = 800;

#[derive(Debug, Clone)]
/// Connection settings for [`GithubIssueTracker`].
pub struct GithubTrackerConfig {
    pub api_base: String,
    pub token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for GithubTrackerConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_GITHUB_API_BASE.to_string(),
            token: String::new(),
            request_timeout_ms: 10_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubSearchResponse {
    #[serde(default)]
    items: Vec<GithubSearchItem>,
}

#[derive(Debug, Deserialize)]
struct GithubSearchItem {
    #[serde(flatten)]
    issue: TrackedIssue,
    #[serde(default)]
    pull_request: Option<Value>,
    #[serde(default)]
    repository_url: Option<String>,
}

impl GithubSearchItem {
    /// Items without `repository_url` are trusted to the `repo:` qualifier.
    fn belongs_to(&self, repo: &RepoRef) -> bool {
        let Some(url) = self.repository_url.as_deref() else {
            return true;
        };
        let mut segments = url.trim_end_matches('/').rsplit('/');
        let name = segments.next().unwrap_or_default();
        let owner = segments.next().unwrap_or_default();
        owner.eq_ignore_ascii_case(&repo.owner) && name.eq_ignore_ascii_case(&repo.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Which failures a request may be resent after.
enum RetryPolicy {
    /// Reads and absolute edits: any throttling, server or transport failure.
    Idempotent,
    /// Creates: only failures that prove GitHub did not apply the request.
    UnappliedOnly,
}

#[derive(Clone)]
pub struct GithubIssueTracker {
    http: reqwest::Client,
    api_base: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl GithubIssueTracker {
    pub fn new(config: GithubTrackerConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("fault-report-github"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            reqwest::header::HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", config.token.trim());
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header)
                .context("invalid github authorization header")?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create github api client")?;
        Ok(Self {
            http: client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    async fn request_json<T, F>(
        &self,
        operation: &str,
        policy: RetryPolicy,
        mut request_builder: F,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = request_builder()
                .header(
                    "x-fault-report-retry-attempt",
                    attempt.saturating_sub(1).to_string(),
                )
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response
                            .json::<T>()
                            .await
                            .with_context(|| format!("failed to decode github {operation}"))?;
                        return Ok(parsed);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    let retryable = match policy {
                        RetryPolicy::Idempotent => {
                            is_retryable_github_status(status.as_u16())
                                || is_rate_limited_forbidden(status.as_u16(), retry_after)
                        }
                        RetryPolicy::UnappliedOnly => {
                            is_unapplied_github_status(status.as_u16(), retry_after)
                        }
                    };
                    if attempt < self.retry_max_attempts && retryable {
                        tracing::warn!(
                            operation,
                            attempt,
                            status = status.as_u16(),
                            "retrying github api request"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    bail!(
                        "github api {operation} failed with status {}: {}",
                        status.as_u16(),
                        truncate_for_error(&body, ERROR_BODY_MAX_CHARS)
                    );
                }
                Err(error) => {
                    let retryable = match policy {
                        RetryPolicy::Idempotent => is_retryable_transport_error(&error),
                        RetryPolicy::UnappliedOnly => is_unapplied_transport_error(&error),
                    };
                    if attempt < self.retry_max_attempts && retryable {
                        tracing::warn!(
                            operation,
                            attempt,
                            error = %error,
                            "retrying github api request after transport error"
                        );
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error)
                        .with_context(|| format!("github api {operation} request failed"));
                }
            }
        }
    }
}

/// Pins a search to `repo`: GitHub search is global, and callers edit the
/// returned issue numbers inside `repo`.
fn scoped_query(repo: &RepoRef, query: &str) -> String {
    format!("{} repo:{} is:issue", query.trim(), repo.as_slug())
}

#[async_trait]
impl IssueTracker for GithubIssueTracker {
    async fn search_issues(&self, repo: &RepoRef, query: &str) -> Result<Vec<TrackedIssue>> {
        let query = scoped_query(repo, query);
        let response: GithubSearchResponse = self
            .request_json("search issues", RetryPolicy::Idempotent, || {
                self.http
                    .get(format!("{}/search/issues", self.api_base))
                    .query(&[("q", query.as_str()), ("per_page", SEARCH_PAGE_SIZE)])
            })
            .await?;
        Ok(response
            .items
            .into_iter()
            .filter(|item| item.pull_request.is_none() && item.belongs_to(repo))
            .map(|item| item.issue)
            .collect())
    }

    async fn create_issue(&self, request: &CreateIssueRequest) -> Result<TrackedIssue> {
        let payload = json!({
            "title": request.title,
            "body": request.body,
            "labels": request.labels,
        });
        self.request_json("create issue", RetryPolicy::UnappliedOnly, || {
            self.http
                .post(format!(
                    "{}/repos/{}/{}/issues",
                    self.api_base, request.owner, request.repo
                ))
                .json(&payload)
        })
        .await
    }

    async fn edit_issue(&self, request: &EditIssueRequest) -> Result<TrackedIssue> {
        let payload = json!({
            "body": request.body,
            "state": request.state.as_str(),
        });
        self.request_json("edit issue", RetryPolicy::Idempotent, || {
            self.http
                .patch(format!(
                    "{}/repos/{}/{}/issues/{}",
                    self.api_base, request.owner, request.repo, request.number
                ))
                .json(&payload)
        })
        .await
    }
}
