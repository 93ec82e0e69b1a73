//! Issue-tracker capability consumed by the reconciler.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Errors raised while resolving repository coordinates.
pub enum RepoRefError {
    #[error("invalid repository slug '{0}', expected owner/repo")]
    InvalidSlug(String),
    #[error("event payload does not carry repository coordinates")]
    MissingCoordinates,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn parse(raw: &str) -> Result<Self, RepoRefError> {
        let trimmed = raw.trim();
        let (owner, name) = trimmed
            .split_once('/')
            .ok_or_else(|| RepoRefError::InvalidSlug(raw.to_string()))?;
        let owner = owner.trim();
        let name = name.trim();
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(RepoRefError::InvalidSlug(raw.to_string()));
        }
        Ok(Self::new(owner, name))
    }

    /// Reads `repository.owner.login` and `repository.name` from a webhook payload.
    pub fn from_payload(payload: &Value) -> Result<Self, RepoRefError> {
        let repository = payload
            .get("repository")
            .ok_or(RepoRefError::MissingCoordinates)?;
        let owner = repository
            .get("owner")
            .and_then(|owner| owner.get("login"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let name = repository
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty());
        match (owner, name) {
            (Some(owner), Some(name)) => Ok(Self::new(owner, name)),
            _ => Err(RepoRefError::MissingCoordinates),
        }
    }

    pub fn as_slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueState {
    Open,
    Closed,
}

impl IssueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLabel {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Issue-like record returned by the tracker.
pub struct TrackedIssue {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub body: Option<String>,
    pub state: IssueState,
    #[serde(default)]
    pub labels: Vec<IssueLabel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateIssueRequest {
    pub owner: String,
    pub repo: String,
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditIssueRequest {
    pub owner: String,
    pub repo: String,
    pub number: u64,
    pub body: String,
    pub state: IssueState,
}

#[async_trait]
/// Search, create and edit operations of an external issue tracker.
///
/// Search results are expected in the order requested by the query's `sort:`
/// qualifier and must only contain issues of `repo`, since callers edit the
/// returned issue numbers inside that repository. Implementations own their
/// retry and timeout behavior.
pub trait IssueTracker: Send + Sync {
    async fn search_issues(&self, repo: &RepoRef, query: &str) -> Result<Vec<TrackedIssue>>;

    async fn create_issue(&self, request: &CreateIssueRequest) -> Result<TrackedIssue>;

    async fn edit_issue(&self, request: &EditIssueRequest) -> Result<TrackedIssue>;
}
