//! GitHub REST transport for the fault-report tracker capability.
//!
//! Provides [`GithubIssueTracker`], an `IssueTracker` backed by the issues and
//! search endpoints, plus the retry/backoff helpers it uses.

pub mod github_issue_tracker;
pub mod github_transport_helpers;

pub use github_issue_tracker::{GithubIssueTracker, GithubTrackerConfig, DEFAULT_GITHUB_API_BASE};
