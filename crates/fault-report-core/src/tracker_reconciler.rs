//! Find-or-create reconciliation of tracking issues.
//!
//! One reconcile call performs exactly one search followed by at most one create
//! or edit. The search-then-edit sequence has no compare-and-swap, so two
//! concurrent recurrences may both write the same count.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::error_fingerprint::{fingerprint, normalize_error, Fingerprint, ReportableError};
use crate::issue_render::{
    build_search_query, bump_occurrences, render_issue_body, render_issue_title,
};
use crate::issue_tracker::{
    CreateIssueRequest, EditIssueRequest, IssueState, IssueTracker, RepoRef, TrackedIssue,
};
use crate::report_config::ReportConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created {
        fingerprint: Fingerprint,
        issue_number: u64,
    },
    Updated {
        fingerprint: Fingerprint,
        issue_number: u64,
        occurrences: u64,
        reopened: bool,
    },
}

impl ReconcileOutcome {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            Self::Created { fingerprint, .. } | Self::Updated { fingerprint, .. } => fingerprint,
        }
    }

    pub fn issue_number(&self) -> u64 {
        match self {
            Self::Created { issue_number, .. } | Self::Updated { issue_number, .. } => {
                *issue_number
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrackerReconciler {
    config: Arc<ReportConfig>,
}

impl TrackerReconciler {
    pub fn new(config: Arc<ReportConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Records one occurrence of `error` against `repo`.
    ///
    /// Tracker failures are returned as-is; nothing is retried here.
    pub async fn reconcile<E>(
        &self,
        tracker: &dyn IssueTracker,
        repo: &RepoRef,
        error: &E,
    ) -> Result<ReconcileOutcome>
    where
        E: ReportableError + ?Sized,
    {
        let normalized = normalize_error(error);
        let fingerprint = fingerprint(&normalized);
        let query = build_search_query(&fingerprint, self.config.reopen);
        tracing::debug!(
            fingerprint = fingerprint.as_str(),
            query = query.as_str(),
            repo = repo.as_slug().as_str(),
            "searching for tracking issue"
        );

        let existing = tracker
            .search_issues(repo, &query)
            .await
            .with_context(|| format!("failed to search tracking issues for {fingerprint}"))?
            .into_iter()
            .next();

        match existing {
            Some(issue) => self.record_recurrence(tracker, repo, fingerprint, issue).await,
            None => self.open_tracking_issue(tracker, repo, fingerprint, &normalized).await,
        }
    }

    async fn record_recurrence(
        &self,
        tracker: &dyn IssueTracker,
        repo: &RepoRef,
        fingerprint: Fingerprint,
        issue: TrackedIssue,
    ) -> Result<ReconcileOutcome> {
        let (body, occurrences) = bump_occurrences(issue.body.as_deref().unwrap_or_default());
        let reopened = issue.state == IssueState::Closed && self.config.reopen;
        let state = if reopened {
            IssueState::Open
        } else {
            issue.state
        };
        let request = EditIssueRequest {
            owner: repo.owner.clone(),
            repo: repo.name.clone(),
            number: issue.number,
            body,
            state,
        };
        tracker.edit_issue(&request).await.with_context(|| {
            format!(
                "failed to update tracking issue #{} for {fingerprint}",
                issue.number
            )
        })?;
        tracing::info!(
            fingerprint = fingerprint.as_str(),
            issue_number = issue.number,
            occurrences,
            reopened,
            "tracking issue updated"
        );
        Ok(ReconcileOutcome::Updated {
            fingerprint,
            issue_number: issue.number,
            occurrences,
            reopened,
        })
    }

    async fn open_tracking_issue(
        &self,
        tracker: &dyn IssueTracker,
        repo: &RepoRef,
        fingerprint: Fingerprint,
        normalized: &str,
    ) -> Result<ReconcileOutcome> {
        let request = CreateIssueRequest {
            owner: repo.owner.clone(),
            repo: repo.name.clone(),
            title: render_issue_title(&fingerprint, &self.config),
            body: render_issue_body(&self.config, normalized),
            labels: self.config.labels.clone(),
        };
        let created = tracker
            .create_issue(&request)
            .await
            .with_context(|| format!("failed to create tracking issue for {fingerprint}"))?;
        tracing::info!(
            fingerprint = fingerprint.as_str(),
            issue_number = created.number,
            "tracking issue created"
        );
        Ok(ReconcileOutcome::Created {
            fingerprint,
            issue_number: created.number,
        })
    }
}
