//! Runs one handler invocation and reports its failure before re-raising it.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;

use crate::error_fingerprint::ReportableError;
use crate::event_context::EventContext;
use crate::issue_echo::is_own_echo;
use crate::report_config::ReportConfig;
use crate::tracker_reconciler::{ReconcileOutcome, TrackerReconciler};

#[derive(Debug, Default)]
/// What happened on the reporting side of one guarded invocation.
pub struct GuardReport {
    pub skipped_echo: bool,
    pub outcome: Option<ReconcileOutcome>,
    pub report_error: Option<anyhow::Error>,
}

#[derive(Debug, Clone)]
pub struct InvocationGuard {
    reconciler: TrackerReconciler,
}

impl InvocationGuard {
    pub fn new(config: Arc<ReportConfig>) -> Self {
        Self {
            reconciler: TrackerReconciler::new(config),
        }
    }

    pub fn config(&self) -> &ReportConfig {
        self.reconciler.config()
    }

    pub fn is_own_echo(&self, context: &EventContext) -> bool {
        is_own_echo(self.config(), context.payload())
    }

    /// Runs `handler` unless the event is a self-echo.
    ///
    /// Returns `Ok(None)` for a skipped echo, `Ok(Some(_))` with the handler's
    /// value on success, and on failure the handler's own error after one
    /// reporting attempt. A failed report is logged and never replaces it.
    pub async fn guard<'c, F, Fut, T, E>(
        &self,
        context: &'c EventContext,
        handler: F,
    ) -> Result<Option<T>, E>
    where
        F: FnOnce(&'c EventContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ReportableError,
    {
        let (result, _report) = self.guard_with_report(context, handler).await;
        result
    }

    /// Same as [`InvocationGuard::guard`], also handing back the reporting result.
    pub async fn guard_with_report<'c, F, Fut, T, E>(
        &self,
        context: &'c EventContext,
        handler: F,
    ) -> (Result<Option<T>, E>, GuardReport)
    where
        F: FnOnce(&'c EventContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ReportableError,
    {
        if self.is_own_echo(context) {
            tracing::debug!(event = context.event_name(), "skipping self-echo event");
            return (
                Ok(None),
                GuardReport {
                    skipped_echo: true,
                    ..GuardReport::default()
                },
            );
        }

        let error = match handler(context).await {
            Ok(value) => return (Ok(Some(value)), GuardReport::default()),
            Err(error) => error,
        };

        let mut report = GuardReport::default();
        match self.report(context, &error).await {
            Ok(outcome) => report.outcome = Some(outcome),
            Err(report_error) => {
                tracing::error!(
                    event = context.event_name(),
                    error = %format!("{report_error:#}"),
                    "failed to report handler error"
                );
                report.report_error = Some(report_error);
            }
        }
        (Err(error), report)
    }

    async fn report<E>(&self, context: &EventContext, error: &E) -> Result<ReconcileOutcome>
    where
        E: ReportableError,
    {
        let repo = context.repo()?;
        self.reconciler
            .reconcile(context.tracker(), &repo, error)
            .await
    }
}
