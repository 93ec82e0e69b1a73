//! Error-interception layer for issue-tracker bots.
//!
//! Handler failures are fingerprinted, deduplicated against previously reported
//! tracking issues, and recorded as a new issue or an occurrence bump on an
//! existing one. The original handler error always propagates back to the host.

pub mod error_fingerprint;
pub mod event_context;
pub mod event_router;
pub mod invocation_guard;
pub mod issue_echo;
pub mod issue_render;
pub mod issue_tracker;
pub mod report_config;
pub mod tracker_reconciler;

pub use error_fingerprint::{fingerprint, normalize_error, Fingerprint, ReportableError};
pub use event_context::EventContext;
pub use event_router::{
    guard_handler, handler_fn, DispatchError, EventDispatcher, EventHandler, EventRouter,
    GuardedHandler, GuardedRouter,
};
pub use invocation_guard::{GuardReport, InvocationGuard};
pub use issue_echo::is_own_echo;
pub use issue_tracker::{
    CreateIssueRequest, EditIssueRequest, IssueLabel, IssueState, IssueTracker, RepoRef,
    RepoRefError, TrackedIssue,
};
pub use report_config::ReportConfig;
pub use tracker_reconciler::{ReconcileOutcome, TrackerReconciler};
