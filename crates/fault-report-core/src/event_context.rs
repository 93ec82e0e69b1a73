use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::issue_tracker::{IssueTracker, RepoRef, RepoRefError};

#[derive(Clone)]
/// Per-delivery context handed to every handler of one event.
pub struct EventContext {
    name: String,
    payload: Value,
    tracker: Arc<dyn IssueTracker>,
}

impl EventContext {
    pub fn new(name: impl Into<String>, payload: Value, tracker: Arc<dyn IssueTracker>) -> Self {
        Self {
            name: name.into(),
            payload,
            tracker,
        }
    }

    /// Full event name, e.g. `issues.opened`.
    pub fn event_name(&self) -> &str {
        &self.name
    }

    /// Event name without its action suffix, e.g. `issues`.
    pub fn base_event_name(&self) -> &str {
        self.name
            .split_once('.')
            .map(|(base, _)| base)
            .unwrap_or(self.name.as_str())
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn tracker(&self) -> &dyn IssueTracker {
        self.tracker.as_ref()
    }

    pub fn repo(&self) -> Result<RepoRef, RepoRefError> {
        RepoRef::from_payload(&self.payload)
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext")
            .field("name", &self.name)
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}
