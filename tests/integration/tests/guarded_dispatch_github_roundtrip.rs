use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use fault_report_core::{
    EventContext, EventDispatcher, EventHandler, EventRouter, GuardedRouter, IssueTracker,
    ReportConfig,
};
use fault_report_github::{GithubIssueTracker, GithubTrackerConfig};
use httpmock::prelude::*;
use serde_json::{json, Value};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Label-triage handler that fails on every delivery and counts its own calls.
struct TriageHandler {
    deliveries: AtomicUsize,
}

impl TriageHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            deliveries: AtomicUsize::new(0),
        })
    }

    fn deliveries(&self) -> usize {
        self.deliveries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for TriageHandler {
    async fn handle(&self, context: &EventContext) -> Result<()> {
        self.deliveries.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!(
            "label lookup failed for {}",
            context.event_name()
        ))
    }
}

fn github_tracker(server: &MockServer) -> Arc<dyn IssueTracker> {
    Arc::new(
        GithubIssueTracker::new(GithubTrackerConfig {
            api_base: server.base_url(),
            token: "installation-token".to_string(),
            request_timeout_ms: 3_000,
            retry_max_attempts: 2,
            retry_base_delay_ms: 1,
        })
        .expect("github tracker"),
    )
}

fn issue_opened_payload(title: &str) -> Value {
    json!({
        "action": "opened",
        "issue": {"number": 31, "title": title, "state": "open"},
        "repository": {"name": "bot", "owner": {"login": "octo"}},
        "sender": {"login": "alice"}
    })
}

fn guarded_dispatcher(config: ReportConfig, handler: Arc<TriageHandler>) -> EventDispatcher {
    let mut router = GuardedRouter::install(EventDispatcher::new(), config);
    router.on("issues.opened", handler);
    router.into_inner()
}

#[tokio::test]
async fn integration_first_failure_creates_tracking_issue_and_reraises() {
    init_tracing();
    let server = MockServer::start();
    let search = server.mock(|when, then| {
        when.method(GET)
            .path("/search/issues")
            .query_param_exists("q");
        then.status(200)
            .json_body(json!({"total_count": 0, "items": []}));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/octo/bot/issues")
            .body_includes("] Bot error\"")
            .body_includes("label lookup failed for issues.opened")
            .body_includes("Occurrences: 1")
            .body_includes("\"labels\":[\"bug\",\"automated\"]");
        then.status(201).json_body(json!({
            "number": 90,
            "title": "[a1b2c3d4] Bot error",
            "body": "An error occurred",
            "state": "open",
            "labels": [{"name": "bug"}, {"name": "automated"}]
        }));
    });

    let handler = TriageHandler::new();
    let config = ReportConfig::default()
        .with_title("Bot error")
        .with_labels(["bug", "automated"]);
    let dispatcher = guarded_dispatcher(config, handler.clone());
    let context = EventContext::new(
        "issues.opened",
        issue_opened_payload("Broken build"),
        github_tracker(&server),
    );

    let error = dispatcher
        .dispatch(&context)
        .await
        .expect_err("handler error reaches the host");

    assert_eq!(
        error.errors()[0].to_string(),
        "label lookup failed for issues.opened"
    );
    assert_eq!(handler.deliveries(), 1);
    search.assert_calls(1);
    create.assert_calls(1);
}

#[tokio::test]
async fn integration_recurrence_bumps_counter_and_reopens_when_enabled() {
    init_tracing();
    let server = MockServer::start();
    let prior_body = "An error occurred\n\n```\nlabel lookup failed\n```\n\nOccurrences: 4";
    let search = server.mock(|when, then| {
        when.method(GET).path("/search/issues");
        then.status(200).json_body(json!({
            "total_count": 1,
            "items": [{
                "number": 12,
                "title": "[a1b2c3d4] Bot error",
                "body": prior_body,
                "state": "closed",
                "labels": [{"name": "bug"}]
            }]
        }));
    });
    let edit = server.mock(|when, then| {
        when.method(PATCH)
            .path("/repos/octo/bot/issues/12")
            .json_body(json!({
                "body": "An error occurred\n\n```\nlabel lookup failed\n```\n\nOccurrences: 5",
                "state": "open"
            }));
        then.status(200).json_body(json!({
            "number": 12,
            "title": "[a1b2c3d4] Bot error",
            "body": "Occurrences: 5",
            "state": "open"
        }));
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/repos/octo/bot/issues");
        then.status(201).json_body(json!({}));
    });

    let handler = TriageHandler::new();
    let config = ReportConfig::default()
        .with_title("Bot error")
        .with_reopen(true);
    let dispatcher = guarded_dispatcher(config, handler.clone());
    let context = EventContext::new(
        "issues.opened",
        issue_opened_payload("Broken build"),
        github_tracker(&server),
    );

    dispatcher
        .dispatch(&context)
        .await
        .expect_err("handler error reaches the host");

    search.assert_calls(1);
    edit.assert_calls(1);
    create.assert_calls(0);
}

#[tokio::test]
async fn regression_same_fingerprint_in_another_repository_opens_local_issue() {
    init_tracing();
    let server = MockServer::start();
    let search = server.mock(|when, then| {
        when.method(GET).path("/search/issues");
        then.status(200).json_body(json!({
            "total_count": 1,
            "items": [{
                "number": 12,
                "repository_url": "https://api.github.com/repos/someone-else/other-app",
                "title": "[a1b2c3d4] Bot error",
                "body": "foreign body\n\nOccurrences: 40",
                "state": "open"
            }]
        }));
    });
    let foreign_edit = server.mock(|when, then| {
        when.method(PATCH).path("/repos/octo/bot/issues/12");
        then.status(200).json_body(json!({}));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/repos/octo/bot/issues")
            .body_includes("Occurrences: 1");
        then.status(201).json_body(json!({
            "number": 91,
            "title": "[a1b2c3d4] Bot error",
            "body": "Occurrences: 1",
            "state": "open"
        }));
    });

    let handler = TriageHandler::new();
    let dispatcher = guarded_dispatcher(ReportConfig::default().with_title("Bot error"), handler);
    let context = EventContext::new(
        "issues.opened",
        issue_opened_payload("Broken build"),
        github_tracker(&server),
    );

    dispatcher
        .dispatch(&context)
        .await
        .expect_err("handler error reaches the host");

    search.assert_calls(1);
    foreign_edit.assert_calls(0);
    create.assert_calls(1);
}

#[tokio::test]
async fn integration_self_echo_event_skips_handler_and_tracker() {
    init_tracing();
    let server = MockServer::start();
    let any_request = server.mock(|_when, then| {
        then.status(500);
    });

    let handler = TriageHandler::new();
    let dispatcher = guarded_dispatcher(
        ReportConfig::default().with_title("Bot error"),
        handler.clone(),
    );
    let context = EventContext::new(
        "issues.opened",
        issue_opened_payload("[a1b2c3d4] Bot error"),
        github_tracker(&server),
    );

    let handled = dispatcher.dispatch(&context).await.expect("echo is ignored");

    assert_eq!(handled, 1);
    assert_eq!(handler.deliveries(), 0);
    any_request.assert_calls(0);
}

#[tokio::test]
async fn regression_reporting_outage_still_surfaces_original_error() {
    init_tracing();
    let server = MockServer::start();
    let search = server.mock(|when, then| {
        when.method(GET).path("/search/issues");
        then.status(502).body("bad gateway");
    });
    let create = server.mock(|when, then| {
        when.method(POST).path("/repos/octo/bot/issues");
        then.status(201).json_body(json!({}));
    });

    let handler = TriageHandler::new();
    let dispatcher = guarded_dispatcher(ReportConfig::default(), handler.clone());
    let context = EventContext::new(
        "issues.opened",
        issue_opened_payload("Broken build"),
        github_tracker(&server),
    );

    let error = dispatcher
        .dispatch(&context)
        .await
        .expect_err("original error must not be masked");

    assert_eq!(error.errors().len(), 1);
    assert_eq!(
        error.errors()[0].to_string(),
        "label lookup failed for issues.opened"
    );
    search.assert_calls(2);
    create.assert_calls(0);
}
