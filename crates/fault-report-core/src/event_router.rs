//! Handler registration and the interceptor that guards every registration.
//!
//! `EventRouter` is the host's "subscribe callback to named event" surface.
//! Wrapping a router in [`GuardedRouter`] once makes every later `on` call
//! register a [`GuardedHandler`] instead of the raw handler. The wrapper calls
//! the original handler through its own `&self`, so handler state is unchanged.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use thiserror::Error;

use crate::event_context::EventContext;
use crate::invocation_guard::InvocationGuard;
use crate::report_config::ReportConfig;

#[async_trait]
/// Callback invoked for a dispatched event.
pub trait EventHandler: Send + Sync {
    async fn handle(&self, context: &EventContext) -> Result<()>;
}

struct FnHandler<F, Fut> {
    callback: F,
    _future: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F, Fut>
where
    F: Fn(EventContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn handle(&self, context: &EventContext) -> Result<()> {
        (self.callback)(context.clone()).await
    }
}

/// Adapts an async closure into a shareable handler.
pub fn handler_fn<F, Fut>(callback: F) -> Arc<dyn EventHandler>
where
    F: Fn(EventContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler {
        callback,
        _future: PhantomData,
    })
}

/// Registration entry point of an event host.
pub trait EventRouter {
    fn on(&mut self, event: &str, handler: Arc<dyn EventHandler>);

    fn on_each(&mut self, events: &[&str], handler: Arc<dyn EventHandler>) {
        for event in events {
            self.on(event, Arc::clone(&handler));
        }
    }
}

/// Handler wrapper that routes failures through an [`InvocationGuard`].
pub struct GuardedHandler {
    guard: Arc<InvocationGuard>,
    inner: Arc<dyn EventHandler>,
}

impl GuardedHandler {
    pub fn new(guard: Arc<InvocationGuard>, inner: Arc<dyn EventHandler>) -> Self {
        Self { guard, inner }
    }
}

#[async_trait]
impl EventHandler for GuardedHandler {
    async fn handle(&self, context: &EventContext) -> Result<()> {
        self.guard
            .guard(context, |context| self.inner.handle(context))
            .await
            .map(|_| ())
    }
}

/// Guards a single handler without taking over a router.
pub fn guard_handler(
    guard: Arc<InvocationGuard>,
    handler: Arc<dyn EventHandler>,
) -> Arc<dyn EventHandler> {
    Arc::new(GuardedHandler::new(guard, handler))
}

/// Router decorator that guards every handler registered through it.
pub struct GuardedRouter<R> {
    inner: R,
    guard: Arc<InvocationGuard>,
}

impl<R: EventRouter> GuardedRouter<R> {
    pub fn new(inner: R, guard: Arc<InvocationGuard>) -> Self {
        Self { inner, guard }
    }

    pub fn install(inner: R, config: ReportConfig) -> Self {
        Self::new(inner, Arc::new(InvocationGuard::new(Arc::new(config))))
    }

    pub fn guard(&self) -> &Arc<InvocationGuard> {
        &self.guard
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: EventRouter> EventRouter for GuardedRouter<R> {
    fn on(&mut self, event: &str, handler: Arc<dyn EventHandler>) {
        self.inner
            .on(event, guard_handler(Arc::clone(&self.guard), handler));
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{} handler(s) failed for event '{event}'", .errors.len())]
    Handlers {
        event: String,
        errors: Vec<anyhow::Error>,
    },
}

impl DispatchError {
    pub fn errors(&self) -> &[anyhow::Error] {
        match self {
            Self::Handlers { errors, .. } => errors,
        }
    }

    pub fn into_errors(self) -> Vec<anyhow::Error> {
        match self {
            Self::Handlers { errors, .. } => errors,
        }
    }
}

#[derive(Clone, Default)]
/// In-process event host.
///
/// A context named `issues.opened` reaches handlers registered for
/// `issues.opened` and for `issues`. All matching handlers run concurrently.
pub struct EventDispatcher {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler_count(&self, event: &str) -> usize {
        self.handlers.get(event).map(Vec::len).unwrap_or(0)
    }

    fn matching_handlers(&self, context: &EventContext) -> Vec<Arc<dyn EventHandler>> {
        let full = context.event_name();
        let base = context.base_event_name();
        let mut matched = self.handlers.get(full).cloned().unwrap_or_default();
        if base != full {
            if let Some(handlers) = self.handlers.get(base) {
                matched.extend(handlers.iter().cloned());
            }
        }
        matched
    }

    /// Runs every matching handler and returns how many ran.
    pub async fn dispatch(&self, context: &EventContext) -> Result<usize, DispatchError> {
        let handlers = self.matching_handlers(context);
        let results = join_all(handlers.iter().map(|handler| handler.handle(context))).await;
        let handled = results.len();
        let errors = results
            .into_iter()
            .filter_map(|result| result.err())
            .inspect(|error| {
                tracing::error!(
                    event = context.event_name(),
                    error = %format!("{error:#}"),
                    "event handler failed"
                );
            })
            .collect::<Vec<_>>();
        if errors.is_empty() {
            Ok(handled)
        } else {
            Err(DispatchError::Handlers {
                event: context.event_name().to_string(),
                errors,
            })
        }
    }
}

impl EventRouter for EventDispatcher {
    fn on(&mut self, event: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut events = self.handlers.keys().collect::<Vec<_>>();
        events.sort();
        f.debug_struct("EventDispatcher")
            .field("events", &events)
            .finish()
    }
}
