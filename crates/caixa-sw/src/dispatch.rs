//! Event dispatch table.
//!
//! Every host event kind maps to one handler. A handler returns a boxed
//! future; the host keeps the worker alive until it resolves.

use futures::future::BoxFuture;
use hashbrown::HashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{SwError, SwResult};
use crate::fetch::{FetchRequest, FetchResponse};
use crate::push::{NotificationClickEvent, PushEvent};
use crate::worker::PromiseWorker;

/// Kinds of host events the worker handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Message,
    Push,
    NotificationClick,
}

/// A message posted to the worker by a page.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub data: Value,
}

impl MessageEvent {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// The control message pages send to activate a waiting update.
    pub fn skip_waiting() -> Self {
        Self::new(serde_json::json!({ "type": "SKIP_WAITING" }))
    }

    fn is_skip_waiting(&self) -> bool {
        self.data.get("type").and_then(Value::as_str) == Some("SKIP_WAITING")
    }
}

/// An event delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(FetchRequest),
    Message(MessageEvent),
    Push(PushEvent),
    NotificationClick(NotificationClickEvent),
}

impl WorkerEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            WorkerEvent::Install => EventKind::Install,
            WorkerEvent::Activate => EventKind::Activate,
            WorkerEvent::Fetch(_) => EventKind::Fetch,
            WorkerEvent::Message(_) => EventKind::Message,
            WorkerEvent::Push(_) => EventKind::Push,
            WorkerEvent::NotificationClick(_) => EventKind::NotificationClick,
        }
    }
}

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// The handler finished its work.
    Completed,
    /// The fetch handler answered the request.
    RespondWith(FetchResponse),
    /// The request was not intercepted; default browser handling applies.
    Passthrough,
}

/// An event handler. The returned future borrows the worker.
pub type Handler = for<'a> fn(&'a PromiseWorker, WorkerEvent) -> BoxFuture<'a, SwResult<EventOutcome>>;

/// Maps each event kind to its handler.
#[derive(Clone)]
pub struct DispatchTable {
    handlers: HashMap<EventKind, Handler>,
}

impl DispatchTable {
    /// An empty table.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// The caixa-promessa handlers for all six event kinds.
    pub fn standard() -> Self {
        let mut table = Self::new();
        table.register(EventKind::Install, on_install);
        table.register(EventKind::Activate, on_activate);
        table.register(EventKind::Fetch, on_fetch);
        table.register(EventKind::Message, on_message);
        table.register(EventKind::Push, on_push);
        table.register(EventKind::NotificationClick, on_notification_click);
        table
    }

    /// Register a handler, replacing any previous one for `kind`.
    pub fn register(&mut self, kind: EventKind, handler: Handler) {
        self.handlers.insert(kind, handler);
    }

    pub fn get(&self, kind: EventKind) -> Option<Handler> {
        self.handlers.get(&kind).copied()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for DispatchTable {
    fn default() -> Self {
        Self::standard()
    }
}

fn mismatch(expected: EventKind, event: &WorkerEvent) -> SwError {
    SwError::State(format!(
        "{:?} handler received {:?} event",
        expected,
        event.kind()
    ))
}

fn on_install(worker: &PromiseWorker, _event: WorkerEvent) -> BoxFuture<'_, SwResult<EventOutcome>> {
    Box::pin(async move {
        worker.install().await?;
        Ok(EventOutcome::Completed)
    })
}

fn on_activate(worker: &PromiseWorker, _event: WorkerEvent) -> BoxFuture<'_, SwResult<EventOutcome>> {
    Box::pin(async move {
        worker.activate().await?;
        Ok(EventOutcome::Completed)
    })
}

fn on_fetch(worker: &PromiseWorker, event: WorkerEvent) -> BoxFuture<'_, SwResult<EventOutcome>> {
    Box::pin(async move {
        match event {
            WorkerEvent::Fetch(request) => Ok(worker.handle_fetch(request).await),
            other => Err(mismatch(EventKind::Fetch, &other)),
        }
    })
}

fn on_message(worker: &PromiseWorker, event: WorkerEvent) -> BoxFuture<'_, SwResult<EventOutcome>> {
    Box::pin(async move {
        match event {
            WorkerEvent::Message(message) => {
                if message.is_skip_waiting() {
                    worker.skip_waiting();
                } else {
                    debug!(data = %message.data, "Ignoring message");
                }
                Ok(EventOutcome::Completed)
            }
            other => Err(mismatch(EventKind::Message, &other)),
        }
    })
}

fn on_push(worker: &PromiseWorker, event: WorkerEvent) -> BoxFuture<'_, SwResult<EventOutcome>> {
    Box::pin(async move {
        match event {
            WorkerEvent::Push(push) => {
                worker.handle_push(push).await?;
                Ok(EventOutcome::Completed)
            }
            other => Err(mismatch(EventKind::Push, &other)),
        }
    })
}

fn on_notification_click(
    worker: &PromiseWorker,
    event: WorkerEvent,
) -> BoxFuture<'_, SwResult<EventOutcome>> {
    Box::pin(async move {
        match event {
            WorkerEvent::NotificationClick(click) => {
                worker.handle_notification_click(click).await?;
                Ok(EventOutcome::Completed)
            }
            other => Err(mismatch(EventKind::NotificationClick, &other)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{worker_with, ScriptedNetwork, ORIGIN};
    use url::Url;

    #[test]
    fn test_standard_table_covers_every_kind() {
        let table = DispatchTable::standard();
        assert_eq!(table.len(), 6);
        for kind in [
            EventKind::Install,
            EventKind::Activate,
            EventKind::Fetch,
            EventKind::Message,
            EventKind::Push,
            EventKind::NotificationClick,
        ] {
            assert!(table.get(kind).is_some(), "missing {kind:?}");
        }
    }

    #[test]
    fn test_skip_waiting_message_detection() {
        assert!(MessageEvent::skip_waiting().is_skip_waiting());
        assert!(!MessageEvent::new(serde_json::json!({"type": "PING"})).is_skip_waiting());
        assert!(!MessageEvent::new(serde_json::json!("SKIP_WAITING")).is_skip_waiting());
    }

    #[tokio::test]
    async fn test_message_dispatch_sets_skip_waiting() {
        let (worker, _, _) = worker_with(ScriptedNetwork::serving(&[]), &[]);
        assert!(!worker.skip_waiting_requested());

        worker
            .dispatch(WorkerEvent::Message(MessageEvent::new(serde_json::json!({"type": "HELLO"}))))
            .await
            .unwrap();
        assert!(!worker.skip_waiting_requested());

        let outcome = worker
            .dispatch(WorkerEvent::Message(MessageEvent::skip_waiting()))
            .await
            .unwrap();
        assert_eq!(outcome, EventOutcome::Completed);
        assert!(worker.skip_waiting_requested());
    }

    #[tokio::test]
    async fn test_handler_rejects_wrong_event() {
        let (worker, _, _) = worker_with(ScriptedNetwork::serving(&[]), &[]);
        let result = on_push(&worker, WorkerEvent::Install).await;
        assert!(matches!(result, Err(SwError::State(_))));
    }

    #[tokio::test]
    async fn test_full_lifecycle_through_dispatch() {
        let network = ScriptedNetwork::serving(&["/", "/index.html"]);
        let (worker, _, _) = worker_with(network, &["/", "/index.html"]);

        assert_eq!(worker.dispatch(WorkerEvent::Install).await.unwrap(), EventOutcome::Completed);
        assert_eq!(worker.dispatch(WorkerEvent::Activate).await.unwrap(), EventOutcome::Completed);

        let url = Url::parse(ORIGIN).unwrap().join("/index.html").unwrap();
        match worker.dispatch(WorkerEvent::Fetch(FetchRequest::get(url))).await.unwrap() {
            EventOutcome::RespondWith(response) => assert!(response.from_cache),
            other => panic!("expected a response, got {other:?}"),
        }
    }
}
