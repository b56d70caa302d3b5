//! Registration: the installing, waiting and active generations of the
//! worker for one scope, and the routing of host events between them.

use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::dispatch::{EventOutcome, MessageEvent, WorkerEvent};
use crate::error::{SwError, SwResult};
use crate::fetch::FetchRequest;
use crate::lifecycle::ServiceWorkerState;
use crate::push::{NotificationClickEvent, PushEvent};
use crate::worker::PromiseWorker;

/// A service worker registration.
#[derive(Debug)]
pub struct ServiceWorkerRegistration {
    /// Scope URL.
    pub scope: Url,

    /// Installing worker.
    installing: Option<Arc<PromiseWorker>>,

    /// Waiting worker (installed but not active).
    waiting: Option<Arc<PromiseWorker>>,

    /// Active worker.
    active: Option<Arc<PromiseWorker>>,
}

impl ServiceWorkerRegistration {
    /// Create a new registration.
    pub fn new(scope: Url) -> Self {
        Self {
            scope,
            installing: None,
            waiting: None,
            active: None,
        }
    }

    pub fn installing(&self) -> Option<&Arc<PromiseWorker>> {
        self.installing.as_ref()
    }

    pub fn waiting(&self) -> Option<&Arc<PromiseWorker>> {
        self.waiting.as_ref()
    }

    /// Get the active worker.
    pub fn active(&self) -> Option<&Arc<PromiseWorker>> {
        self.active.as_ref()
    }

    /// Install a new generation. It is activated straight away when it asked
    /// to skip waiting or when nothing is active yet; otherwise it waits.
    pub async fn update(&mut self, worker: Arc<PromiseWorker>) -> SwResult<ServiceWorkerState> {
        if !worker.config().is_same_origin(&self.scope) {
            return Err(SwError::Config(format!(
                "worker origin {} does not match scope {}",
                worker.config().origin,
                self.scope
            )));
        }

        info!(scope = %self.scope, cache = %worker.cache_name(), "Installing update");
        self.installing = Some(Arc::clone(&worker));
        let installed = worker.dispatch(WorkerEvent::Install).await;
        self.installing = None;
        installed?;

        if let Some(previous) = self.waiting.replace(worker) {
            previous.mark_redundant().await;
        }
        self.activate_if_ready().await
    }

    /// Activate the waiting worker if it asked to skip waiting or nothing
    /// else is active. Returns the state of the newest worker.
    async fn activate_if_ready(&mut self) -> SwResult<ServiceWorkerState> {
        let Some(waiting) = self.waiting.as_ref() else {
            return self.active_state().await;
        };
        if waiting.skip_waiting_requested() || self.active.is_none() {
            self.activate_waiting().await?;
            return self.active_state().await;
        }
        Ok(waiting.state().await)
    }

    async fn active_state(&self) -> SwResult<ServiceWorkerState> {
        match self.active.as_ref() {
            Some(active) => Ok(active.state().await),
            None => Err(SwError::State("no active worker".into())),
        }
    }

    /// Activate the waiting worker and retire the previous one.
    pub async fn activate_waiting(&mut self) -> SwResult<()> {
        let worker = self
            .waiting
            .take()
            .ok_or_else(|| SwError::State("no waiting worker".into()))?;

        if let Err(e) = worker.dispatch(WorkerEvent::Activate).await {
            warn!(cache = %worker.cache_name(), error = %e, "Activation failed");
            self.waiting = Some(worker);
            return Err(e);
        }

        if let Some(old) = self.active.replace(worker) {
            old.mark_redundant().await;
        }
        Ok(())
    }

    /// Called when every client of the old generation has gone away.
    pub async fn release_clients(&mut self) -> SwResult<()> {
        if self.waiting.is_some() {
            self.activate_waiting().await?;
        }
        Ok(())
    }

    /// Deliver a page message. A waiting worker hears it first, so that
    /// `SKIP_WAITING` can promote it.
    pub async fn post_message(&mut self, message: MessageEvent) -> SwResult<()> {
        let target = self
            .waiting
            .as_ref()
            .or(self.active.as_ref())
            .cloned()
            .ok_or_else(|| SwError::State("no worker to receive message".into()))?;

        target.dispatch(WorkerEvent::Message(message)).await?;
        self.activate_if_ready().await?;
        Ok(())
    }

    /// Route a fetch to the active worker.
    pub async fn fetch(&self, request: FetchRequest) -> SwResult<EventOutcome> {
        match self.active.as_ref() {
            Some(active) => active.dispatch(WorkerEvent::Fetch(request)).await,
            None => Ok(EventOutcome::Passthrough),
        }
    }

    /// Route a push message to the active worker.
    pub async fn push(&self, event: PushEvent) -> SwResult<EventOutcome> {
        self.require_active()?.dispatch(WorkerEvent::Push(event)).await
    }

    /// Route a notification click to the active worker.
    pub async fn notification_click(&self, event: NotificationClickEvent) -> SwResult<EventOutcome> {
        self.require_active()?
            .dispatch(WorkerEvent::NotificationClick(event))
            .await
    }

    fn require_active(&self) -> SwResult<&Arc<PromiseWorker>> {
        self.active
            .as_ref()
            .ok_or_else(|| SwError::State("no active worker".into()))
    }

    /// Unregister: every worker becomes redundant.
    pub async fn unregister(&mut self) {
        for worker in [self.installing.take(), self.waiting.take(), self.active.take()]
            .into_iter()
            .flatten()
        {
            worker.mark_redundant().await;
        }
    }
}
