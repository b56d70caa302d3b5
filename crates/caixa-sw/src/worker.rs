//! The worker instance and the host handles it runs against.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::cache::SharedCacheStorage;
use crate::clients::ClientHost;
use crate::config::WorkerConfig;
use crate::dispatch::{DispatchTable, EventOutcome, WorkerEvent};
use crate::error::SwResult;
use crate::lifecycle::ServiceWorkerState;
use crate::network::Network;
use crate::notification::Notifier;

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceWorkerId(u64);

impl ServiceWorkerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Platform services the worker calls into.
#[derive(Clone)]
pub struct WorkerHost {
    pub caches: SharedCacheStorage,
    pub network: Arc<dyn Network>,
    pub notifier: Arc<dyn Notifier>,
    pub clients: Arc<dyn ClientHost>,
}

impl WorkerHost {
    pub fn new(
        caches: SharedCacheStorage,
        network: Arc<dyn Network>,
        notifier: Arc<dyn Notifier>,
        clients: Arc<dyn ClientHost>,
    ) -> Self {
        Self {
            caches,
            network,
            notifier,
            clients,
        }
    }
}

/// One generation of the caixa-promessa worker.
pub struct PromiseWorker {
    id: ServiceWorkerId,
    pub(crate) config: WorkerConfig,
    pub(crate) host: WorkerHost,
    state: RwLock<ServiceWorkerState>,
    skip_waiting: AtomicBool,
    handlers: DispatchTable,
}

impl PromiseWorker {
    /// Create a worker after validating its configuration.
    pub fn new(config: WorkerConfig, host: WorkerHost) -> SwResult<Self> {
        config.validate()?;
        let worker = Self {
            id: ServiceWorkerId::new(),
            config,
            host,
            state: RwLock::new(ServiceWorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
            handlers: DispatchTable::standard(),
        };
        debug!(
            worker = worker.id.raw(),
            cache = %worker.config.cache_name,
            "Service worker parsed"
        );
        Ok(worker)
    }

    pub fn id(&self) -> ServiceWorkerId {
        self.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Generation identifier this worker keeps alive.
    pub fn cache_name(&self) -> &str {
        &self.config.cache_name
    }

    pub fn caches(&self) -> &SharedCacheStorage {
        &self.host.caches
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ServiceWorkerState {
        *self.state.read().await
    }

    pub(crate) async fn set_state(&self, state: ServiceWorkerState) {
        *self.state.write().await = state;
        debug!(worker = self.id.raw(), state = ?state, "State changed");
    }

    /// Ask the host to activate this worker without waiting for the old
    /// generation's clients to close.
    pub fn skip_waiting(&self) {
        if !self.skip_waiting.swap(true, Ordering::SeqCst) {
            info!(worker = self.id.raw(), "Skip waiting requested");
        }
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Run the handler registered for the event and wait for it, which is
    /// the worker's extended lifetime for that event.
    pub async fn dispatch(&self, event: WorkerEvent) -> SwResult<EventOutcome> {
        let kind = event.kind();
        match self.handlers.get(kind) {
            Some(handler) => {
                debug!(worker = self.id.raw(), kind = ?kind, "Dispatching event");
                handler(self, event).await
            }
            None => {
                debug!(kind = ?kind, "No handler registered");
                Ok(EventOutcome::Passthrough)
            }
        }
    }
}

impl fmt::Debug for PromiseWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseWorker")
            .field("id", &self.id)
            .field("cache_name", &self.config.cache_name)
            .field("origin", &self.config.origin.as_str())
            .field("skip_waiting", &self.skip_waiting_requested())
            .finish()
    }
}
