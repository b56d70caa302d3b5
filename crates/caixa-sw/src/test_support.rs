//! Scripted hosts for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hashbrown::HashMap;
use url::Url;

use crate::cache::CacheStorage;
use crate::clients::Clients;
use crate::config::WorkerConfig;
use crate::error::{SwError, SwResult};
use crate::fetch::{FetchRequest, FetchResponse};
use crate::lifecycle::ServiceWorkerState;
use crate::network::Network;
use crate::notification::NotificationCenter;
use crate::worker::{PromiseWorker, WorkerHost};

pub const ORIGIN: &str = "https://caixa.example/";

pub fn scope() -> Url {
    Url::parse(ORIGIN).unwrap()
}

/// Serves a fixed set of paths, 404 for the rest, and can be cut off.
#[derive(Clone, Default)]
pub struct ScriptedNetwork {
    responses: Arc<Mutex<HashMap<String, FetchResponse>>>,
    offline: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedNetwork {
    pub fn serving(paths: &[&str]) -> Self {
        let network = Self::default();
        for path in paths {
            network.respond(path, FetchResponse::ok_with(format!("body of {path}")));
        }
        network
    }

    pub fn respond(&self, path: &str, response: FetchResponse) {
        self.responses.lock().unwrap().insert(path.to_string(), response);
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &FetchRequest) -> SwResult<FetchResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(SwError::Network("offline".into()));
        }
        let response = self
            .responses
            .lock()
            .unwrap()
            .get(request.url.path())
            .cloned()
            .unwrap_or_else(|| FetchResponse::new(404, "not found"));
        Ok(response.with_url(request.url.clone()))
    }
}

pub fn host_with(network: ScriptedNetwork) -> (WorkerHost, Arc<Clients>, Arc<NotificationCenter>) {
    let clients = Arc::new(Clients::new());
    let center = Arc::new(NotificationCenter::new());
    let host = WorkerHost::new(
        CacheStorage::new().shared(),
        Arc::new(network),
        center.clone(),
        clients.clone(),
    );
    (host, clients, center)
}

pub fn worker_with(
    network: ScriptedNetwork,
    precache: &[&str],
) -> (PromiseWorker, Arc<Clients>, Arc<NotificationCenter>) {
    let (host, clients, center) = host_with(network);
    let config = WorkerConfig::new(scope()).with_precache(precache.iter().copied());
    let worker = PromiseWorker::new(config, host).unwrap();
    (worker, clients, center)
}

pub async fn activated_worker(
    network: ScriptedNetwork,
    precache: &[&str],
) -> (PromiseWorker, Arc<Clients>, Arc<NotificationCenter>) {
    let (worker, clients, center) = worker_with(network, precache);
    worker.install().await.unwrap();
    worker.activate().await.unwrap();
    assert_eq!(worker.state().await, ServiceWorkerState::Activated);
    (worker, clients, center)
}
