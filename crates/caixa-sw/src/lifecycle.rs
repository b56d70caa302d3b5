//! Install and activate: populating the current generation and retiring
//! the old ones.

use futures::future::try_join_all;
use tracing::{error, info, warn};

use crate::cache::CacheEntry;
use crate::error::{SwError, SwResult};
use crate::fetch::FetchRequest;
use crate::worker::PromiseWorker;

/// Service worker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceWorkerState {
    /// Created, no lifecycle event handled yet.
    #[default]
    Parsed,
    /// Installing (install event).
    Installing,
    /// Installed but waiting for activation.
    Installed,
    /// Activating (activate event).
    Activating,
    /// Active and controlling pages.
    Activated,
    /// Redundant (replaced or install failed).
    Redundant,
}

impl PromiseWorker {
    /// Handle the install event: fetch every manifest asset and commit them
    /// to the current cache store in one step. Any failed asset fails the
    /// whole population and nothing from this attempt is kept.
    ///
    /// Returns the number of assets stored.
    pub async fn install(&self) -> SwResult<usize> {
        self.set_state(ServiceWorkerState::Installing).await;
        info!(cache = %self.config.cache_name, "Service worker installing");

        let result = self.populate_cache().await;

        // Activation is requested whether or not population worked.
        if self.config.skip_waiting_on_install {
            self.skip_waiting();
        }

        match result {
            Ok(count) => {
                info!(cache = %self.config.cache_name, assets = count, "Precache complete");
                self.set_state(ServiceWorkerState::Installed).await;
                Ok(count)
            }
            Err(e) => {
                error!(cache = %self.config.cache_name, error = %e, "Precache failed");
                self.set_state(ServiceWorkerState::Redundant).await;
                Err(e)
            }
        }
    }

    async fn populate_cache(&self) -> SwResult<usize> {
        let urls = self.config.precache_urls()?;
        self.host.caches.write().await.open(&self.config.cache_name);
        info!(cache = %self.config.cache_name, assets = urls.len(), "Cache opened, adding assets");

        let fetches = urls.iter().map(|url| async move {
            let request = FetchRequest::get(url.clone());
            let response = self.host.network.fetch(&request).await.map_err(|e| {
                SwError::BulkPopulation {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            })?;
            if !response.ok() {
                return Err(SwError::BulkPopulation {
                    url: url.to_string(),
                    reason: format!("status {}", response.status),
                });
            }
            Ok(CacheEntry::from_response(&request, &response))
        });
        let entries = try_join_all(fetches).await?;

        let count = entries.len();
        self.host
            .caches
            .write()
            .await
            .open(&self.config.cache_name)
            .put_all(entries);
        Ok(count)
    }

    /// Handle the activate event: delete every store except the current
    /// generation, then claim open clients.
    ///
    /// Returns the names of the deleted stores.
    pub async fn activate(&self) -> SwResult<Vec<String>> {
        let state = self.state().await;
        if state != ServiceWorkerState::Installed {
            return Err(SwError::State(format!(
                "cannot activate a worker in state {state:?}"
            )));
        }

        self.set_state(ServiceWorkerState::Activating).await;
        info!(cache = %self.config.cache_name, "Service worker activating");

        let deleted = self.delete_stale_caches().await;

        match self.host.clients.claim(&self.config.origin).await {
            Ok(claimed) => info!(claimed, "Claimed clients"),
            Err(e) => warn!(error = %e, "Failed to claim clients"),
        }

        self.set_state(ServiceWorkerState::Activated).await;
        Ok(deleted)
    }

    async fn delete_stale_caches(&self) -> Vec<String> {
        let mut caches = self.host.caches.write().await;
        let stale: Vec<String> = caches
            .keys()
            .into_iter()
            .filter(|name| *name != self.config.cache_name)
            .map(String::from)
            .collect();

        for name in &stale {
            info!(cache = %name, "Removing stale cache");
            caches.delete(name);
        }
        stale
    }

    pub(crate) async fn mark_redundant(&self) {
        self.set_state(ServiceWorkerState::Redundant).await;
    }
}
