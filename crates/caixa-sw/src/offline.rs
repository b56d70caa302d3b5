//! Cache-first serving of intercepted requests.

use tracing::{debug, trace, warn};
use url::Url;

use crate::cache::CacheEntry;
use crate::dispatch::EventOutcome;
use crate::fetch::{FetchRequest, FetchResponse};
use crate::lifecycle::ServiceWorkerState;
use crate::worker::PromiseWorker;

impl PromiseWorker {
    /// Only same-origin GET requests are intercepted.
    pub fn intercepts(&self, request: &FetchRequest) -> bool {
        request.is_get() && self.config.is_same_origin(&request.url)
    }

    /// Handle a fetch event. Requests the worker does not intercept, or that
    /// reach it before it is active, pass through to the browser.
    pub async fn handle_fetch(&self, request: FetchRequest) -> EventOutcome {
        if !self.intercepts(&request) {
            trace!(url = %request.url, method = %request.method, "Not intercepted");
            return EventOutcome::Passthrough;
        }
        let state = self.state().await;
        if state != ServiceWorkerState::Activated {
            debug!(url = %request.url, state = ?state, "Worker not active, passing through");
            return EventOutcome::Passthrough;
        }
        EventOutcome::RespondWith(self.cache_first(&request).await)
    }

    /// Serve from cache when present, otherwise from the network, storing
    /// successful same-origin responses for next time.
    pub async fn cache_first(&self, request: &FetchRequest) -> FetchResponse {
        if let Some(cached) = self.lookup(&request.url).await {
            debug!(url = %request.url, "Serving from cache");
            return cached;
        }

        match self.host.network.fetch(request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    self.store(request, &response).await;
                } else {
                    trace!(
                        url = %request.url,
                        status = response.status,
                        kind = ?response.response_type,
                        "Response not cacheable"
                    );
                }
                response
            }
            Err(e) => {
                warn!(url = %request.url, error = %e, "Network fetch failed");
                self.offline_response(request).await
            }
        }
    }

    async fn lookup(&self, url: &Url) -> Option<FetchResponse> {
        self.host
            .caches
            .read()
            .await
            .match_request(url)
            .map(FetchResponse::from_cache)
    }

    async fn store(&self, request: &FetchRequest, response: &FetchResponse) {
        let entry = CacheEntry::from_response(request, response);
        self.host
            .caches
            .write()
            .await
            .open(&self.config.cache_name)
            .put(entry);
        debug!(url = %request.url, cache = %self.config.cache_name, "Cached network response");
    }

    /// Navigations fall back to the cached root document; everything else
    /// gets a synthetic 503.
    async fn offline_response(&self, request: &FetchRequest) -> FetchResponse {
        if request.is_navigation() {
            match self.config.resolve(&self.config.offline_fallback) {
                Ok(fallback) => {
                    if let Some(cached) = self.lookup(&fallback).await {
                        debug!(url = %request.url, fallback = %fallback, "Serving offline document");
                        return cached;
                    }
                    warn!(fallback = %fallback, "Offline document is not cached");
                }
                Err(e) => warn!(error = %e, "Invalid offline fallback"),
            }
        }
        FetchResponse::offline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::ResponseType;
    use crate::test_support::{activated_worker, ScriptedNetwork};

    fn url(path: &str) -> Url {
        Url::parse(crate::test_support::ORIGIN).unwrap().join(path).unwrap()
    }

    #[tokio::test]
    async fn test_cross_origin_and_post_pass_through() {
        let network = ScriptedNetwork::serving(&["/"]);
        let (worker, _, _) = activated_worker(network.clone(), &["/"]).await;

        let cross = FetchRequest::get(Url::parse("https://fonts.example/font.woff2").unwrap());
        assert_eq!(worker.handle_fetch(cross).await, EventOutcome::Passthrough);

        let post = FetchRequest::with_method(url("/api"), "POST");
        assert_eq!(worker.handle_fetch(post).await, EventOutcome::Passthrough);

        // Only the install fetch reached the network.
        assert_eq!(network.calls(), 1);
    }

    #[tokio::test]
    async fn test_inactive_worker_passes_through() {
        let network = ScriptedNetwork::serving(&["/"]);
        let (worker, _, _) = crate::test_support::worker_with(network, &["/"]);
        let outcome = worker.handle_fetch(FetchRequest::get(url("/"))).await;
        assert_eq!(outcome, EventOutcome::Passthrough);
    }

    #[tokio::test]
    async fn test_opaque_and_error_responses_are_not_cached() {
        let network = ScriptedNetwork::serving(&["/"]);
        network.respond("/cdn.js", FetchResponse::ok_with("x").with_type(ResponseType::Opaque));
        let (worker, _, _) = activated_worker(network.clone(), &["/"]).await;

        worker.cache_first(&FetchRequest::get(url("/cdn.js"))).await;
        worker.cache_first(&FetchRequest::get(url("/missing.png"))).await;

        let caches = worker.caches().read().await;
        assert!(caches.match_request(&url("/cdn.js")).is_none());
        assert!(caches.match_request(&url("/missing.png")).is_none());
    }

    #[tokio::test]
    async fn test_offline_non_navigation_gets_503() {
        let network = ScriptedNetwork::serving(&["/", "/index.html"]);
        let (worker, _, _) = activated_worker(network.clone(), &["/", "/index.html"]).await;
        network.set_offline(true);

        let response = worker.cache_first(&FetchRequest::get(url("/nao-existe.json"))).await;
        assert_eq!(response.status, 503);
        assert_eq!(response.response_type, ResponseType::Error);
    }

    #[tokio::test]
    async fn test_offline_navigation_without_fallback_gets_503() {
        let network = ScriptedNetwork::serving(&["/"]);
        let (worker, _, _) = activated_worker(network.clone(), &["/"]).await;
        network.set_offline(true);

        let response = worker.cache_first(&FetchRequest::navigate(url("/sobre"))).await;
        assert_eq!(response.status, 503);
    }
}
