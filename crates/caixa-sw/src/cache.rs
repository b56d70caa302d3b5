//! Named cache stores.
//!
//! `CacheStorage` plays the part of the host's `caches` global: a set of
//! named [`Cache`] instances, each an opaque request URL → response map.
//! The worker only opens, reads, writes and deletes them; it never looks at
//! entries of a store it did not ask for.
//!
//! ```text
//! CacheStorage (caches)
//!     ├── "caixa-promessa-v1"  (stale, deleted on activate)
//!     └── "caixa-promessa-v2"
//!             └── request URL → CacheEntry
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::{SwError, SwResult};
use crate::fetch::{FetchRequest, FetchResponse, ResponseType};

/// Cache storage shared between the worker's concurrently running handlers.
pub type SharedCacheStorage = Arc<RwLock<CacheStorage>>;

/// Key under which a request is stored. Fragments never reach the network,
/// so they are not part of the key.
pub fn cache_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.into()
}

/// A cached request/response pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Request URL.
    pub url: String,

    /// Request method.
    pub method: String,

    /// Response status.
    pub status: u16,

    /// Response status text.
    #[serde(default)]
    pub status_text: String,

    /// Response type at the time it was stored.
    #[serde(default)]
    pub response_type: ResponseType,

    /// Response headers.
    pub headers: HashMap<String, String>,

    /// Response body.
    pub body: Vec<u8>,

    /// Cached at timestamp (ms since epoch).
    pub cached_at: u64,
}

impl CacheEntry {
    /// Store a copy of `response` for `request`.
    pub fn from_response(request: &FetchRequest, response: &FetchResponse) -> Self {
        Self {
            url: cache_key(&request.url),
            method: request.method.to_ascii_uppercase(),
            status: response.status,
            status_text: response.status_text.clone(),
            response_type: response.response_type,
            headers: response.headers.clone(),
            body: response.body.clone(),
            cached_at: now_millis(),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// A cache instance.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Cache {
    /// Cache name.
    pub name: String,

    /// Cached entries.
    entries: HashMap<String, CacheEntry>,
}

impl Cache {
    /// Create a new cache.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: HashMap::new(),
        }
    }

    /// Match a request URL.
    pub fn match_request(&self, url: &Url) -> Option<&CacheEntry> {
        self.entries.get(&cache_key(url))
    }

    /// Store an entry, replacing any previous one for the same URL.
    pub fn put(&mut self, entry: CacheEntry) {
        self.entries.insert(entry.url.clone(), entry);
    }

    /// Store a batch of entries. Callers build the whole batch before
    /// committing it, so a failed population never leaves a partial set.
    pub fn put_all(&mut self, entries: Vec<CacheEntry>) {
        for entry in entries {
            self.put(entry);
        }
    }

    /// Delete entry.
    pub fn delete(&mut self, url: &Url) -> bool {
        self.entries.remove(&cache_key(url)).is_some()
    }

    /// Get all keys (URLs).
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cache storage (caches global).
#[derive(Debug, Default)]
pub struct CacheStorage {
    caches: HashMap<String, Cache>,
    /// Cache names in creation order; lookups across stores follow it.
    order: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    caches: Vec<Cache>,
}

impl CacheStorage {
    /// Create new cache storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap in the shared handle handed to workers.
    pub fn shared(self) -> SharedCacheStorage {
        Arc::new(RwLock::new(self))
    }

    /// Open a cache (creates if doesn't exist).
    pub fn open(&mut self, name: &str) -> &mut Cache {
        if !self.caches.contains_key(name) {
            debug!(cache = name, "Creating cache store");
            self.order.push(name.to_string());
        }
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Cache::new(name))
    }

    /// Get a cache without creating it.
    pub fn get(&self, name: &str) -> Option<&Cache> {
        self.caches.get(name)
    }

    /// Check if cache exists.
    pub fn has(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Delete a cache.
    pub fn delete(&mut self, name: &str) -> bool {
        self.order.retain(|n| n != name);
        self.caches.remove(name).is_some()
    }

    /// Get all cache names, oldest first.
    pub fn keys(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    /// Match across all caches, oldest first.
    pub fn match_request(&self, url: &Url) -> Option<&CacheEntry> {
        self.order
            .iter()
            .filter_map(|name| self.caches.get(name))
            .find_map(|cache| cache.match_request(url))
    }

    /// Write every store to `path` as JSON.
    pub async fn save_snapshot(&self, path: &Path) -> SwResult<()> {
        let snapshot = Snapshot {
            caches: self
                .order
                .iter()
                .filter_map(|name| self.caches.get(name).cloned())
                .collect(),
        };
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| SwError::Cache(format!("failed to encode snapshot: {e}")))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| SwError::Cache(format!("failed to write {}: {e}", path.display())))?;
        debug!(path = %path.display(), stores = snapshot.caches.len(), "Saved cache snapshot");
        Ok(())
    }

    /// Restore stores previously written by [`save_snapshot`](Self::save_snapshot).
    pub async fn load_snapshot(path: &Path) -> SwResult<Self> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|e| SwError::Cache(format!("failed to read {}: {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_slice(&raw)
            .map_err(|e| SwError::Cache(format!("corrupt snapshot {}: {e}", path.display())))?;

        let mut storage = Self::new();
        for cache in snapshot.caches {
            storage.order.push(cache.name.clone());
            storage.caches.insert(cache.name.clone(), cache);
        }
        Ok(storage)
    }
}
