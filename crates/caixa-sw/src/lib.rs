//! # Caixa Service Worker
//!
//! Offline cache manager and push relay for the caixa-promessa PWA.
//!
//! ## Features
//!
//! - **Install**: all-or-nothing precache of the asset manifest
//! - **Activate**: deletes every cache generation but the current one and
//!   claims open clients
//! - **Fetch**: cache-first serving of same-origin GETs with runtime caching
//!   and an offline document for navigations
//! - **Push**: payload merged over configured defaults, shown as a
//!   notification; clicks focus or open the app
//! - **Message**: `SKIP_WAITING` promotes a waiting update
//!
//! ## Architecture
//!
//! ```text
//! ServiceWorkerRegistration
//!     ├── installing / waiting / active (PromiseWorker)
//!     │       └── DispatchTable: EventKind → handler future
//!     │
//!     └── WorkerHost
//!             ├── CacheStorage  (named caches, request URL → response)
//!             ├── Network       (fetch)
//!             ├── Notifier      (show / close)
//!             └── ClientHost    (matchAll / focus / openWindow / claim)
//! ```

pub mod cache;
pub mod clients;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod network;
pub mod notification;
mod offline;
pub mod push;
pub mod registration;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use cache::{cache_key, Cache, CacheEntry, CacheStorage, SharedCacheStorage};
pub use clients::{Client, ClientHost, ClientMatchOptions, ClientType, Clients};
pub use config::{NotificationDefaults, WorkerConfig, CACHE_NAME_ENV, DEFAULT_CACHE_NAME};
pub use dispatch::{DispatchTable, EventKind, EventOutcome, MessageEvent, WorkerEvent};
pub use error::{SwError, SwResult};
pub use fetch::{FetchRequest, FetchResponse, RequestDestination, RequestMode, ResponseType};
pub use lifecycle::ServiceWorkerState;
pub use network::Network;
pub use notification::{
    NotificationCenter, NotificationData, NotificationDescriptor, NotificationId, Notifier,
    ShownNotification,
};
pub use push::{ClickOutcome, NotificationClickEvent, PushEvent, PushMessage};
pub use registration::ServiceWorkerRegistration;
pub use worker::{PromiseWorker, ServiceWorkerId, WorkerHost};
