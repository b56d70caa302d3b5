//! Clients API: the windows the worker can see, focus and open.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

use crate::error::{SwError, SwResult};

/// A client (page or worker) of the origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Client {
    /// Client ID.
    pub id: String,

    /// Client URL.
    pub url: Url,

    /// Client type.
    pub client_type: ClientType,

    /// Frame type.
    pub frame_type: FrameType,

    /// Visibility state.
    pub visibility_state: VisibilityState,

    /// Whether focused.
    pub focused: bool,

    /// Whether this worker controls the client.
    pub controlled: bool,
}

impl Client {
    /// Create an uncontrolled, visible top-level window.
    pub fn window(url: Url) -> Self {
        Self {
            id: next_client_id(),
            url,
            client_type: ClientType::Window,
            frame_type: FrameType::TopLevel,
            visibility_state: VisibilityState::Visible,
            focused: false,
            controlled: false,
        }
    }
}

/// Client type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClientType {
    #[default]
    Window,
    Worker,
    SharedWorker,
    All,
}

/// Frame type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Auxiliary,
    TopLevel,
    Nested,
    None,
}

/// Visibility state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityState {
    Hidden,
    Visible,
}

/// Options for `clients.matchAll()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientMatchOptions {
    pub include_uncontrolled: bool,
    pub client_type: ClientType,
}

impl ClientMatchOptions {
    /// Every window of the origin, controlled or not.
    pub fn all_windows() -> Self {
        Self {
            include_uncontrolled: true,
            client_type: ClientType::Window,
        }
    }
}

/// Host side of the Clients API.
#[async_trait]
pub trait ClientHost: Send + Sync {
    /// List clients matching `options`.
    async fn match_all(&self, options: ClientMatchOptions) -> Vec<Client>;

    /// Bring a window to the foreground.
    async fn focus(&self, id: &str) -> SwResult<Client>;

    /// Open a new window at `url`.
    async fn open_window(&self, url: &Url) -> SwResult<Client>;

    /// Take control of every client under `scope`. Returns how many were
    /// newly claimed.
    async fn claim(&self, scope: &Url) -> SwResult<usize>;
}

/// In-memory window registry.
#[derive(Debug, Default)]
pub struct Clients {
    clients: RwLock<Vec<Client>>,
}

impl Clients {
    /// Create new clients manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client.
    pub async fn add(&self, client: Client) {
        self.clients.write().await.push(client);
    }

    /// Get a client by ID.
    pub async fn get(&self, id: &str) -> Option<Client> {
        self.clients.read().await.iter().find(|c| c.id == id).cloned()
    }

    /// Number of known clients.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }

    /// Snapshot of every client.
    pub async fn all(&self) -> Vec<Client> {
        self.clients.read().await.clone()
    }
}

#[async_trait]
impl ClientHost for Clients {
    async fn match_all(&self, options: ClientMatchOptions) -> Vec<Client> {
        self.clients
            .read()
            .await
            .iter()
            .filter(|c| options.include_uncontrolled || c.controlled)
            .filter(|c| match options.client_type {
                ClientType::All => true,
                t => c.client_type == t,
            })
            .cloned()
            .collect()
    }

    async fn focus(&self, id: &str) -> SwResult<Client> {
        let mut clients = self.clients.write().await;
        let index = clients
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| SwError::NotFound(format!("client {id}")))?;
        if clients[index].client_type != ClientType::Window {
            return Err(SwError::Client(
                "Can only focus window clients".to_string(),
            ));
        }
        for client in clients.iter_mut() {
            client.focused = false;
        }
        let client = &mut clients[index];
        client.focused = true;
        client.visibility_state = VisibilityState::Visible;
        debug!(client = %client.id, url = %client.url, "Focused client");
        Ok(client.clone())
    }

    async fn open_window(&self, url: &Url) -> SwResult<Client> {
        let mut clients = self.clients.write().await;
        for client in clients.iter_mut() {
            client.focused = false;
        }
        let mut client = Client::window(url.clone());
        client.focused = true;
        debug!(client = %client.id, url = %url, "Opened window");
        clients.push(client.clone());
        Ok(client)
    }

    async fn claim(&self, scope: &Url) -> SwResult<usize> {
        let mut claimed = 0;
        for client in self.clients.write().await.iter_mut() {
            if !client.controlled && client.url.as_str().starts_with(scope.as_str()) {
                client.controlled = true;
                claimed += 1;
            }
        }
        Ok(claimed)
    }
}

fn next_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("client-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_open_window() {
        let clients = Clients::new();

        let client = clients.open_window(&url("https://caixa.example/")).await.unwrap();
        assert_eq!(client.client_type, ClientType::Window);
        assert!(client.focused);

        assert!(clients.get(&client.id).await.is_some());
        assert_eq!(clients.len().await, 1);
    }

    #[tokio::test]
    async fn test_focus_moves_focus() {
        let clients = Clients::new();
        let a = clients.open_window(&url("https://caixa.example/a")).await.unwrap();
        let b = clients.open_window(&url("https://caixa.example/b")).await.unwrap();

        clients.focus(&a.id).await.unwrap();
        assert!(clients.get(&a.id).await.unwrap().focused);
        assert!(!clients.get(&b.id).await.unwrap().focused);
    }

    #[tokio::test]
    async fn test_focus_unknown_client() {
        let clients = Clients::new();
        assert!(matches!(clients.focus("client-x").await, Err(SwError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_focus_rejects_workers() {
        let clients = Clients::new();
        let mut worker = Client::window(url("https://caixa.example/w.js"));
        worker.client_type = ClientType::Worker;
        let id = worker.id.clone();
        clients.add(worker).await;
        assert!(matches!(clients.focus(&id).await, Err(SwError::Client(_))));
    }

    #[tokio::test]
    async fn test_match_all_respects_control() {
        let clients = Clients::new();
        clients.add(Client::window(url("https://caixa.example/"))).await;

        let controlled_only = ClientMatchOptions::default();
        assert!(clients.match_all(controlled_only).await.is_empty());
        assert_eq!(clients.match_all(ClientMatchOptions::all_windows()).await.len(), 1);
    }

    #[tokio::test]
    async fn test_claim_only_in_scope() {
        let clients = Clients::new();
        clients.add(Client::window(url("https://caixa.example/"))).await;
        clients.add(Client::window(url("https://other.example/"))).await;

        let claimed = clients.claim(&url("https://caixa.example/")).await.unwrap();
        assert_eq!(claimed, 1);
        assert_eq!(clients.match_all(ClientMatchOptions::default()).await.len(), 1);

        // Already-controlled clients are not counted twice.
        assert_eq!(clients.claim(&url("https://caixa.example/")).await.unwrap(), 0);
    }
}
