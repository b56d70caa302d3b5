//! Notifications shown by the push relay.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{SwError, SwResult};

/// Identifier of a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(u64);

impl NotificationId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// Data attached to a notification and handed back on click.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Page to show when the notification is clicked.
    pub url: Option<String>,
}

/// Everything needed to display a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDescriptor {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub vibrate: Vec<u32>,
    pub data: NotificationData,
}

/// Host side of `registration.showNotification()`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, descriptor: &NotificationDescriptor) -> SwResult<NotificationId>;

    async fn close(&self, id: NotificationId) -> SwResult<()>;
}

/// A notification recorded by [`NotificationCenter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShownNotification {
    pub id: NotificationId,
    pub descriptor: NotificationDescriptor,
    pub open: bool,
}

/// In-memory notifier that remembers what it displayed.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    shown: RwLock<Vec<ShownNotification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification shown so far, oldest first.
    pub async fn shown(&self) -> Vec<ShownNotification> {
        self.shown.read().await.clone()
    }

    /// Notifications that have not been closed.
    pub async fn open(&self) -> Vec<ShownNotification> {
        self.shown
            .read()
            .await
            .iter()
            .filter(|n| n.open)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Notifier for NotificationCenter {
    async fn show(&self, descriptor: &NotificationDescriptor) -> SwResult<NotificationId> {
        let id = NotificationId::new();
        debug!(id = id.raw(), title = %descriptor.title, "Showing notification");
        self.shown.write().await.push(ShownNotification {
            id,
            descriptor: descriptor.clone(),
            open: true,
        });
        Ok(id)
    }

    async fn close(&self, id: NotificationId) -> SwResult<()> {
        let mut shown = self.shown.write().await;
        let notification = shown
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| SwError::NotFound(format!("notification {}", id.raw())))?;
        notification.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(title: &str) -> NotificationDescriptor {
        NotificationDescriptor {
            title: title.to_string(),
            body: "corpo".to_string(),
            icon: "/icon-192x192.png".to_string(),
            badge: "/icon-192x192.png".to_string(),
            vibrate: vec![200, 100, 200],
            data: NotificationData::default(),
        }
    }

    #[tokio::test]
    async fn test_show_and_close() {
        let center = NotificationCenter::new();
        let id = center.show(&descriptor("Promessa")).await.unwrap();

        assert_eq!(center.open().await.len(), 1);
        center.close(id).await.unwrap();
        assert!(center.open().await.is_empty());
        assert_eq!(center.shown().await.len(), 1);
    }

    #[tokio::test]
    async fn test_close_unknown() {
        let center = NotificationCenter::new();
        let missing = NotificationId::new();
        assert!(center.close(missing).await.is_err());
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(NotificationId::new(), NotificationId::new());
    }
}
