//! Push relay: turning push messages into notifications and routing clicks
//! on them back into the app.

use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use crate::clients::{Client, ClientMatchOptions};
use crate::config::NotificationDefaults;
use crate::error::SwResult;
use crate::notification::{NotificationData, NotificationDescriptor, NotificationId};
use crate::worker::PromiseWorker;

/// A push message as delivered by the host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PushEvent {
    /// Raw message body, if any.
    pub data: Option<Vec<u8>>,
}

impl PushEvent {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: Some(data.into()),
        }
    }

    /// A push with no body.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn json(value: &Value) -> Self {
        Self::new(value.to_string())
    }
}

/// A click on a notification the worker displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationClickEvent {
    pub notification: NotificationId,
    pub data: NotificationData,
}

/// What a notification click ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// An existing window at the target URL was focused.
    Focused(Client),
    /// A new window was opened at the target URL.
    Opened(Client),
}

/// Notification text after merging a payload over the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
}

/// Parse a push body as a JSON object. Absent, malformed or non-object
/// bodies yield `None`.
pub fn parse_payload(data: Option<&[u8]>) -> Option<Map<String, Value>> {
    match serde_json::from_slice::<Value>(data?) {
        Ok(Value::Object(fields)) => Some(fields),
        Ok(other) => {
            debug!(kind = json_kind(&other), "Push payload is not an object");
            None
        }
        Err(e) => {
            debug!(error = %e, "Push payload is not JSON");
            None
        }
    }
}

/// Override each default with the payload's field of the same name when the
/// payload carries it as a string.
pub fn merge_over_defaults(
    defaults: &NotificationDefaults,
    payload: Option<&Map<String, Value>>,
) -> PushMessage {
    let pick = |field: &str, fallback: &str| -> String {
        payload
            .and_then(|p| p.get(field))
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };

    PushMessage {
        title: pick("title", &defaults.title),
        body: pick("body", &defaults.body),
        icon: pick("icon", &defaults.icon),
        badge: pick("badge", &defaults.badge),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl PromiseWorker {
    /// Build the notification for a push message.
    pub fn build_notification(&self, event: &PushEvent) -> NotificationDescriptor {
        let payload = parse_payload(event.data.as_deref());
        if payload.is_none() {
            debug!("Using default notification");
        }
        let message = merge_over_defaults(&self.config.notification, payload.as_ref());

        NotificationDescriptor {
            title: message.title,
            body: message.body,
            icon: message.icon,
            badge: message.badge,
            vibrate: self.config.notification.vibrate.clone(),
            data: NotificationData {
                url: Some(self.config.origin.origin().ascii_serialization()),
            },
        }
    }

    /// Handle a push event by displaying its notification.
    pub async fn handle_push(&self, event: PushEvent) -> SwResult<NotificationId> {
        let descriptor = self.build_notification(&event);
        let id = self.host.notifier.show(&descriptor).await?;
        info!(id = id.raw(), title = %descriptor.title, "Push notification shown");
        Ok(id)
    }

    /// Handle a notification click: close it, then focus a window already
    /// showing the target page or open a new one.
    pub async fn handle_notification_click(
        &self,
        event: NotificationClickEvent,
    ) -> SwResult<ClickOutcome> {
        if let Err(e) = self.host.notifier.close(event.notification).await {
            warn!(id = event.notification.raw(), error = %e, "Failed to close notification");
        }

        let target = self.click_target(&event.data)?;
        let windows = self
            .host
            .clients
            .match_all(ClientMatchOptions::all_windows())
            .await;

        if let Some(existing) = windows.iter().find(|c| c.url == target) {
            let client = self.host.clients.focus(&existing.id).await?;
            info!(url = %target, client = %client.id, "Focused existing window");
            return Ok(ClickOutcome::Focused(client));
        }

        let client = self.host.clients.open_window(&target).await?;
        info!(url = %target, client = %client.id, "Opened window");
        Ok(ClickOutcome::Opened(client))
    }

    fn click_target(&self, data: &NotificationData) -> SwResult<Url> {
        match data.url.as_deref() {
            Some(url) => match self.config.origin.join(url) {
                Ok(target) => Ok(target),
                Err(e) => {
                    warn!(url, error = %e, "Invalid notification url, using app root");
                    self.config.app_root()
                }
            },
            None => self.config.app_root(),
        }
    }
}
