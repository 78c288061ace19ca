//! Notification dispatch
//!
//! Delivery belongs to an external push service. The core only issues
//! requests and never waits for their outcome.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::DormId;

/// Who a notification is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationTarget {
    User(Uuid),
    /// Every resident of a dorm
    Dorm(DormId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub target: NotificationTarget,
    pub title: String,
    pub body: String,
    /// Opaque data for the client, e.g. the event to open
    pub payload: serde_json::Value,
}

impl Notification {
    pub fn to_user(user_id: Uuid, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            target: NotificationTarget::User(user_id),
            title: title.into(),
            body: body.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn to_dorm(dorm: DormId, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            target: NotificationTarget::Dorm(dorm),
            title: title.into(),
            body: body.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Fire-and-forget notification sink
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: Notification);
}

/// Hands notifications to a delivery task over an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationDispatcher for ChannelDispatcher {
    fn dispatch(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::warn!("Notification receiver dropped, notification discarded");
        }
    }
}

/// Discards everything; for hosts that run without push delivery
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDispatcher;

impl NotificationDispatcher for NullDispatcher {
    fn dispatch(&self, notification: Notification) {
        tracing::trace!(title = %notification.title, "Notification dropped");
    }
}
