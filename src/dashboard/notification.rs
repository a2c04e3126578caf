//! User-facing notifications raised by the dashboard session and list views.

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::event::EventRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationCode {
    /// A real-time event referenced a device missing from the diagram.
    DeviceNotFound,
    /// A list query failed; the view kept its previous contents.
    FetchFailed,
    /// A real-time event arrived.
    NewEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub code: NotificationCode,
    pub message: String,
    pub event_id: Option<Uuid>,
    /// Whether the user can retry the action that failed.
    pub retryable: bool,
}

impl Notification {
    pub fn device_not_found(event_id: Uuid, node_id: &str) -> Self {
        Self {
            code: NotificationCode::DeviceNotFound,
            message: format!("Device {node_id} not found (event {event_id})"),
            event_id: Some(event_id),
            retryable: false,
        }
    }

    pub fn fetch_failed(reason: impl std::fmt::Display) -> Self {
        Self {
            code: NotificationCode::FetchFailed,
            message: format!("Failed to load events: {reason}"),
            event_id: None,
            retryable: true,
        }
    }

    pub fn new_event(event: &EventRecord) -> Self {
        Self {
            code: NotificationCode::NewEvent,
            message: format!(
                "[{}] {}: {}",
                event.category.label(),
                event.send_node,
                event.info_text()
            ),
            event_id: Some(event.id),
            retryable: false,
        }
    }
}

/// Sink for notifications; implementations must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Forwards notifications to an unbounded channel consumed by the UI layer.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification receiver dropped");
        }
    }
}
