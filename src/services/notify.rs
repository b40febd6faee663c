use tokio::sync::mpsc;

use crate::models::notification::{Notification, Severity};

/// Receives user-facing notifications. Fire-and-forget.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.severity {
            Severity::Error => tracing::error!(title = %n.title, "{}", n.description),
            Severity::Warning => tracing::warn!(title = %n.title, "{}", n.description),
            Severity::Info | Severity::Success => {
                tracing::info!(title = %n.title, "{}", n.description)
            }
        }
    }
}

/// Forwards notifications to a channel drained by the front end.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        // A closed receiver means nobody is displaying toasts anymore.
        let _ = self.tx.send(notification);
    }
}
