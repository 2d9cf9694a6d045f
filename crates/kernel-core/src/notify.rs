//! Outward, fire-and-forget delivery of user-visible toasts.

use std::sync::{Arc, Mutex};

use contracts::Notification;
use tracing::info;

pub trait NotificationSink: Send + std::fmt::Debug {
    fn notify(&mut self, notification: Notification);
}

/// Logs every toast. Used when nothing else is listening.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&mut self, notification: Notification) {
        info!(
            account_id = %notification.account_id,
            message = %notification.message,
            "notification"
        );
    }
}

/// Buffers toasts for a consumer to drain. Clones share one buffer, so a handle
/// kept outside the engine sees what the engine delivered.
#[derive(Debug, Default, Clone)]
pub struct Outbox {
    pending: Arc<Mutex<Vec<Notification>>>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<Notification> {
        match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }

    pub fn len(&self) -> usize {
        self.pending.lock().map(|pending| pending.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationSink for Outbox {
    fn notify(&mut self, notification: Notification) {
        match self.pending.lock() {
            Ok(mut pending) => pending.push(notification),
            Err(poisoned) => poisoned.into_inner().push(notification),
        }
    }
}
