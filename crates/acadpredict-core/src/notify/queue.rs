use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;

/// Lifetime of a notification before it removes itself
const NOTIFICATION_TTL_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Warning,
    Error,
    Info,
}

impl NotificationKind {
    pub fn label(&self) -> &'static str {
        match self {
            NotificationKind::Success => "ok",
            NotificationKind::Warning => "warning",
            NotificationKind::Error => "error",
            NotificationKind::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityNotification {
    pub id: u64,
    pub message: String,
    pub kind: NotificationKind,
    pub created_at: DateTime<Utc>,
}

struct Inner {
    entries: Mutex<Vec<SecurityNotification>>,
    next_id: AtomicU64,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Inner {
    fn remove(&self, id: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|n| n.id != id);
        entries.len() != before
    }
}

/// Ordered list of live notifications.
/// Clone is cheap; clones share the same list.
#[derive(Clone)]
pub struct NotificationQueue {
    inner: Arc<Inner>,
}

impl NotificationQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, Duration::from_secs(NOTIFICATION_TTL_SECS))
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                ttl,
                clock,
            }),
        }
    }

    /// Append a notification and start its own expiry timer.
    pub fn push(&self, message: impl Into<String>, kind: NotificationKind) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let notification = SecurityNotification {
            id,
            message: message.into(),
            kind,
            created_at: self.inner.clock.now(),
        };

        match kind {
            NotificationKind::Error => error!(id, message = %notification.message, "Security notification"),
            NotificationKind::Warning => warn!(id, message = %notification.message, "Security notification"),
            NotificationKind::Success | NotificationKind::Info => {
                info!(id, message = %notification.message, "Security notification")
            }
        }

        {
            let mut entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.push(notification);
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let weak: Weak<Inner> = Arc::downgrade(&self.inner);
                let ttl = self.inner.ttl;
                handle.spawn(async move {
                    tokio::time::sleep(ttl).await;
                    if let Some(inner) = weak.upgrade() {
                        if inner.remove(id) {
                            debug!(id, "Notification expired");
                        }
                    }
                });
            }
            Err(_) => debug!(id, "No async runtime, notification stays until dismissed"),
        }

        id
    }

    /// Remove a notification now. Returns false if it was already gone.
    pub fn dismiss(&self, id: u64) -> bool {
        self.inner.remove(id)
    }

    /// Live notifications in insertion order
    pub fn snapshot(&self) -> Vec<SecurityNotification> {
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.clone()
    }

    pub fn len(&self) -> usize {
        let entries = self.inner.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
