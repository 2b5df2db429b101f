//! Short-lived security notifications.
//!
//! Every security-relevant transition (failed attempt, lock engaged, lock
//! lifted, login success) pushes a message here. Each message removes
//! itself five seconds after creation unless dismissed first.

pub mod queue;

pub use queue::{NotificationKind, NotificationQueue, SecurityNotification};
