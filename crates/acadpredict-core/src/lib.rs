//! acadpredict core library.
//!
//! Client-side session handling for the academic prediction service:
//! - `storage`: durable key-value state that survives restarts
//! - `auth`: credential store, token inspection, login lockout and the
//!   authentication service that ties them together
//! - `api`: REST client with a request gate and response sentinel
//! - `notify`: short-lived security notifications
//! - `config`: application configuration

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod models;
pub mod notify;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{AuthService, CredentialStore, LockoutTracker, Session};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use notify::{NotificationKind, NotificationQueue, SecurityNotification};
pub use storage::Storage;

#[cfg(test)]
pub(crate) mod test_support;
