//! Authentication module for managing the client-side session.
//!
//! This module provides:
//! - `CredentialStore`: the persisted bearer token and user profile
//! - `token`: expiry inspection of bearer tokens (no signature check)
//! - `LockoutTracker`: consecutive failed-login counting and timed lockout
//! - `PasswordVault`: remembered passwords, kept in the OS `Keychain`
//! - `AuthService`: login, logout and registration flows over the above
//!
//! Session and lockout state are persisted through `crate::storage` and
//! survive a restart.

pub mod credentials;
pub mod keychain;
pub mod lockout;
pub mod service;
pub mod session;
pub mod token;

pub use credentials::CredentialStore;
pub use keychain::{Keychain, MemoryVault, PasswordVault};
pub use lockout::{LockStatus, LockoutState, LockoutTracker};
pub use service::AuthService;
pub use session::Session;
pub use token::TokenClaims;
