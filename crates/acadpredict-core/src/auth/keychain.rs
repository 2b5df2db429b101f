//! Remembered passwords for the "remember me" login.
//!
//! `AuthService` writes through a `PasswordVault` after a remembered login
//! succeeds and reads it back only while the remember flag is set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use keyring::Entry;

/// Keyring service the entries are filed under
const SERVICE_NAME: &str = "acadpredict";

pub trait PasswordVault: Send + Sync {
    fn remember(&self, email: &str, password: &str) -> Result<()>;

    /// `Ok(None)` when nothing is stored for `email`
    fn recall(&self, email: &str) -> Result<Option<String>>;

    /// Forgetting an email that has no entry is not an error
    fn forget(&self, email: &str) -> Result<()>;
}

/// The OS keychain, one entry per email.
#[derive(Debug, Clone)]
pub struct Keychain {
    service: String,
}

impl Default for Keychain {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl Keychain {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, email: &str) -> Result<Entry> {
        Entry::new(&self.service, email).context("Failed to open keychain entry")
    }
}

impl PasswordVault for Keychain {
    fn remember(&self, email: &str, password: &str) -> Result<()> {
        self.entry(email)?
            .set_password(password)
            .context("Failed to store password in keychain")
    }

    fn recall(&self, email: &str) -> Result<Option<String>> {
        match self.entry(email)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read password from keychain"),
        }
    }

    fn forget(&self, email: &str) -> Result<()> {
        match self.entry(email)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete password from keychain"),
        }
    }
}

/// Process-local vault. Clones share entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryVault {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl PasswordVault for MemoryVault {
    fn remember(&self, email: &str, password: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(email.to_string(), password.to_string());
        Ok(())
    }

    fn recall(&self, email: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(email).cloned())
    }

    fn forget(&self, email: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(email);
        Ok(())
    }
}
