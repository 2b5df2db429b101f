//! Durable key-value state.
//!
//! This module provides:
//! - `KeyValueStore`: a backend that can load and apply string writes
//! - `FileStore`: a JSON file backend in the state directory
//! - `MemoryStore`: an in-process backend
//! - `Storage`: the shared handle used by the session and lockout code
//!
//! Values written through `Storage` survive a restart as long as the
//! backend keeps working. After the first backend failure the handle keeps
//! serving from memory for the rest of the process.

pub mod file;
pub mod memory;

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use tracing::{debug, warn};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Persisted key names.
pub mod keys {
    pub const TOKEN: &str = "token";
    pub const PROFILE: &str = "user";
    pub const FAILED_ATTEMPTS: &str = "failedAttempts";
    pub const LOCK_UNTIL: &str = "lockUntil";
    pub const REMEMBER: &str = "remember";
}

/// A single mutation. Several writes passed together are applied as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Write {
    Set(String, String),
    Remove(String),
}

impl Write {
    pub fn set(key: &str, value: impl Into<String>) -> Self {
        Write::Set(key.to_string(), value.into())
    }

    pub fn remove(key: &str) -> Self {
        Write::Remove(key.to_string())
    }

    fn apply_to(&self, map: &mut HashMap<String, String>) {
        match self {
            Write::Set(k, v) => {
                map.insert(k.clone(), v.clone());
            }
            Write::Remove(k) => {
                map.remove(k);
            }
        }
    }
}

pub trait KeyValueStore: Send + Sync {
    /// Read every stored entry.
    fn load(&self) -> Result<HashMap<String, String>>;

    /// Apply `writes` as one unit.
    fn apply(&self, writes: &[Write]) -> Result<()>;
}

pub struct Storage {
    mirror: Mutex<HashMap<String, String>>,
    backend: Mutex<Option<Box<dyn KeyValueStore>>>,
}

impl Storage {
    /// Open storage over a durable backend, loading its current contents.
    pub fn open(backend: Box<dyn KeyValueStore>) -> Self {
        match backend.load() {
            Ok(entries) => {
                debug!(entries = entries.len(), "Storage loaded");
                Self {
                    mirror: Mutex::new(entries),
                    backend: Mutex::new(Some(backend)),
                }
            }
            Err(e) => {
                warn!(error = %e, "Persistent storage unavailable, continuing in memory only");
                Self::in_memory()
            }
        }
    }

    /// Storage with no durable backend.
    pub fn in_memory() -> Self {
        Self {
            mirror: Mutex::new(HashMap::new()),
            backend: Mutex::new(None),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mirror = self.mirror.lock().unwrap_or_else(|e| e.into_inner());
        mirror.get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.apply(&[Write::set(key, value)]);
    }

    pub fn remove(&self, key: &str) {
        self.apply(&[Write::remove(key)]);
    }

    /// Apply several writes together. Memory is always updated; the backend
    /// is written through unless it has already failed once.
    pub fn apply(&self, writes: &[Write]) {
        {
            let mut mirror = self.mirror.lock().unwrap_or_else(|e| e.into_inner());
            for write in writes {
                write.apply_to(&mut mirror);
            }
        }

        let mut backend = self.backend.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ref store) = *backend {
            if let Err(e) = store.apply(writes) {
                warn!(error = %e, "Failed to persist state, continuing in memory only");
                *backend = None;
            }
        }
    }

    /// True once the durable backend has been dropped.
    pub fn is_degraded(&self) -> bool {
        let backend = self.backend.lock().unwrap_or_else(|e| e.into_inner());
        backend.is_none()
    }
}
