use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::{KeyValueStore, Write};

/// In-process backend. Clones share the same map, which lets tests
/// reopen `Storage` over the same contents to simulate a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl KeyValueStore for MemoryStore {
    fn load(&self) -> Result<HashMap<String, String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.clone())
    }

    fn apply(&self, writes: &[Write]) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        for write in writes {
            write.apply_to(&mut entries);
        }
        Ok(())
    }
}
