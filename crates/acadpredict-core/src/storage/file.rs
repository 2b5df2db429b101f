use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use super::{KeyValueStore, Write};

/// State file name in the state directory
const STATE_FILE: &str = "state.json";

/// Stores every key in one JSON object on disk.
pub struct FileStore {
    state_dir: PathBuf,
}

impl FileStore {
    pub fn new(state_dir: PathBuf) -> Self {
        Self { state_dir }
    }

    fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    fn read_map(&self) -> Result<HashMap<String, String>> {
        let path = self.state_path();
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(&path)
            .context("Failed to read state file")?;
        serde_json::from_str(&contents).context("Failed to parse state file")
    }
}

impl KeyValueStore for FileStore {
    fn load(&self) -> Result<HashMap<String, String>> {
        self.read_map()
    }

    fn apply(&self, writes: &[Write]) -> Result<()> {
        let mut map = self.read_map()?;
        for write in writes {
            write.apply_to(&mut map);
        }

        std::fs::create_dir_all(&self.state_dir)
            .context("Failed to create state directory")?;

        // Write to a sibling file and rename so a crash never leaves half a file
        let path = self.state_path();
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_string_pretty(&map)?;
        std::fs::write(&tmp, contents).context("Failed to write state file")?;
        std::fs::rename(&tmp, &path).context("Failed to replace state file")?;
        Ok(())
    }
}
