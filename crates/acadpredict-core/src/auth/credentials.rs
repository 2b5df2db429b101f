use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::Session;
use crate::models::UserProfile;
use crate::storage::{keys, Storage, Write};

/// Persisted bearer token and user profile.
///
/// The only writer of the session keys. Every call leaves storage matching
/// what `get()` returns, so a restart reconstructs the last session that
/// was set or cleared.
pub struct CredentialStore {
    storage: Arc<Storage>,
    // Serializes read-modify-write sequences such as `clear_if_current`
    write_lock: Mutex<()>,
}

impl CredentialStore {
    /// Open the store, discarding a stored profile that has no token.
    pub fn new(storage: Arc<Storage>) -> Self {
        if storage.get(keys::TOKEN).is_none() && storage.get(keys::PROFILE).is_some() {
            warn!("Found profile without token, discarding");
            storage.remove(keys::PROFILE);
        }
        Self {
            storage,
            write_lock: Mutex::new(()),
        }
    }

    pub fn get(&self) -> Session {
        let token = self.storage.get(keys::TOKEN);
        let profile = match token {
            Some(_) => self.profile(),
            None => None,
        };
        Session { token, profile }
    }

    /// Replace the session with `token` and `profile` in one write.
    pub fn set(&self, token: String, profile: UserProfile) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let profile_json = match serde_json::to_string(&profile) {
            Ok(json) => json,
            Err(e) => {
                // Unreachable for this type; keep the invariant by storing nothing
                warn!(error = %e, "Failed to serialize profile");
                self.storage
                    .apply(&[Write::remove(keys::TOKEN), Write::remove(keys::PROFILE)]);
                return;
            }
        };
        self.storage.apply(&[
            Write::set(keys::TOKEN, token),
            Write::set(keys::PROFILE, profile_json),
        ]);
        debug!(user_id = profile.id, "Session stored");
    }

    pub fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.clear_locked();
    }

    /// Clear the session only if it still holds `token`. Returns whether a
    /// clear happened, so concurrent rejections of the same token clear once.
    pub fn clear_if_current(&self, token: &str) -> bool {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        match self.storage.get(keys::TOKEN) {
            Some(ref current) if current == token => {
                self.clear_locked();
                true
            }
            _ => false,
        }
    }

    fn clear_locked(&self) {
        self.storage
            .apply(&[Write::remove(keys::TOKEN), Write::remove(keys::PROFILE)]);
        debug!("Session cleared");
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(keys::TOKEN)
    }

    pub fn profile(&self) -> Option<UserProfile> {
        let raw = self.storage.get(keys::PROFILE)?;
        match serde_json::from_str(&raw) {
            Ok(profile) => Some(profile),
            Err(e) => {
                warn!(error = %e, "Stored profile is unreadable");
                None
            }
        }
    }

    /// Whether the user asked to be remembered at last login
    pub fn remember(&self) -> bool {
        self.storage.get(keys::REMEMBER).as_deref() == Some("1")
    }

    pub fn set_remember(&self, remember: bool) {
        if remember {
            self.storage.set(keys::REMEMBER, "1");
        } else {
            self.storage.remove(keys::REMEMBER);
        }
    }
}
