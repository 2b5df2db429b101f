use chrono::{DateTime, Utc};

use super::token;
use crate::models::UserProfile;

/// Snapshot of the stored session.
/// `profile` is only ever `Some` when `token` is `Some`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub token: Option<String>,
    pub profile: Option<UserProfile>,
}

impl Session {
    pub fn empty() -> Self {
        Self::default()
    }

    /// A token is held, whether or not it is still usable
    pub fn is_present(&self) -> bool {
        self.token.is_some()
    }

    /// Check if the session holds a token that has not expired at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !token::is_expired(self.token.as_deref(), now)
    }

    /// Time left before the held token expires, if it can be decoded
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        let claims = token::claims(self.token.as_deref()?)?;
        Some(claims.expires_at - now)
    }
}
