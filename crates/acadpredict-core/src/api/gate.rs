use std::sync::Arc;

use tracing::warn;

use super::navigator::{Navigator, REAUTH_ROUTE};
use super::ApiError;
use crate::auth::{token, CredentialStore};
use crate::clock::Clock;

/// Checks the held token immediately before every authenticated send.
#[derive(Clone)]
pub struct RequestGate {
    credentials: Arc<CredentialStore>,
    clock: Arc<dyn Clock>,
    navigator: Arc<dyn Navigator>,
}

impl RequestGate {
    pub fn new(
        credentials: Arc<CredentialStore>,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            credentials,
            clock,
            navigator,
        }
    }

    /// The bearer token to send with, `None` for an unauthenticated send.
    ///
    /// A held token that is expired or unreadable clears the session,
    /// redirects, and fails with `SessionExpired`; the request must not
    /// be sent.
    pub fn admit(&self) -> Result<Option<String>, ApiError> {
        let Some(token) = self.credentials.token() else {
            return Ok(None);
        };

        if token::is_expired(Some(&token), self.clock.now()) {
            warn!("Held token is expired, ending session before send");
            self.credentials.clear();
            self.navigator.redirect(REAUTH_ROUTE);
            return Err(ApiError::SessionExpired);
        }

        Ok(Some(token))
    }
}
