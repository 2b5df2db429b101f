use std::sync::Arc;

use tracing::{debug, warn};

use super::navigator::{Navigator, REAUTH_ROUTE};
use super::ApiError;
use crate::auth::CredentialStore;

/// HTTP status the server uses to reject a session
const UNAUTHORIZED: u16 = 401;

/// Inspects every authenticated response for a server-side rejection.
#[derive(Clone)]
pub struct ResponseSentinel {
    credentials: Arc<CredentialStore>,
    navigator: Arc<dyn Navigator>,
}

impl ResponseSentinel {
    pub fn new(credentials: Arc<CredentialStore>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            credentials,
            navigator,
        }
    }

    /// Pass non-401 statuses through. On 401 clear the session the
    /// request was sent with, redirect, and fail with `Unauthorized`.
    ///
    /// Runs synchronously, so the clear is complete before the caller
    /// sees the error. Concurrent rejections of the same token clear and
    /// redirect once; a newer session set in the meantime is left alone.
    pub fn inspect(&self, sent_with: Option<&str>, status: u16) -> Result<(), ApiError> {
        if status != UNAUTHORIZED {
            return Ok(());
        }

        match sent_with {
            Some(token) => {
                if self.credentials.clear_if_current(token) {
                    warn!("Server rejected the session, clearing");
                    self.navigator.redirect(REAUTH_ROUTE);
                } else {
                    debug!("Session already cleared or replaced");
                }
            }
            None => {
                debug!("Unauthenticated request rejected");
                self.navigator.redirect(REAUTH_ROUTE);
            }
        }

        Err(ApiError::Unauthorized)
    }
}
