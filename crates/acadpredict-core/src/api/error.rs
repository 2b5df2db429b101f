use chrono::Duration;
use thiserror::Error;

use crate::utils::{format_countdown, truncate_string};

#[derive(Error, Debug)]
pub enum ApiError {
    /// The held token was expired or unreadable before sending
    #[error("Session expired - please log in again")]
    SessionExpired,

    /// The server rejected the session on an authenticated call
    #[error("Unauthorized - session was rejected by the server")]
    Unauthorized,

    /// The login endpoint rejected the email/password pair
    #[error("Invalid email or password")]
    BadCredentials,

    /// Login refused locally after too many failed attempts
    #[error("Login temporarily locked - try again in {}", countdown(.remaining))]
    LockedOut { remaining: Duration },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

fn countdown(remaining: &Duration) -> String {
    format_countdown(*remaining)
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// The server's `detail` message if the body carries one, otherwise
    /// the body itself, truncated.
    fn detail(body: &str) -> String {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string));
        match detail {
            Some(detail) => truncate_string(&detail, MAX_ERROR_BODY_LENGTH),
            None => truncate_string(body, MAX_ERROR_BODY_LENGTH),
        }
    }

    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = Self::detail(body);
        match status {
            400 | 422 => ApiError::InvalidInput(detail),
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(detail),
            404 => ApiError::NotFound(detail),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(detail),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, detail)),
        }
    }

    /// The session is gone and the user has to log in again
    pub fn is_session_loss(&self) -> bool {
        matches!(self, ApiError::SessionExpired | ApiError::Unauthorized)
    }
}
