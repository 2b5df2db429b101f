//! Bearer token inspection.
//!
//! Decodes the payload segment of a JWT-shaped token to read its `exp`
//! claim. The signature is never checked: the result is only a hint that
//! lets the client skip requests the server would reject anyway. Anything
//! that cannot be decoded counts as expired.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Standard alphabet, padding optional. Payloads are translated from the
/// url-safe alphabet before decoding.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub expires_at: DateTime<Utc>,
    pub subject: Option<String>,
}

/// Decode the claims of `token`, or `None` if it is not a readable JWT
/// carrying a numeric `exp`.
pub fn claims(token: &str) -> Option<TokenClaims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        debug!(segments = segments.len(), "Token does not have three segments");
        return None;
    }

    let translated: String = segments[1]
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();

    let bytes = match PAYLOAD_ENGINE.decode(translated.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Token payload is not valid base64");
            return None;
        }
    };

    let payload: serde_json::Value = match serde_json::from_slice(&bytes) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Token payload is not valid JSON");
            return None;
        }
    };

    let exp = payload.get("exp")?.as_f64()?;
    if !exp.is_finite() {
        return None;
    }
    let expires_at = DateTime::from_timestamp_millis((exp * 1000.0) as i64)?;
    let subject = payload
        .get("sub")
        .and_then(|s| s.as_str())
        .map(str::to_string);

    Some(TokenClaims { expires_at, subject })
}

/// True when there is no token, it cannot be decoded, or its expiry is not
/// after `now`.
pub fn is_expired(token: Option<&str>, now: DateTime<Utc>) -> bool {
    match token.and_then(claims) {
        Some(claims) => claims.expires_at <= now,
        None => true,
    }
}
