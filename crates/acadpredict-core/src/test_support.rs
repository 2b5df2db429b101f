//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};

use crate::api::{ApiError, ApiRequest, ApiResponse, Transport};
use crate::models::UserProfile;

/// Build an unsigned JWT-shaped token around `payload`.
pub(crate) fn make_token(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.signature", header, body)
}

pub(crate) fn token_expiring_at(at: DateTime<Utc>) -> String {
    make_token(serde_json::json!({ "sub": "x@uleam.edu.ec", "id": 42, "exp": at.timestamp() }))
}

pub(crate) fn profile() -> UserProfile {
    UserProfile {
        id: 42,
        name: "Maria Mendoza".to_string(),
        email: "x@uleam.edu.ec".to_string(),
        role: "estudiante".to_string(),
    }
}

#[derive(Default)]
struct FakeState {
    requests: Vec<ApiRequest>,
    queued: VecDeque<ApiResponse>,
    fallback: Option<ApiResponse>,
}

/// Records every request that reaches the "network" and answers from a
/// queue of canned responses.
#[derive(Clone, Default)]
pub(crate) struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queue one response
    pub(crate) fn respond(&self, status: u16, body: &str) {
        let mut state = self.state.lock().unwrap();
        state.queued.push_back(ApiResponse {
            status,
            body: body.to_string(),
        });
    }

    /// Answer with this once the queue is empty
    pub(crate) fn respond_always(&self, status: u16, body: &str) {
        let mut state = self.state.lock().unwrap();
        state.fallback = Some(ApiResponse {
            status,
            body: body.to_string(),
        });
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.state.lock().unwrap().requests.push(request);

        // Stay in flight for one scheduling round
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        match state.queued.pop_front() {
            Some(response) => Ok(response),
            None => state
                .fallback
                .clone()
                .ok_or_else(|| ApiError::InvalidResponse("no response queued".to_string())),
        }
    }
}
