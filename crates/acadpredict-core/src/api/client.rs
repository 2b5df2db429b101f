//! API client for the academic prediction service.
//!
//! Every authenticated call is admitted by the `RequestGate` before it is
//! handed to the transport and inspected by the `ResponseSentinel` as soon
//! as a status comes back. Login and registration go straight to the
//! transport: a 401 from login means bad credentials, not a lost session.

use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::gate::RequestGate;
use super::navigator::Navigator;
use super::sentinel::ResponseSentinel;
use super::transport::{ApiRequest, ApiResponse, Method, Transport};
use super::ApiError;
use crate::auth::CredentialStore;
use crate::clock::Clock;
use crate::models::{
    LoginRequest, LoginResponse, PredictionRecord, RegisterRequest, Stats, UserProfile,
};

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "/api/auth/login";
const REGISTER_PATH: &str = "/api/auth/register";
const STATS_PATH: &str = "/api/stats";
const MY_PREDICTIONS_PATH: &str = "/api/students/me/predicciones";
const MODEL_METRICS_PATH: &str = "/api/model/metrics";
const HEALTH_PATH: &str = "/health";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client. Clone is cheap; clones share transport and session.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    gate: RequestGate,
    sentinel: ResponseSentinel,
}

impl ApiClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: Arc<CredentialStore>,
        clock: Arc<dyn Clock>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            transport,
            gate: RequestGate::new(credentials.clone(), clock, navigator.clone()),
            sentinel: ResponseSentinel::new(credentials, navigator),
        }
    }

    // ===== Authentication =====

    /// Exchange email and password for a token and profile.
    /// A 401 maps to `BadCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, UserProfile), ApiError> {
        let body = serde_json::to_value(LoginRequest { email, password })
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
        let response = self.send_public(Method::Post, LOGIN_PATH, Some(body)).await?;

        if response.status == 401 {
            return Err(ApiError::BadCredentials);
        }
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }

        let parsed: LoginResponse = response.json()?;
        parsed.into_profile().ok_or_else(|| {
            ApiError::InvalidResponse("Login response carried no user profile".to_string())
        })
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let body = serde_json::to_value(RegisterRequest { name, email, password })
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
        let response = self.send_public(Method::Post, REGISTER_PATH, Some(body)).await?;
        if !response.is_success() {
            return Err(ApiError::from_status(response.status, &response.body));
        }
        response.json()
    }

    // ===== Request plumbing =====

    async fn send_public(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let request = ApiRequest {
            method,
            path: path.to_string(),
            bearer: None,
            body,
        };
        self.transport.send(request).await
    }

    /// Send through gate and sentinel, retrying 429 with exponential backoff.
    async fn send_authenticated(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<ApiResponse, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let bearer = self.gate.admit()?;
            let request = ApiRequest {
                method,
                path: path.to_string(),
                bearer: bearer.clone(),
                body: body.clone(),
            };

            let response = self.transport.send(request).await?;
            self.sentinel.inspect(bearer.as_deref(), response.status)?;

            if response.is_success() {
                debug!(path, status = response.status, "Request succeeded");
                return Ok(response);
            }
            if response.status != 429 {
                return Err(ApiError::from_status(response.status, &response.body));
            }

            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(path, retry = retries, backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2; // Exponential backoff
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_authenticated(Method::Get, path, None).await?.json()
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::InvalidInput(e.to_string()))?;
        self.send_authenticated(Method::Post, path, Some(body)).await?.json()
    }

    // ===== Data Fetching Methods =====

    /// Dashboard statistics
    pub async fn stats(&self) -> Result<Stats, ApiError> {
        self.get(STATS_PATH).await
    }

    /// Prediction history of the signed-in user
    pub async fn my_predictions(&self) -> Result<Vec<PredictionRecord>, ApiError> {
        self.get(MY_PREDICTIONS_PATH).await
    }

    /// Report on the trained model, passed through as JSON
    pub async fn model_metrics(&self) -> Result<serde_json::Value, ApiError> {
        self.get(MODEL_METRICS_PATH).await
    }

    /// Statistics plus the model report. The calls run one after the
    /// other so a session lost on the first ends the fetch; an unavailable
    /// report is `None`.
    pub async fn overview(&self) -> Result<(Stats, Option<serde_json::Value>), ApiError> {
        let stats = self.stats().await?;
        match self.model_metrics().await {
            Ok(metrics) => Ok((stats, Some(metrics))),
            Err(e) if e.is_session_loss() => Err(e),
            Err(e) => {
                debug!(error = %e, "Model metrics unavailable");
                Ok((stats, None))
            }
        }
    }

    /// Service liveness; needs no session
    pub async fn health(&self) -> Result<bool, ApiError> {
        let response = self.send_public(Method::Get, HEALTH_PATH, None).await?;
        Ok(response.is_success())
    }
}
