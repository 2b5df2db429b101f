//! Login, logout and registration flows.
//!
//! Within one login attempt the lock check happens before the network
//! call, and the call's outcome is known before any counter or session is
//! updated. Only a bad-credentials answer advances the lockout; network
//! and server failures leave it alone.

use std::sync::Arc;

use tracing::{debug, info, warn};

use chrono::Duration;

use super::keychain::PasswordVault;
use super::{token, CredentialStore, LockStatus, LockoutTracker, Session};
use crate::api::{ApiClient, ApiError};
use crate::clock::Clock;
use crate::models::UserProfile;
use crate::notify::{NotificationKind, NotificationQueue};
use crate::utils::format_countdown;

/// Only institutional accounts may register
const INSTITUTIONAL_DOMAIN: &str = "@uleam.edu.ec";

/// Minimum password length accepted at registration
const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum length of a registered display name
const MIN_NAME_LENGTH: usize = 3;

pub struct AuthService {
    api: ApiClient,
    credentials: Arc<CredentialStore>,
    lockout: LockoutTracker,
    notifications: NotificationQueue,
    clock: Arc<dyn Clock>,
    vault: Option<Arc<dyn PasswordVault>>,
}

impl AuthService {
    pub fn new(
        api: ApiClient,
        credentials: Arc<CredentialStore>,
        lockout: LockoutTracker,
        notifications: NotificationQueue,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            api,
            credentials,
            lockout,
            notifications,
            clock,
            vault: None,
        }
    }

    /// Keep the password of remembered logins in `vault`.
    pub fn with_vault(mut self, vault: Arc<dyn PasswordVault>) -> Self {
        self.vault = Some(vault);
        self
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn lockout(&self) -> &LockoutTracker {
        &self.lockout
    }

    pub fn notifications(&self) -> &NotificationQueue {
        &self.notifications
    }

    pub fn session(&self) -> Session {
        self.credentials.get()
    }

    /// Drop a stored token that is already expired or unreadable.
    /// Returns whether a usable session remains.
    pub fn restore(&self) -> bool {
        let session = self.credentials.get();
        match session.token {
            None => {
                debug!("No stored session");
                false
            }
            Some(ref t) if token::is_expired(Some(t.as_str()), self.clock.now()) => {
                info!("Stored session has expired, clearing");
                self.credentials.clear();
                false
            }
            Some(_) => {
                debug!("Stored session restored");
                true
            }
        }
    }

    /// Check if the user holds a token that has not expired
    pub fn is_authenticated(&self) -> bool {
        self.credentials.get().is_valid_at(self.clock.now())
    }

    /// Time left on the held token, `None` without a readable token
    pub fn session_time_left(&self) -> Option<Duration> {
        self.credentials.get().time_until_expiry(self.clock.now())
    }

    pub fn lock_status(&self) -> LockStatus {
        self.lockout.status()
    }

    /// Refuse a login attempt while the lock is in force, telling the user
    /// how long is left. Never touches the network.
    pub fn refuse_if_locked(&self) -> Result<(), ApiError> {
        match self.lockout.status() {
            LockStatus::Locked { remaining, .. } => {
                warn!("Login attempted while locked");
                self.notifications.push(
                    format!(
                        "Login temporarily locked. Try again in {}.",
                        format_countdown(remaining)
                    ),
                    NotificationKind::Error,
                );
                Err(ApiError::LockedOut { remaining })
            }
            LockStatus::Open { .. } => Ok(()),
        }
    }

    /// The stored password for `email`, only while "remember me" is on
    pub fn remembered_password(&self, email: &str) -> Option<String> {
        let vault = self.vault.as_ref()?;
        if !self.credentials.remember() {
            return None;
        }
        match vault.recall(email) {
            Ok(password) => password,
            Err(e) => {
                warn!(error = %e, "Remembered password unavailable");
                None
            }
        }
    }

    /// Turn "remember me" off and drop the stored password for `email`
    pub fn forget_password(&self, email: &str) {
        self.credentials.set_remember(false);
        if let Some(ref vault) = self.vault {
            if let Err(e) = vault.forget(email) {
                warn!(error = %e, "Failed to forget stored password");
            }
        }
    }

    pub async fn login(&self, email: &str, password: &str, remember: bool) -> Result<UserProfile, ApiError> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ApiError::InvalidInput("Email and password required".to_string()));
        }

        self.refuse_if_locked()?;

        match self.api.login(email, password).await {
            Ok((token, _)) if token::is_expired(Some(token.as_str()), self.clock.now()) => {
                warn!("Login returned an expired or unreadable token");
                let err = ApiError::InvalidResponse(
                    "Server issued an expired or unreadable token".to_string(),
                );
                self.notifications
                    .push(format!("Login failed: {}", err), NotificationKind::Error);
                Err(err)
            }
            Ok((token, profile)) => {
                self.credentials.set(token, profile.clone());
                self.credentials.set_remember(remember);
                if remember {
                    if let Some(ref vault) = self.vault {
                        if let Err(e) = vault.remember(email, password) {
                            warn!(error = %e, "Failed to remember password");
                        }
                    }
                }
                self.lockout.record_success();
                self.notifications
                    .push("Login successful", NotificationKind::Success);
                info!(user_id = profile.id, "Login successful");
                Ok(profile)
            }
            Err(ApiError::BadCredentials) => {
                match self.lockout.record_failure() {
                    LockStatus::Locked { remaining, .. } => {
                        self.notifications.push(
                            format!(
                                "Too many failed attempts. Login locked for {}.",
                                format_countdown(remaining)
                            ),
                            NotificationKind::Error,
                        );
                    }
                    LockStatus::Open {
                        failed_attempts,
                        attempts_left,
                    } => {
                        self.notifications.push(
                            format!(
                                "Invalid credentials. Failed attempt {}/{}: {} attempt(s) left before lockout.",
                                failed_attempts,
                                failed_attempts + attempts_left,
                                attempts_left
                            ),
                            NotificationKind::Warning,
                        );
                    }
                }
                Err(ApiError::BadCredentials)
            }
            Err(e) => {
                warn!(error = %e, "Login failed");
                self.notifications
                    .push(format!("Login failed: {}", e), NotificationKind::Error);
                Err(e)
            }
        }
    }

    /// Create an institutional account. Does not sign in.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<UserProfile, ApiError> {
        let name = name.trim();
        let email = email.trim();
        validate_registration(name, email, password)?;

        let profile = self.api.register(name, email, password).await?;
        self.notifications.push(
            "Registration complete. You can now log in.",
            NotificationKind::Success,
        );
        info!(user_id = profile.id, "Registered");
        Ok(profile)
    }

    pub fn logout(&self) {
        self.credentials.clear();
        info!("Logged out");
    }
}

fn validate_registration(name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    if name.chars().count() < MIN_NAME_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Name must be at least {} characters",
            MIN_NAME_LENGTH
        )));
    }
    let local_part = email.strip_suffix(INSTITUTIONAL_DOMAIN);
    if local_part.map_or(true, str::is_empty) {
        return Err(ApiError::InvalidInput(format!(
            "Email must be an institutional {} address",
            INSTITUTIONAL_DOMAIN
        )));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ApiError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RecordingNavigator;
    use crate::auth::keychain::MemoryVault;
    use crate::auth::LockoutState;
    use crate::clock::ManualClock;
    use crate::storage::{KeyValueStore, MemoryStore, Storage};
    use crate::test_support::{token_expiring_at, FakeTransport};
    use chrono::{DateTime, Duration};

    const EMAIL: &str = "x@uleam.edu.ec";

    struct Harness {
        auth: AuthService,
        transport: FakeTransport,
        clock: ManualClock,
        backend: MemoryStore,
        vault: MemoryVault,
    }

    /// One "page load" over `backend`
    fn load(backend: &MemoryStore, clock: &ManualClock, transport: &FakeTransport) -> AuthService {
        let storage = Arc::new(Storage::open(Box::new(backend.clone())));
        let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
        let credentials = Arc::new(CredentialStore::new(storage.clone()));
        let notifications = NotificationQueue::new(clock_arc.clone());
        let lockout = LockoutTracker::new(storage, clock_arc.clone())
            .with_notifications(notifications.clone());
        let api = ApiClient::new(
            Arc::new(transport.clone()),
            credentials.clone(),
            clock_arc.clone(),
            Arc::new(RecordingNavigator::new()),
        );
        AuthService::new(api, credentials, lockout, notifications, clock_arc)
    }

    fn harness() -> Harness {
        let clock = ManualClock::new(DateTime::from_timestamp(1_750_000_000, 0).unwrap());
        let transport = FakeTransport::new();
        let backend = MemoryStore::default();
        let vault = MemoryVault::default();
        let auth = load(&backend, &clock, &transport).with_vault(Arc::new(vault.clone()));
        Harness {
            auth,
            transport,
            clock,
            backend,
            vault,
        }
    }

    fn login_ok_body(clock: &ManualClock) -> String {
        let token = token_expiring_at(clock.now() + Duration::hours(12));
        serde_json::json!({
            "access_token": token,
            "token_type": "bearer",
            "usuario": {"id": 42, "nombre": "Maria Mendoza", "email": EMAIL, "rol": "estudiante"}
        })
        .to_string()
    }

    fn bad_credentials(transport: &FakeTransport) {
        transport.respond(401, r#"{"detail": "Email o contrasena incorrectos"}"#);
    }

    fn last_message(auth: &AuthService) -> (NotificationKind, String) {
        let last = auth.notifications().snapshot().pop().expect("a notification");
        (last.kind, last.message)
    }

    #[tokio::test]
    async fn test_successful_login_stores_session() {
        let h = harness();
        h.transport.respond(200, &login_ok_body(&h.clock));

        let profile = h.auth.login(EMAIL, "password1", true).await.unwrap();
        assert_eq!(profile.id, 42);
        assert!(h.auth.is_authenticated());
        assert_eq!(h.auth.session().profile, Some(profile));
        assert_eq!(last_message(&h.auth).0, NotificationKind::Success);
        assert!(h.backend.load().unwrap().contains_key("remember"));
    }

    #[tokio::test]
    async fn test_failed_attempts_warn_with_remaining_count() {
        let h = harness();
        bad_credentials(&h.transport);

        let err = h.auth.login(EMAIL, "wrong-pass", false).await.unwrap_err();
        assert!(matches!(err, ApiError::BadCredentials));
        let (kind, message) = last_message(&h.auth);
        assert_eq!(kind, NotificationKind::Warning);
        assert!(message.contains("1/3"));
        assert!(message.contains("2 attempt(s) left"));
        assert!(!h.auth.session().is_present());
    }

    #[tokio::test]
    async fn test_success_below_threshold_resets_count() {
        let h = harness();
        bad_credentials(&h.transport);
        bad_credentials(&h.transport);
        h.transport.respond(200, &login_ok_body(&h.clock));

        let _ = h.auth.login(EMAIL, "wrong-pass", false).await;
        let _ = h.auth.login(EMAIL, "wrong-pass", false).await;
        assert_eq!(h.auth.lockout().state().failed_attempts, 2);

        h.auth.login(EMAIL, "password1", false).await.unwrap();
        assert_eq!(h.auth.lockout().state(), LockoutState::default());
    }

    #[tokio::test]
    async fn test_lockout_scenario() {
        let h = harness();
        for _ in 0..3 {
            bad_credentials(&h.transport);
            let _ = h.auth.login(EMAIL, "wrong-pass", false).await;
        }
        let third_at = h.clock.now();
        let (kind, message) = last_message(&h.auth);
        assert_eq!(kind, NotificationKind::Error);
        assert!(message.contains("locked for 5:00"));
        assert_eq!(
            h.auth.lockout().state().locked_until,
            (third_at + Duration::minutes(5)).timestamp_millis()
        );

        // Fourth attempt right away never reaches the network
        let err = h.auth.login(EMAIL, "password1", false).await.unwrap_err();
        match err {
            ApiError::LockedOut { remaining } => assert_eq!(remaining, Duration::minutes(5)),
            other => panic!("expected lockout, got {:?}", other),
        }
        assert_eq!(h.transport.requests().len(), 3);
        let (_, message) = last_message(&h.auth);
        assert!(message.contains("Try again in 5:00"));

        // Five minutes later the attempt is evaluated by the server again
        h.clock.advance(Duration::minutes(5));
        h.transport.respond(200, &login_ok_body(&h.clock));
        assert!(h.auth.login(EMAIL, "password1", false).await.is_ok());
        assert_eq!(h.transport.requests().len(), 4);
    }

    #[tokio::test]
    async fn test_refusal_while_locked_never_sends_a_request() {
        let h = harness();
        for _ in 0..3 {
            bad_credentials(&h.transport);
            let _ = h.auth.login(EMAIL, "wrong-pass", false).await;
        }

        assert!(matches!(
            h.auth.refuse_if_locked(),
            Err(ApiError::LockedOut { .. })
        ));
        let (kind, message) = last_message(&h.auth);
        assert_eq!(kind, NotificationKind::Error);
        assert!(message.contains("Try again in 5:00"));

        // Once the lock lapses the check passes and still sends nothing
        h.clock.advance(Duration::minutes(5));
        assert!(h.auth.refuse_if_locked().is_ok());
        assert_eq!(h.transport.requests().len(), 3);
        assert_eq!(h.auth.lockout().state().failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_login_rejects_dead_token_from_server() {
        let h = harness();
        for token in [
            token_expiring_at(h.clock.now() - Duration::seconds(60)),
            "not-a-token".to_string(),
        ] {
            bad_credentials(&h.transport);
            let _ = h.auth.login(EMAIL, "wrong-pass", false).await;

            h.transport.respond(
                200,
                &serde_json::json!({
                    "access_token": token,
                    "usuario": {"id": 42, "nombre": "Maria Mendoza", "email": EMAIL, "rol": "estudiante"}
                })
                .to_string(),
            );
            let err = h.auth.login(EMAIL, "password1", true).await.unwrap_err();
            assert!(matches!(err, ApiError::InvalidResponse(_)));
            assert_eq!(h.auth.session(), Session::empty());
            assert!(!h.backend.load().unwrap().contains_key("token"));
            assert_eq!(last_message(&h.auth).0, NotificationKind::Error);
            // Not a successful login, so the failure count stands
            assert_eq!(h.auth.lockout().state().failed_attempts, 1);
            assert_eq!(h.vault.recall(EMAIL).unwrap(), None);

            h.auth.lockout().record_success();
        }
    }

    #[tokio::test]
    async fn test_session_time_left_follows_clock() {
        let h = harness();
        assert_eq!(h.auth.session_time_left(), None);

        h.transport.respond(200, &login_ok_body(&h.clock));
        h.auth.login(EMAIL, "password1", false).await.unwrap();
        assert_eq!(h.auth.session_time_left(), Some(Duration::hours(12)));

        h.clock.advance(Duration::hours(2));
        assert_eq!(h.auth.session_time_left(), Some(Duration::hours(10)));
    }

    #[tokio::test]
    async fn test_remembered_password_follows_remember_flag() {
        let h = harness();
        h.transport.respond(200, &login_ok_body(&h.clock));
        h.auth.login(EMAIL, "password1", false).await.unwrap();
        assert_eq!(h.vault.recall(EMAIL).unwrap(), None);
        assert_eq!(h.auth.remembered_password(EMAIL), None);

        h.transport.respond(200, &login_ok_body(&h.clock));
        h.auth.login(EMAIL, "password1", true).await.unwrap();
        assert_eq!(h.auth.remembered_password(EMAIL).as_deref(), Some("password1"));

        h.auth.forget_password(EMAIL);
        assert_eq!(h.auth.remembered_password(EMAIL), None);
        assert_eq!(h.vault.recall(EMAIL).unwrap(), None);
        assert!(!h.backend.load().unwrap().contains_key("remember"));
    }

    #[tokio::test]
    async fn test_lockout_survives_reload() {
        let h = harness();
        for _ in 0..3 {
            bad_credentials(&h.transport);
            let _ = h.auth.login(EMAIL, "wrong-pass", false).await;
        }
        drop(h.auth);

        h.clock.advance(Duration::minutes(2));
        let reloaded = load(&h.backend, &h.clock, &h.transport);
        match reloaded.lock_status() {
            LockStatus::Locked { remaining, .. } => assert_eq!(remaining, Duration::minutes(3)),
            other => panic!("expected lock, got {:?}", other),
        }
        assert!(reloaded.login(EMAIL, "password1", false).await.is_err());
        assert_eq!(h.transport.requests().len(), 3);

        h.clock.advance(Duration::minutes(4));
        let reloaded = load(&h.backend, &h.clock, &h.transport);
        assert_eq!(
            reloaded.lock_status(),
            LockStatus::Open { failed_attempts: 0, attempts_left: 3 }
        );
    }

    #[tokio::test]
    async fn test_server_error_does_not_count_as_failure() {
        let h = harness();
        h.transport.respond(500, "boom");

        let err = h.auth.login(EMAIL, "password1", false).await.unwrap_err();
        assert!(matches!(err, ApiError::ServerError(_)));
        assert_eq!(h.auth.lockout().state().failed_attempts, 0);
        assert_eq!(last_message(&h.auth).0, NotificationKind::Error);
    }

    #[tokio::test]
    async fn test_empty_credentials_rejected_locally() {
        let h = harness();
        assert!(matches!(
            h.auth.login("  ", "password1", false).await,
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            h.auth.login(EMAIL, "", false).await,
            Err(ApiError::InvalidInput(_))
        ));
        assert!(h.transport.requests().is_empty());
        assert_eq!(h.auth.lockout().state().failed_attempts, 0);
    }

    #[tokio::test]
    async fn test_restore_clears_expired_session() {
        let h = harness();
        h.transport.respond(200, &login_ok_body(&h.clock));
        h.auth.login(EMAIL, "password1", false).await.unwrap();
        drop(h.auth);

        let reloaded = load(&h.backend, &h.clock, &h.transport);
        assert!(reloaded.restore());

        h.clock.advance(Duration::hours(13));
        let reloaded = load(&h.backend, &h.clock, &h.transport);
        assert!(!reloaded.restore());
        assert_eq!(reloaded.session(), Session::empty());
        assert!(!h.backend.load().unwrap().contains_key("token"));
    }

    #[tokio::test]
    async fn test_logout_clears_session() {
        let h = harness();
        h.transport.respond(200, &login_ok_body(&h.clock));
        h.auth.login(EMAIL, "password1", false).await.unwrap();

        h.auth.logout();
        assert!(!h.auth.is_authenticated());
        assert_eq!(h.auth.session(), Session::empty());
    }

    #[tokio::test]
    async fn test_register_validates_locally() {
        let h = harness();
        let cases = [
            ("Al", EMAIL, "password1"),
            ("Ana Zambrano", "ana@gmail.com", "password1"),
            ("Ana Zambrano", "@uleam.edu.ec", "password1"),
            ("Ana Zambrano", EMAIL, "short"),
        ];
        for (name, email, password) in cases {
            assert!(matches!(
                h.auth.register(name, email, password).await,
                Err(ApiError::InvalidInput(_))
            ));
        }
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_register_success_notifies() {
        let h = harness();
        h.transport.respond(
            200,
            r#"{"id": 5, "nombre": "Ana Zambrano", "email": "ana@uleam.edu.ec", "rol": "estudiante"}"#,
        );
        let profile = h
            .auth
            .register("Ana Zambrano", "ana@uleam.edu.ec", "password1")
            .await
            .unwrap();
        assert_eq!(profile.id, 5);
        assert_eq!(last_message(&h.auth).0, NotificationKind::Success);
        // Registration does not sign in
        assert!(!h.auth.is_authenticated());
    }
}
