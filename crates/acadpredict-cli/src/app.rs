//! Application wiring and command handlers.
//!
//! One `App` is one "page load": it reopens the persisted session and
//! lockout state, drops a dead token, and runs a single command.

use std::io::{self, Write as _};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use acadpredict_core::api::{ApiError, HttpTransport, RecordingNavigator};
use acadpredict_core::auth::{Keychain, LockStatus};
use acadpredict_core::storage::FileStore;
use acadpredict_core::utils::format_countdown;
use acadpredict_core::{
    ApiClient, AuthService, Clock, Config, CredentialStore, LockoutTracker, NotificationQueue,
    Storage, SystemClock,
};

pub struct App {
    config: Config,
    auth: AuthService,
    navigator: RecordingNavigator,
}

impl App {
    /// Create a new application instance
    pub fn new(api_url: Option<String>) -> Result<Self> {
        let mut config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        config.apply_env();
        if let Some(url) = api_url {
            config.api_base_url = url;
        }
        debug!(api = %config.api_base_url, "Config loaded");

        let state_dir = config.state_dir().unwrap_or_else(|_| PathBuf::from("./state"));
        debug!(?state_dir, "State directory configured");

        let storage = Arc::new(Storage::open(Box::new(FileStore::new(state_dir))));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let credentials = Arc::new(CredentialStore::new(storage.clone()));
        let notifications = NotificationQueue::new(clock.clone());
        let lockout =
            LockoutTracker::new(storage, clock.clone()).with_notifications(notifications.clone());
        let navigator = RecordingNavigator::new();

        let transport = HttpTransport::new(&config.api_base_url, config.request_timeout())?;
        let api = ApiClient::new(
            Arc::new(transport),
            credentials.clone(),
            clock.clone(),
            Arc::new(navigator.clone()),
        );

        let auth = AuthService::new(api, credentials, lockout, notifications, clock)
            .with_vault(Arc::new(Keychain::default()));
        let restored = auth.restore();
        debug!(restored, "Session checked");

        Ok(Self {
            config,
            auth,
            navigator,
        })
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub async fn login(&mut self, email: Option<String>, remember: bool) -> Result<()> {
        let email = match email.or_else(|| self.config.last_email.clone()) {
            Some(email) => email,
            None => prompt_line("Email: ")?,
        };

        // Refuse before asking for a password
        if let Err(ApiError::LockedOut { remaining }) = self.auth.refuse_if_locked() {
            self.print_notifications();
            println!(
                "Run `acadpredict lock-status --watch` to wait out the remaining {}.",
                format_countdown(remaining)
            );
            return Ok(());
        }

        let stored = match self.auth.remembered_password(&email) {
            Some(stored) => {
                let answer = prompt_line("Use stored password? [Y/n]: ")?;
                (answer.to_lowercase() != "n").then_some(stored)
            }
            None => None,
        };
        let password = match stored {
            Some(stored) => stored,
            None => rpassword::prompt_password("Password: ")?,
        };

        println!("\nAuthenticating...");
        let result = self.auth.login(&email, &password, remember).await;
        self.print_notifications();

        match result {
            Ok(profile) => {
                self.config.last_email = Some(email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                println!("Welcome, {} ({})", profile.first_name(), profile.role);
            }
            Err(ApiError::LockedOut { remaining }) => {
                println!("Login is locked for another {}.", format_countdown(remaining));
            }
            Err(ApiError::BadCredentials) => {
                // The notification already explains the remaining attempts
            }
            Err(e) => println!("{}", user_message(&e)),
        }
        Ok(())
    }

    pub async fn register(&mut self) -> Result<()> {
        let name = prompt_line("Full name: ")?;
        let email = prompt_line("Institutional email: ")?;
        let password = rpassword::prompt_password("Password: ")?;
        let confirm = rpassword::prompt_password("Confirm password: ")?;
        if password != confirm {
            println!("Passwords do not match.");
            return Ok(());
        }

        let result = self.auth.register(&name, &email, &password).await;
        self.print_notifications();
        match result {
            Ok(profile) => {
                self.config.last_email = Some(profile.email);
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
            Err(e) => println!("{}", user_message(&e)),
        }
        Ok(())
    }

    pub fn logout(&mut self, forget: bool) -> Result<()> {
        self.auth.logout();
        if forget {
            match self.config.last_email {
                Some(ref email) => self.auth.forget_password(email),
                None => println!("No remembered account to forget."),
            }
        }
        println!("Logged out.");
        Ok(())
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn status(&self) {
        let session = self.auth.session();
        match session.profile {
            Some(ref profile) if self.auth.is_authenticated() => {
                println!("Signed in as {} <{}>", profile.name, profile.email);
                if let Some(left) = self.auth.session_time_left() {
                    println!("Session expires in {} minute(s)", left.num_minutes().max(0));
                }
            }
            _ => println!("Not signed in."),
        }
        self.print_lock_status(&self.auth.lock_status());
    }

    pub async fn lock_status(&self, watch: bool) -> Result<()> {
        let status = self.auth.lock_status();
        if !watch || !status.is_locked() {
            self.print_lock_status(&status);
            return Ok(());
        }

        let mut stdout = io::stdout();
        let last = self
            .auth
            .lockout()
            .watch_countdown(|status| {
                if let LockStatus::Locked { remaining, .. } = status {
                    let _ = write!(
                        stdout,
                        "\rLocked - time remaining {} ",
                        format_countdown(*remaining)
                    );
                    let _ = stdout.flush();
                }
            })
            .await;
        println!();
        self.print_lock_status(&last);
        self.print_notifications();
        Ok(())
    }

    fn print_lock_status(&self, status: &LockStatus) {
        match status {
            LockStatus::Locked { remaining, .. } => {
                println!("Login locked - time remaining {}", format_countdown(*remaining));
            }
            LockStatus::Open {
                failed_attempts: 0, ..
            } => println!("Login available."),
            LockStatus::Open {
                failed_attempts,
                attempts_left,
            } => println!(
                "Login available - {} failed attempt(s), {} left before a temporary lock.",
                failed_attempts, attempts_left
            ),
        }
    }

    // =========================================================================
    // Authenticated calls
    // =========================================================================

    pub async fn stats(&self) -> Result<()> {
        match self.auth.api().overview().await {
            Ok((stats, metrics)) => {
                println!("Users:        {}", stats.total_users);
                println!("Predictions:  {}", stats.total_predictions);
                println!(
                    "Risk:         high {} / medium {} / low {}",
                    stats.high_risk, stats.medium_risk, stats.low_risk
                );
                println!("Avg. score:   {:.2}", stats.average_score);
                println!("Early alerts: {}", stats.early_alerts);
                let best = metrics
                    .as_ref()
                    .and_then(|m| m.get("best_model"))
                    .and_then(|m| m.as_str());
                if let Some(best) = best {
                    println!("Model:        {}", best);
                }
            }
            Err(e) => return self.report(e),
        }
        Ok(())
    }

    pub async fn history(&self) -> Result<()> {
        match self.auth.api().my_predictions().await {
            Ok(records) if records.is_empty() => println!("No predictions yet."),
            Ok(records) => {
                for record in records {
                    let flag = if record.is_high_risk() { " !" } else { "" };
                    println!(
                        "#{:<5} {}  risk {:<6} score {:>6.2}{}",
                        record.id,
                        record.created_at.format("%Y-%m-%d"),
                        record.risk,
                        record.score,
                        flag
                    );
                }
            }
            Err(e) => return self.report(e),
        }
        Ok(())
    }

    pub async fn health(&self) -> Result<()> {
        match self.auth.api().health().await {
            Ok(true) => println!("Service is up at {}", self.config.api_base_url),
            Ok(false) => println!("Service at {} is not healthy", self.config.api_base_url),
            Err(e) => println!("{}", user_message(&e)),
        }
        Ok(())
    }

    /// Explain a failed call, pointing at login when the session ended
    fn report(&self, e: ApiError) -> Result<()> {
        let redirected = !self.navigator.take().is_empty();
        if e.is_session_loss() || redirected {
            println!("Your session has ended. Run `acadpredict login` to sign in again.");
        } else {
            println!("{}", user_message(&e));
        }
        Ok(())
    }

    fn print_notifications(&self) {
        for n in self.auth.notifications().snapshot() {
            println!("[{}] {}", n.kind.label(), n.message);
        }
    }
}

/// User-friendly message for an API error
fn user_message(e: &ApiError) -> String {
    match e {
        ApiError::Network(err) if err.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        ApiError::Network(_) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        other => other.to_string(),
    }
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
