use std::sync::{Arc, Mutex};

use tracing::info;

/// Where the user is sent to authenticate again. Gate and sentinel both
/// use this route.
pub const REAUTH_ROUTE: &str = "/usuarios";

/// Receives redirects to the re-authentication route.
pub trait Navigator: Send + Sync {
    fn redirect(&self, route: &str);
}

/// Keeps every redirect so the caller can act on it after a command.
/// Clones share the same record.
#[derive(Debug, Default, Clone)]
pub struct RecordingNavigator {
    routes: Arc<Mutex<Vec<String>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<String> {
        let routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes.clone()
    }

    /// Drain recorded redirects
    pub fn take(&self) -> Vec<String> {
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *routes)
    }
}

impl Navigator for RecordingNavigator {
    fn redirect(&self, route: &str) {
        info!(route, "Redirecting to re-authenticate");
        let mut routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        routes.push(route.to_string());
    }
}
