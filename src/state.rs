//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the parsed config, the backend transport, the authenticated fetch
//! wrapper built on top of it, and the session-cookie codec. Nothing here is
//! mutable; per-session state travels with each request.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::auth_fetch::AuthFetcher;
use crate::services::backend::BackendApi;
use crate::services::session::SessionCodec;

/// Clone is required by Axum; all fields are Arc-wrapped or cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Arc<dyn BackendApi>,
    pub fetcher: AuthFetcher,
    pub sessions: SessionCodec,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, backend: Arc<dyn BackendApi>) -> Self {
        let fetcher = AuthFetcher::new(backend.clone(), config.refresh_settle);
        let sessions = SessionCodec::new(&config.session_secret, config.session_max_age_secs);
        Self { config: Arc::new(config), backend, fetcher, sessions }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
