//! Authenticated fetch wrapper and the per-request session context.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every handler that talks to the backend on behalf of a signed-in user goes
//! through [`AuthFetcher::fetch`]. It attaches the bearer token, and on a
//! 401/403 refreshes the token pair once and replays the request once.
//!
//! DESIGN
//! ======
//! - [`AuthSession`] is an explicit context object created from the session
//!   cookie and passed down; nothing is held in a global.
//! - Refresh is single-flight per session: concurrent callers queue on a
//!   gate, and whoever gets it second sees the rotated token and reuses it.
//! - A failed refresh signs the session out, so queued callers fail the same
//!   way instead of retrying with a dead refresh token.
//! - The route layer reads [`AuthSession::outcome`] after the handler ran to
//!   re-issue or clear the cookie.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use tokio::sync::{Mutex, RwLock};

use crate::error::ErrorCode;
use crate::services::backend::{ApiRequest, ApiResponse, BackendApi, BackendError};
use crate::services::session::{Session, SessionUser};

pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired. Please sign in again.";

/// Where a signed-out browser is sent.
pub const LOGIN_PATH: &str = "/login";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The session could not be refreshed and has been signed out.
    #[error("{}", SESSION_EXPIRED_MESSAGE)]
    SessionExpired,

    /// Transport failure talking to the backend.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ErrorCode for FetchError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SessionExpired => "E_SESSION_EXPIRED",
            Self::Backend(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::SessionExpired => StatusCode::UNAUTHORIZED,
            Self::Backend(e) => e.status(),
        }
    }

    fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::SessionExpired => Some(LOGIN_PATH),
            Self::Backend(_) => None,
        }
    }
}

// =============================================================================
// SESSION CONTEXT
// =============================================================================

/// What happened to the session while a request was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Unchanged,
    /// Tokens were rotated; the cookie must be re-issued.
    Rotated(Session),
    /// The session was signed out; the cookie must be cleared.
    SignedOut,
}

struct SessionState {
    session: Option<Session>,
    rotated: bool,
    signed_out: bool,
}

struct AuthSessionInner {
    state: RwLock<SessionState>,
    refresh_gate: Mutex<()>,
}

/// Shared, cloneable handle to one browser session for the lifetime of a request.
#[derive(Clone)]
pub struct AuthSession {
    inner: Arc<AuthSessionInner>,
}

impl AuthSession {
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self::from_state(Some(session))
    }

    /// A context with no session; any 401 signs it "out" immediately.
    #[cfg(test)]
    #[must_use]
    pub fn anonymous() -> Self {
        Self::from_state(None)
    }

    fn from_state(session: Option<Session>) -> Self {
        Self {
            inner: Arc::new(AuthSessionInner {
                state: RwLock::new(SessionState { session, rotated: false, signed_out: false }),
                refresh_gate: Mutex::new(()),
            }),
        }
    }

    pub async fn snapshot(&self) -> Option<Session> {
        let state = self.inner.state.read().await;
        if state.signed_out {
            return None;
        }
        state.session.clone()
    }

    pub async fn user(&self) -> Option<SessionUser> {
        self.snapshot().await.map(|s| s.user)
    }

    pub async fn access_token(&self) -> Option<String> {
        let state = self.inner.state.read().await;
        if state.signed_out {
            return None;
        }
        state
            .session
            .as_ref()
            .map(|s| s.access_token.clone())
            .filter(|t| !t.is_empty())
    }

    pub async fn can_refresh(&self) -> bool {
        let state = self.inner.state.read().await;
        !state.signed_out && state.session.as_ref().is_some_and(Session::can_refresh)
    }

    #[cfg(test)]
    pub async fn is_signed_out(&self) -> bool {
        self.inner.state.read().await.signed_out
    }

    /// Force sign-out. Idempotent.
    pub async fn sign_out(&self) {
        let mut state = self.inner.state.write().await;
        if !state.signed_out {
            tracing::info!(user_id = ?state.session.as_ref().map(|s| s.user.id.as_str()), "session signed out");
        }
        state.signed_out = true;
    }

    pub async fn outcome(&self) -> SessionOutcome {
        let state = self.inner.state.read().await;
        if state.signed_out {
            return SessionOutcome::SignedOut;
        }
        match (&state.session, state.rotated) {
            (Some(session), true) => SessionOutcome::Rotated(session.clone()),
            _ => SessionOutcome::Unchanged,
        }
    }

    /// Obtain a fresh access token after `stale` was rejected.
    ///
    /// At most one refresh runs at a time. A caller that waited while another
    /// rotated the pair gets the rotated token without a second refresh. On
    /// success the new pair is persisted into the session, then the caller
    /// pauses for `settle` before using it.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::SessionExpired`] (and signs out) if the session
    /// cannot be refreshed or the refresh call fails.
    pub async fn refresh(
        &self,
        backend: &dyn BackendApi,
        stale: Option<&str>,
        settle: Duration,
    ) -> Result<String, FetchError> {
        let gate = self.inner.refresh_gate.lock().await;

        let plan = {
            let state = self.inner.state.read().await;
            match state.session.as_ref() {
                _ if state.signed_out => None,
                // Rotated by another caller while we waited on the gate.
                Some(session) if stale.unwrap_or_default() != session.access_token => {
                    return Ok(session.access_token.clone());
                }
                Some(session) if session.can_refresh() => {
                    Some((session.user.id.clone(), session.refresh_token.clone()))
                }
                _ => None,
            }
        };
        let Some((user_id, refresh_token)) = plan else {
            self.sign_out().await;
            return Err(FetchError::SessionExpired);
        };

        match backend.refresh_tokens(&user_id, &refresh_token).await {
            Ok(tokens) => {
                let access_token = tokens.access_token.clone();
                {
                    let mut state = self.inner.state.write().await;
                    if let Some(session) = state.session.as_mut() {
                        session.rotate(tokens);
                    }
                    state.rotated = true;
                }
                drop(gate);
                tracing::info!(%user_id, "session tokens refreshed");
                if !settle.is_zero() {
                    tokio::time::sleep(settle).await;
                }
                Ok(access_token)
            }
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "token refresh failed");
                self.sign_out().await;
                Err(FetchError::SessionExpired)
            }
        }
    }
}

// =============================================================================
// FETCHER
// =============================================================================

/// Bearer-attaching, refresh-once-on-401 wrapper around [`BackendApi`].
#[derive(Clone)]
pub struct AuthFetcher {
    backend: Arc<dyn BackendApi>,
    settle: Duration,
}

impl AuthFetcher {
    pub fn new(backend: Arc<dyn BackendApi>, settle: Duration) -> Self {
        Self { backend, settle }
    }

    /// Issue `request` with the session's bearer token.
    ///
    /// Non-2xx answers other than a persistent 401/403 are returned as-is for
    /// the caller to interpret.
    ///
    /// # Errors
    ///
    /// - [`FetchError::SessionExpired`] when refresh fails or the retry is
    ///   still rejected; the session is signed out in both cases.
    /// - [`FetchError::Backend`] on transport failure.
    pub async fn fetch(&self, session: &AuthSession, request: &ApiRequest) -> Result<ApiResponse, FetchError> {
        let token = session.access_token().await;
        let mut response = self.backend.send(request, token.as_deref()).await?;

        if response.is_auth_failure() {
            if session.can_refresh().await {
                tracing::debug!(path = %request.path, status = response.status.as_u16(), "access token rejected, refreshing");
                let fresh = session
                    .refresh(self.backend.as_ref(), token.as_deref(), self.settle)
                    .await?;
                response = self.backend.send(request, Some(&fresh)).await?;
            }

            if response.is_auth_failure() {
                tracing::warn!(path = %request.path, status = response.status.as_u16(), "still unauthorized, signing out");
                session.sign_out().await;
                return Err(FetchError::SessionExpired);
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
#[path = "auth_fetch_test.rs"]
mod tests;
