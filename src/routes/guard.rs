//! Route guard: runs before every handler.
//!
//! SYSTEM CONTEXT
//! ==============
//! The guard is the only place the session cookie is decoded. A valid
//! session is wrapped in an [`AuthSession`] and attached to the request so
//! handlers can fetch on its behalf. After the handler returns, the guard
//! reads the session outcome and re-issues the cookie when tokens were
//! rotated, or clears it when the session was signed out.
//!
//! DESIGN
//! ======
//! [`decide`] is a pure function of the path and the verified role; the
//! middleware only gathers its inputs and applies the answer.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::routes::auth::{SESSION_COOKIE, clear_session_cookie, session_cookie};
use crate::services::account::ADMIN_HOME;
use crate::services::auth_fetch::{AuthSession, LOGIN_PATH, SessionOutcome};
use crate::services::session::Role;
use crate::state::AppState;

const PUBLIC_PATHS: [&str; 6] = ["/login", "/register", "/about", "/api/auth/error", "/api/register", "/healthz"];
const PUBLIC_PREFIXES: [&str; 4] = ["/api/auth", "/design", "/fabrics", "/measurement"];
const STATIC_PREFIXES: [&str; 3] = ["/uploads/", "/images/", "/assets/"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(String),
}

/// Static files never reach the guard's decision.
#[must_use]
pub fn is_static_asset(path: &str) -> bool {
    path == "/favicon.ico" || STATIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

#[must_use]
pub fn is_public_path(path: &str) -> bool {
    path == "/"
        || PUBLIC_PATHS.contains(&path)
        || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Decide what to do with a request for `path`. `role` is `None` when there
/// is no session or the cookie failed verification.
#[must_use]
pub fn decide(path: &str, role: Option<Role>) -> GuardDecision {
    let public = is_public_path(path);
    match role {
        None if !public => GuardDecision::Redirect(login_with_return(path)),
        None => GuardDecision::Allow,
        Some(role) if path == "/login" || path == "/register" => {
            let home = if role.is_admin() { ADMIN_HOME } else { "/" };
            GuardDecision::Redirect(home.to_owned())
        }
        Some(_) => GuardDecision::Allow,
    }
}

/// `/login?redirect=<path>` with the path form-encoded, so `&`, `+` and `%`
/// in it come back unchanged.
fn login_with_return(path: &str) -> String {
    let query = reqwest::Url::parse_with_params("http://localhost/", [("redirect", path)])
        .ok()
        .and_then(|url| url.query().map(str::to_owned));
    match query {
        Some(query) => format!("{LOGIN_PATH}?{query}"),
        None => LOGIN_PATH.to_owned(),
    }
}

/// Guard middleware, installed with `axum::middleware::from_fn_with_state`.
pub async fn route_guard(State(state): State<AppState>, jar: CookieJar, mut request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    if is_static_asset(&path) {
        return next.run(request).await;
    }

    let session = jar
        .get(SESSION_COOKIE)
        .map(|cookie| state.sessions.decode(cookie.value()))
        .and_then(|decoded| match decoded {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::debug!(%path, error = %e, "ignoring invalid session cookie");
                None
            }
        });

    match decide(&path, session.as_ref().map(|s| s.user.role)) {
        GuardDecision::Redirect(to) => {
            tracing::debug!(%path, %to, "guard redirect");
            Redirect::temporary(&to).into_response()
        }
        GuardDecision::Allow => {
            let Some(session) = session else {
                return next.run(request).await;
            };
            let auth = AuthSession::new(session);
            request.extensions_mut().insert(auth.clone());
            let response = next.run(request).await;
            apply_outcome(&state, &auth, response).await
        }
    }
}

/// Re-issue or clear the session cookie according to what the handler did.
async fn apply_outcome(state: &AppState, auth: &AuthSession, response: Response) -> Response {
    match auth.outcome().await {
        SessionOutcome::Unchanged => response,
        SessionOutcome::Rotated(session) => match state.sessions.encode(&session) {
            Ok(value) => {
                let jar = CookieJar::new().add(session_cookie(&state.config, value));
                (jar, response).into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to re-issue session cookie");
                response
            }
        },
        SessionOutcome::SignedOut => {
            let jar = CookieJar::new().add(clear_session_cookie(&state.config));
            (jar, response).into_response()
        }
    }
}

#[cfg(test)]
#[path = "guard_test.rs"]
mod tests;
