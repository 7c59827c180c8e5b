//! Auth routes: login, logout, registration, confirmation, session cookie.

use axum::extract::{FromRequestParts, Query, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use time::Duration;

use crate::config::AppConfig;
use crate::error::{error_response, error_response_from};
use crate::services::account::{self, Registration};
use crate::services::auth_fetch::AuthSession;
use crate::services::backend;
use crate::services::session::{SessionUser, TokenPair};
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session_token";

pub(crate) fn session_cookie(config: &AppConfig, value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(Duration::seconds(config.session_max_age_secs))
        .build()
}

pub(crate) fn clear_session_cookie(config: &AppConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.cookie_secure)
        .max_age(Duration::ZERO)
        .build()
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Signed-in user, taken from the session the route guard attached.
/// Use as a handler parameter to require authentication.
pub struct SignedIn {
    pub session: AuthSession,
    pub user: SessionUser,
}

impl<S> FromRequestParts<S> for SignedIn
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = parts
            .extensions
            .get::<AuthSession>()
            .cloned()
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))?;
        let user = session
            .user()
            .await
            .ok_or_else(|| error_response(StatusCode::UNAUTHORIZED, "Unauthorized"))?;
        Ok(Self { session, user })
    }
}

/// Whatever session the guard attached, if any. Never rejects.
pub struct CurrentSession(pub Option<AuthSession>);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<AuthSession>().cloned()))
    }
}

/// Signed-in user whose role is `admin`; anyone else gets 403.
pub struct AdminUser(pub SignedIn);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let signed_in = SignedIn::from_request_parts(parts, state).await?;
        if !signed_in.user.role.is_admin() {
            tracing::warn!(user_id = %signed_in.user.id, path = %parts.uri.path(), "non-admin refused");
            return Err(error_response(StatusCode::FORBIDDEN, "Forbidden"));
        }
        Ok(Self(signed_in))
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    redirect: Option<String>,
}

/// `POST /api/auth/login`: check credentials with the backend, set the cookie.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Response {
    let email = body.email.trim();
    if email.is_empty() || body.password.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Email and password are required.");
    }

    let session = match backend::login(state.backend.as_ref(), email, &body.password).await {
        Ok(Some(session)) => session,
        Ok(None) => return error_response(StatusCode::UNAUTHORIZED, "Invalid email or password"),
        Err(e) => {
            tracing::error!(error = %e, "login request failed");
            return error_response_from(&e);
        }
    };

    let value = match state.sessions.encode(&session) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(error = %e, "session encode failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session");
        }
    };

    let redirect = account::post_login_redirect(session.user.role, body.redirect.as_deref());
    tracing::info!(user_id = %session.user.id, role = session.user.role.as_str(), "signed in");
    let jar = CookieJar::new().add(session_cookie(&state.config, value));
    let body = serde_json::json!({ "ok": true, "redirect": redirect, "user": session.user });
    (jar, Json(body)).into_response()
}

/// `POST /api/auth/logout`: clear the cookie.
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    let jar = CookieJar::new().add(clear_session_cookie(&state.config));
    (jar, StatusCode::NO_CONTENT)
}

/// `POST /api/auth/register`.
pub async fn register(State(state): State<AppState>, Json(form): Json<Registration>) -> Response {
    match account::register(state.backend.as_ref(), &form).await {
        Ok(()) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "ok": true,
                "message": "Registration successful! Please check your email to confirm your account.",
            })),
        )
            .into_response(),
        Err(e) => error_response_from(&e),
    }
}

#[derive(Deserialize)]
pub struct ConfirmQuery {
    token: Option<String>,
}

/// `GET /api/auth/confirm?token=`.
pub async fn confirm(State(state): State<AppState>, Query(query): Query<ConfirmQuery>) -> Response {
    let Some(token) = query.token.filter(|t| !t.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid confirmation link.");
    };
    match backend::confirm_account(state.backend.as_ref(), &token).await {
        Ok(()) => Json(serde_json::json!({
            "ok": true,
            "message": "Your account has been confirmed! You can now log in.",
        }))
        .into_response(),
        Err(e) => error_response_from(&e),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionBody {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// `POST /api/auth/update-session`: store a new token pair in the cookie.
pub async fn update_session(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    Json(body): Json<UpdateSessionBody>,
) -> Response {
    let (Some(access_token), Some(refresh_token)) = (
        body.access_token.filter(|t| !t.is_empty()),
        body.refresh_token.filter(|t| !t.is_empty()),
    ) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing tokens");
    };

    let current = match session {
        Some(session) => session.snapshot().await,
        None => None,
    };
    let Some(mut current) = current else {
        return error_response(StatusCode::UNAUTHORIZED, "No session");
    };

    current.rotate(TokenPair { access_token, refresh_token });
    match state.sessions.encode(&current) {
        Ok(value) => {
            let jar = CookieJar::new().add(session_cookie(&state.config, value));
            (jar, Json(serde_json::json!({ "ok": true }))).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "session encode failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to update session")
        }
    }
}

/// `GET /api/auth/session`: the signed-in user, or `null`.
pub async fn session(CurrentSession(session): CurrentSession) -> Json<serde_json::Value> {
    let user = match session {
        Some(session) => session.user().await,
        None => None,
    };
    Json(serde_json::json!({ "user": user }))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
