//! Account flows: registration checks, post-login landing page, profile context.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorCode;
use crate::services::auth_fetch::{AuthFetcher, AuthSession, FetchError};
use crate::services::backend::{self, ApiRequest, BackendApi, BackendError};
use crate::services::session::Role;

pub const ADMIN_HOME: &str = "/dashboard-admin";

/// Fields the backend `User` model accepts on `PATCH /users/:id`.
pub const PROFILE_FIELDS: [&str; 5] = ["email", "password", "role", "name", "profilePic"];

const MIN_PASSWORD_LEN: usize = 8;

// =============================================================================
// REGISTRATION
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("Please fill in all fields.")]
    MissingFields,
    #[error("Passwords do not match.")]
    PasswordMismatch,
    #[error("Password must be at least 8 characters long.")]
    PasswordTooShort,
    #[error("Please enter a valid email address.")]
    InvalidEmail,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ErrorCode for RegistrationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFields => "E_MISSING_FIELDS",
            Self::PasswordMismatch => "E_PASSWORD_MISMATCH",
            Self::PasswordTooShort => "E_PASSWORD_TOO_SHORT",
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::Backend(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Backend(e) => e.status(),
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(alias = "confirm")]
    pub confirm_password: String,
}

impl Registration {
    /// Check the form in the order a user would fix it.
    ///
    /// # Errors
    ///
    /// Returns the first failing rule.
    pub fn validate(&self) -> Result<(), RegistrationError> {
        if self.email.is_empty() || self.password.is_empty() || self.confirm_password.is_empty() {
            return Err(RegistrationError::MissingFields);
        }
        if self.password != self.confirm_password {
            return Err(RegistrationError::PasswordMismatch);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(RegistrationError::PasswordTooShort);
        }
        if !looks_like_email(&self.email) {
            return Err(RegistrationError::InvalidEmail);
        }
        Ok(())
    }
}

/// `local@domain.tld` with no whitespace in any part: some non-space, `@`,
/// some non-space, `.`, some non-space.
pub(crate) fn looks_like_email(raw: &str) -> bool {
    raw.split_whitespace().any(|word| {
        word.char_indices().any(|(at, c)| {
            if c != '@' || at == 0 {
                return false;
            }
            let domain = &word[at + 1..];
            domain
                .char_indices()
                .any(|(dot, c)| c == '.' && dot > 0 && dot + 1 < domain.len())
        })
    })
}

/// Validate, then `POST /auth/register`.
///
/// # Errors
///
/// Returns a validation error before sending, or the backend's message.
pub async fn register(backend: &dyn BackendApi, form: &Registration) -> Result<(), RegistrationError> {
    form.validate()?;
    backend::register(backend, form.email.trim(), &form.password).await?;
    tracing::info!("registration accepted, confirmation pending");
    Ok(())
}

// =============================================================================
// LOGIN REDIRECT
// =============================================================================

/// Where to send a user right after sign-in.
///
/// Admins always land on the admin dashboard. Everyone else returns to the
/// page they were bounced from, provided it is a local path other than the
/// admin dashboard.
#[must_use]
pub fn post_login_redirect(role: Role, requested: Option<&str>) -> String {
    if role.is_admin() {
        return ADMIN_HOME.to_owned();
    }
    match requested.map(str::trim) {
        Some(path) if is_local_path(path) && path != ADMIN_HOME => path.to_owned(),
        _ => "/".to_owned(),
    }
}

fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') && !path.contains("://")
}

// =============================================================================
// PROFILE
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, deserialize_with = "backend::null_or_default")]
    pub name: String,
    #[serde(default, deserialize_with = "backend::null_or_default")]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("No user ID in session")]
    NoUser,
    #[error("Nothing to update.")]
    EmptyUpdate,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ErrorCode for ProfileError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoUser => "E_NO_USER",
            Self::EmptyUpdate => "E_EMPTY_UPDATE",
            Self::Fetch(e) => e.error_code(),
            Self::Backend(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NoUser => StatusCode::UNAUTHORIZED,
            Self::EmptyUpdate => StatusCode::BAD_REQUEST,
            Self::Fetch(e) => e.status(),
            Self::Backend(e) => e.status(),
        }
    }

    fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::Fetch(e) => e.redirect(),
            _ => None,
        }
    }
}

/// Keep only profile fields the backend accepts. `role` is dropped unless
/// the caller is an admin.
#[must_use]
pub fn filter_profile_update(update: Map<String, Value>, caller: Role) -> Map<String, Value> {
    update
        .into_iter()
        .filter(|(key, _)| PROFILE_FIELDS.contains(&key.as_str()))
        .filter(|(key, _)| key != "role" || caller.is_admin())
        .collect()
}

/// The signed-in user's profile, loaded on demand and reloaded explicitly.
pub struct ProfileContext<'a> {
    fetcher: &'a AuthFetcher,
    session: &'a AuthSession,
    profile: Option<UserProfile>,
}

impl<'a> ProfileContext<'a> {
    #[must_use]
    pub fn new(fetcher: &'a AuthFetcher, session: &'a AuthSession) -> Self {
        Self { fetcher, session, profile: None }
    }

    #[cfg(test)]
    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    async fn user_path(&self) -> Result<(String, Role), ProfileError> {
        let user = self.session.user().await.ok_or(ProfileError::NoUser)?;
        if user.id.is_empty() {
            return Err(ProfileError::NoUser);
        }
        Ok((format!("/users/{}", user.id), user.role))
    }

    /// Reload from `GET /users/:id`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no session user or the backend refuses.
    pub async fn refresh(&mut self) -> Result<&UserProfile, ProfileError> {
        let (path, _) = self.user_path().await?;
        let response = self
            .fetcher
            .fetch(self.session, &ApiRequest::get(path))
            .await?
            .checked("Failed to fetch user profile")?;
        let profile: UserProfile = response.json()?;
        Ok(self.profile.insert(profile))
    }

    /// `PATCH /users/:id` with the allow-listed fields, then reload.
    ///
    /// # Errors
    ///
    /// [`ProfileError::EmptyUpdate`] when nothing survives the allow-list,
    /// otherwise the fetch or backend error.
    pub async fn update(&mut self, update: Map<String, Value>) -> Result<&UserProfile, ProfileError> {
        let (path, role) = self.user_path().await?;
        let body = filter_profile_update(update, role);
        if body.is_empty() {
            return Err(ProfileError::EmptyUpdate);
        }
        let fields: Vec<&str> = body.keys().map(String::as_str).collect();
        tracing::info!(?fields, "updating profile");

        self.fetcher
            .fetch(self.session, &ApiRequest::patch(path).json(Value::Object(body)))
            .await?
            .checked("Failed to update profile")?;
        self.refresh().await
    }
}

#[cfg(test)]
#[path = "account_test.rs"]
mod tests;
