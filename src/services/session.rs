//! Session model and the signed session-cookie codec.
//!
//! ARCHITECTURE
//! ============
//! The browser holds a single HttpOnly cookie carrying an HS256-signed JWT.
//! The JWT embeds the backend token pair plus the user's id, role, name and
//! email, so the route guard can authorize without a backend round trip.
//!
//! TRADE-OFFS
//! ==========
//! Backend tokens ride inside the cookie rather than a server-side store.
//! That keeps the service stateless across requests at the cost of a larger
//! cookie and re-issuing it whenever the pair rotates.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

// =============================================================================
// MODEL
// =============================================================================

/// Authorization role carried in the session. Only `Admin` is privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    /// Map the backend's free-form role string. Anything but `admin` is a customer.
    #[must_use]
    pub fn from_backend(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(r) if r.eq_ignore_ascii_case("admin") => Self::Admin,
            _ => Self::Customer,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Customer => "customer",
        }
    }

    #[must_use]
    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    pub role: Role,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Access/refresh pair issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: SessionUser,
}

impl Session {
    /// A refresh is only attempted when both a refresh token and a user id are present.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        !self.refresh_token.is_empty() && !self.user.id.is_empty()
    }

    /// Replace the token pair in place.
    pub fn rotate(&mut self, tokens: TokenPair) {
        self.access_token = tokens.access_token;
        self.refresh_token = tokens.refresh_token;
    }
}

// =============================================================================
// COOKIE CODEC
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session encode failed: {0}")]
    Encode(String),
    #[error("invalid session token: {0}")]
    Invalid(String),
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionClaims {
    sub: String,
    role: Role,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    access_token: String,
    refresh_token: String,
    iat: i64,
    exp: i64,
}

/// Signs and verifies session cookies with the shared secret.
#[derive(Clone)]
pub struct SessionCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    max_age_secs: i64,
}

impl SessionCodec {
    #[must_use]
    pub fn new(secret: &str, max_age_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            max_age_secs,
        }
    }

    /// Sign a session valid for `max_age_secs` from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be signed.
    pub fn encode(&self, session: &Session) -> Result<String, SessionError> {
        self.encode_at(session, OffsetDateTime::now_utc().unix_timestamp())
    }

    pub(crate) fn encode_at(&self, session: &Session, issued_at: i64) -> Result<String, SessionError> {
        let claims = SessionClaims {
            sub: session.user.id.clone(),
            role: session.user.role,
            name: session.user.name.clone(),
            email: session.user.email.clone(),
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            iat: issued_at,
            exp: issued_at + self.max_age_secs,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| SessionError::Encode(e.to_string()))
    }

    /// Verify signature and expiry, returning the embedded session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Invalid`] for a bad signature, malformed token,
    /// or expired session.
    pub fn decode(&self, token: &str) -> Result<Session, SessionError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| SessionError::Invalid(e.to_string()))?;
        let claims = data.claims;
        Ok(Session {
            access_token: claims.access_token,
            refresh_token: claims.refresh_token,
            user: SessionUser { id: claims.sub, role: claims.role, name: claims.name, email: claims.email },
        })
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
