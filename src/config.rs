//! Service configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_PUBLIC_DIR: &str = "public";
pub const DEFAULT_UPLOADS_DIR: &str = "public/uploads";
pub const DEFAULT_SESSION_MAX_AGE_SECS: i64 = 60 * 60 * 24 * 7;
pub const DEFAULT_REFRESH_SETTLE_MS: u64 = 100;
pub const DEFAULT_BACKEND_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    Missing { var: &'static str },
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Base URL of the booking backend, without a trailing slash.
    pub api_url: String,
    /// Shared secret used to sign and verify the session cookie.
    pub session_secret: String,
    pub port: u16,
    pub public_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub cookie_secure: bool,
    pub session_max_age_secs: i64,
    /// Pause between persisting refreshed tokens and retrying the request.
    pub refresh_settle: Duration,
    pub backend_timeouts: BackendTimeouts,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `NEXTAUTH_SECRET`
    ///
    /// Optional:
    /// - `NEXT_PUBLIC_API_URL`: default `http://localhost:3000`
    /// - `PORT`: default 3001
    /// - `PUBLIC_DIR`: default `public`
    /// - `UPLOADS_DIR`: default `public/uploads`
    /// - `COOKIE_SECURE`: default false
    /// - `SESSION_MAX_AGE_SECS`: default 7 days
    /// - `REFRESH_SETTLE_MS`: default 100
    /// - `BACKEND_REQUEST_TIMEOUT_SECS`: default 30
    /// - `BACKEND_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is missing or a value fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let session_secret = std::env::var("NEXTAUTH_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing { var: "NEXTAUTH_SECRET" })?;

        let api_url = std::env::var("NEXT_PUBLIC_API_URL")
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let cookie_secure = match std::env::var("COOKIE_SECURE") {
            Ok(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { var: "COOKIE_SECURE", value: raw })?,
            Err(_) => false,
        };

        Ok(Self {
            api_url,
            session_secret,
            port: env_parse("PORT", DEFAULT_PORT)?,
            public_dir: env_path("PUBLIC_DIR", DEFAULT_PUBLIC_DIR),
            uploads_dir: env_path("UPLOADS_DIR", DEFAULT_UPLOADS_DIR),
            cookie_secure,
            session_max_age_secs: env_parse("SESSION_MAX_AGE_SECS", DEFAULT_SESSION_MAX_AGE_SECS)?,
            refresh_settle: Duration::from_millis(env_parse("REFRESH_SETTLE_MS", DEFAULT_REFRESH_SETTLE_MS)?),
            backend_timeouts: BackendTimeouts {
                request_secs: env_parse("BACKEND_REQUEST_TIMEOUT_SECS", DEFAULT_BACKEND_REQUEST_TIMEOUT_SECS)?,
                connect_secs: env_parse("BACKEND_CONNECT_TIMEOUT_SECS", DEFAULT_BACKEND_CONNECT_TIMEOUT_SECS)?,
            },
        })
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_parse<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    std::env::var(var)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
