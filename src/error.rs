//! Structured JSON error bodies shared by every route.
//!
//! DESIGN
//! ======
//! Handlers answer failures with `{"error": <message>}` so browser code can
//! show the message inline. Typed service errors additionally carry a
//! grepable `code` and pick their own HTTP status via [`ErrorCode`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};

/// JSON key for the human-readable message.
pub const ERROR_MESSAGE: &str = "error";

/// JSON key for the grepable error code.
pub const ERROR_CODE: &str = "code";

/// JSON key for the page the browser should move to, when there is one.
pub const ERROR_REDIRECT: &str = "redirect";

/// Grepable error code and HTTP status for structured error bodies.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn status(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }

    fn redirect(&self) -> Option<&'static str> {
        None
    }
}

/// Plain `{"error": message}` response.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let message: String = message.into();
    (status, Json(serde_json::json!({ ERROR_MESSAGE: message }))).into_response()
}

/// `{"error": message, "code": code}` response derived from a typed error,
/// plus `"redirect"` when the error names one.
pub fn error_response_from(err: &(impl ErrorCode + ?Sized)) -> Response {
    let mut body = serde_json::json!({
        ERROR_MESSAGE: err.to_string(),
        ERROR_CODE: err.error_code(),
    });
    if let Some(redirect) = err.redirect() {
        body[ERROR_REDIRECT] = redirect.into();
    }
    (err.status(), Json(body)).into_response()
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
