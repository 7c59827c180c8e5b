//! Booking backend REST client.
//!
//! ARCHITECTURE
//! ============
//! Every outbound call is described by an owned [`ApiRequest`] so the
//! authenticated fetch wrapper can replay it after a token refresh. The
//! [`BackendApi`] trait is the seam between request plumbing and the
//! reqwest transport; tests swap in a scripted mock.
//!
//! ERROR HANDLING
//! ==============
//! Transport failures and non-2xx business answers are kept apart:
//! `send` only fails on transport, callers decide what a 4xx/5xx means.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::BackendTimeouts;
use crate::error::ErrorCode;
use crate::services::session::{Role, Session, SessionUser, TokenPair};

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The HTTP request could not be completed.
    #[error("backend request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// The backend answer could not be decoded.
    #[error("backend response parse failed: {0}")]
    Parse(String),

    /// A request body could not be built.
    #[error("request encode failed: {0}")]
    Encode(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

impl ErrorCode for BackendError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Request(_) => "E_BACKEND_REQUEST",
            Self::Status { .. } => "E_BACKEND_STATUS",
            Self::Parse(_) => "E_BACKEND_PARSE",
            Self::Encode(_) => "E_REQUEST_ENCODE",
            Self::HttpClientBuild(_) => "E_HTTP_CLIENT_BUILD",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Request(_) | Self::Parse(_) => StatusCode::BAD_GATEWAY,
            Self::Encode(_) | Self::HttpClientBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// =============================================================================
// REQUEST
// =============================================================================

/// One file inside a multipart body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Multipart body kept as owned data so it can be rebuilt for a retry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartForm {
    pub texts: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartForm {
    #[must_use]
    pub fn text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.texts.push((field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn file(mut self, part: FilePart) -> Self {
        self.files.push(part);
        self
    }

    fn to_reqwest(&self) -> Result<reqwest::multipart::Form, BackendError> {
        let mut form = reqwest::multipart::Form::new();
        for (field, value) in &self.texts {
            form = form.text(field.clone(), value.clone());
        }
        for file in &self.files {
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)
                .map_err(|e| BackendError::Encode(e.to_string()))?;
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart(MultipartForm),
}

/// Replayable description of a backend call. `path` is relative to the base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: RequestBody::Empty }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = RequestBody::Json(body);
        self
    }

    #[must_use]
    pub fn multipart(mut self, form: MultipartForm) -> Self {
        self.body = RequestBody::Multipart(form);
        self
    }
}

// =============================================================================
// RESPONSE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 401 and 403 both count as an expired or rejected access token.
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Parse`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        serde_json::from_slice(&self.body).map_err(|e| BackendError::Parse(e.to_string()))
    }

    /// The backend's `message` field, when the body is a JSON object carrying one.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        let value: Value = serde_json::from_slice(&self.body).ok()?;
        value
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.trim().is_empty())
            .map(str::to_owned)
    }

    /// Pass success through; turn anything else into [`BackendError::Status`]
    /// with the backend's message or `fallback`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Status`] for a non-2xx response.
    pub fn checked(self, fallback: &str) -> Result<Self, BackendError> {
        if self.is_success() {
            return Ok(self);
        }
        Err(BackendError::Status {
            status: self.status.as_u16(),
            message: self.message().unwrap_or_else(|| fallback.to_owned()),
        })
    }
}

// =============================================================================
// SEAM
// =============================================================================

/// Transport to the booking backend.
#[async_trait]
pub trait BackendApi: Send + Sync {
    /// Issue `request`, attaching `bearer` as the `Authorization` header when present.
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, BackendError>;

    /// Exchange a refresh token for a new pair via `POST /auth/refresh`.
    async fn refresh_tokens(&self, user_id: &str, refresh_token: &str) -> Result<TokenPair, BackendError>;
}

/// Build the `POST /auth/refresh` request. Numeric ids go out as JSON numbers.
#[must_use]
pub fn refresh_request(user_id: &str, refresh_token: &str) -> ApiRequest {
    let user_id = user_id
        .parse::<i64>()
        .map_or_else(|_| Value::String(user_id.to_owned()), Value::from);
    ApiRequest::post("/auth/refresh").json(serde_json::json!({
        "userId": user_id,
        "refreshToken": refresh_token,
    }))
}

// =============================================================================
// REQWEST CLIENT
// =============================================================================

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    /// Build a client for `base_url` (no trailing slash).
    ///
    /// # Errors
    ///
    /// Returns an error if the reqwest client cannot be built.
    pub fn new(base_url: impl Into<String>, timeouts: BackendTimeouts) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| BackendError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.into() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl BackendApi for BackendClient {
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, BackendError> {
        let mut builder = self
            .http
            .request(request.method.clone(), self.url(&request.path));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Multipart(form) => builder.multipart(form.to_reqwest()?),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Request(e.to_string()))?
            .to_vec();

        tracing::debug!(method = %request.method, path = %request.path, status = status.as_u16(), "backend call");
        Ok(ApiResponse { status, body })
    }

    async fn refresh_tokens(&self, user_id: &str, refresh_token: &str) -> Result<TokenPair, BackendError> {
        let response = self
            .send(&refresh_request(user_id, refresh_token), None)
            .await?;
        if !response.is_success() {
            return Err(BackendError::Status {
                status: response.status.as_u16(),
                message: "Failed to refresh token".into(),
            });
        }
        response.json::<TokenPair>()
    }
}

// =============================================================================
// UNAUTHENTICATED CALLS
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    user: Option<LoginUser>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginUser {
    id: Value,
    email: Option<String>,
    role: Option<String>,
    name: Option<String>,
}

/// Field deserializer that reads JSON `null` like a missing key. The backend
/// leaves optional text columns `null` rather than omitting them.
///
/// # Errors
///
/// Returns the inner deserializer's error for a value of the wrong type.
pub(crate) fn null_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Render a backend id (number or string) as a string.
pub(crate) fn id_to_string(id: &Value) -> Option<String> {
    match id {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// `POST /auth/login`. Returns `None` for rejected credentials or an answer
/// missing the user or either token.
///
/// # Errors
///
/// Returns an error only when the backend cannot be reached.
pub async fn login(backend: &dyn BackendApi, email: &str, password: &str) -> Result<Option<Session>, BackendError> {
    let request = ApiRequest::post("/auth/login").json(serde_json::json!({
        "email": email,
        "password": password,
    }));
    let response = backend.send(&request, None).await?;
    if !response.is_success() {
        return Ok(None);
    }
    let Ok(body) = response.json::<LoginResponse>() else {
        return Ok(None);
    };
    let (Some(user), Some(access_token), Some(refresh_token)) = (body.user, body.access_token, body.refresh_token)
    else {
        return Ok(None);
    };
    let Some(id) = id_to_string(&user.id) else {
        return Ok(None);
    };

    let name = user
        .name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .or_else(|| user.email.clone())
        .unwrap_or_else(|| "User".into());

    Ok(Some(Session {
        access_token,
        refresh_token,
        user: SessionUser { id, role: Role::from_backend(user.role.as_deref()), name, email: user.email },
    }))
}

/// `POST /auth/register`.
///
/// # Errors
///
/// Returns the backend's message (or a generic fallback) on rejection.
pub async fn register(backend: &dyn BackendApi, email: &str, password: &str) -> Result<(), BackendError> {
    let request = ApiRequest::post("/auth/register").json(serde_json::json!({
        "email": email,
        "password": password,
    }));
    backend
        .send(&request, None)
        .await?
        .checked("Registration failed.")?;
    Ok(())
}

/// `GET /auth/confirm?token=`.
///
/// # Errors
///
/// Returns the backend's message (or a generic fallback) on rejection.
pub async fn confirm_account(backend: &dyn BackendApi, token: &str) -> Result<(), BackendError> {
    let request = ApiRequest::get("/auth/confirm").query("token", token);
    backend
        .send(&request, None)
        .await?
        .checked("Confirmation failed.")?;
    Ok(())
}

#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// One scripted answer. The last answer queued for a route repeats.
    #[derive(Debug, Clone)]
    pub enum MockReply {
        Respond(ApiResponse),
        Fail(String),
    }

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub method: Method,
        pub path: String,
        pub query: Vec<(String, String)>,
        pub bearer: Option<String>,
        pub body: RequestBody,
    }

    /// Scripted in-memory backend.
    #[derive(Default)]
    pub struct MockBackend {
        routes: Mutex<HashMap<(Method, String), VecDeque<MockReply>>>,
        /// When set, any other bearer gets a 401.
        accepted_token: Mutex<Option<String>>,
        refresh_replies: Mutex<VecDeque<Result<TokenPair, String>>>,
        refresh_delay: Mutex<Duration>,
        calls: Mutex<Vec<RecordedCall>>,
        refresh_calls: AtomicUsize,
    }

    pub fn json_response(status: u16, body: &Value) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).expect("valid status"),
            body: serde_json::to_vec(body).expect("json body"),
        }
    }

    pub fn pair(access: &str, refresh: &str) -> TokenPair {
        TokenPair { access_token: access.into(), refresh_token: refresh.into() }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn on(&self, method: Method, path: &str, status: u16, body: Value) -> &Self {
            self.routes
                .lock()
                .expect("routes lock")
                .entry((method, path.to_owned()))
                .or_default()
                .push_back(MockReply::Respond(json_response(status, &body)));
            self
        }

        pub fn fail(&self, method: Method, path: &str, message: &str) -> &Self {
            self.routes
                .lock()
                .expect("routes lock")
                .entry((method, path.to_owned()))
                .or_default()
                .push_back(MockReply::Fail(message.to_owned()));
            self
        }

        pub fn accept_only(&self, token: &str) -> &Self {
            *self.accepted_token.lock().expect("token lock") = Some(token.to_owned());
            self
        }

        pub fn on_refresh(&self, result: Result<TokenPair, &str>) -> &Self {
            self.refresh_replies
                .lock()
                .expect("refresh lock")
                .push_back(result.map_err(str::to_owned));
            self
        }

        pub fn refresh_delay(&self, delay: Duration) -> &Self {
            *self.refresh_delay.lock().expect("delay lock") = delay;
            self
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().expect("calls lock").clone()
        }

        pub fn calls_to(&self, method: &Method, path: &str) -> Vec<RecordedCall> {
            self.calls()
                .into_iter()
                .filter(|c| &c.method == method && c.path == path)
                .collect()
        }

        pub fn refresh_count(&self) -> usize {
            self.refresh_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BackendApi for MockBackend {
        async fn send(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse, BackendError> {
            self.calls.lock().expect("calls lock").push(RecordedCall {
                method: request.method.clone(),
                path: request.path.clone(),
                query: request.query.clone(),
                bearer: bearer.map(str::to_owned),
                body: request.body.clone(),
            });

            let accepted = self.accepted_token.lock().expect("token lock").clone();
            if let Some(accepted) = accepted {
                if bearer != Some(accepted.as_str()) {
                    return Ok(json_response(401, &serde_json::json!({ "message": "Unauthorized" })));
                }
            }

            let reply = {
                let mut routes = self.routes.lock().expect("routes lock");
                let key = (request.method.clone(), request.path.clone());
                match routes.get_mut(&key) {
                    Some(queue) if queue.len() > 1 => queue.pop_front(),
                    Some(queue) => queue.front().cloned(),
                    None => None,
                }
            };
            match reply {
                Some(MockReply::Respond(response)) => Ok(response),
                Some(MockReply::Fail(message)) => Err(BackendError::Request(message)),
                None => Ok(json_response(404, &serde_json::json!({ "message": "Not Found" }))),
            }
        }

        async fn refresh_tokens(&self, _user_id: &str, _refresh_token: &str) -> Result<TokenPair, BackendError> {
            self.refresh_calls.fetch_add(1, Ordering::SeqCst);
            let delay = *self.refresh_delay.lock().expect("delay lock");
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let reply = self.refresh_replies.lock().expect("refresh lock").pop_front();
            match reply {
                Some(Ok(tokens)) => {
                    if let Some(accepted) = self.accepted_token.lock().expect("token lock").as_mut() {
                        accepted.clone_from(&tokens.access_token);
                    }
                    Ok(tokens)
                }
                Some(Err(message)) => Err(BackendError::Status { status: 401, message }),
                None => Err(BackendError::Status { status: 401, message: "Failed to refresh token".into() }),
            }
        }
    }
}
