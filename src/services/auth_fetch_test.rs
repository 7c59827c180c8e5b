use super::*;
use crate::services::backend::test_helpers::{MockBackend, pair};
use crate::services::session::{Role, SessionUser};
use reqwest::Method;
use serde_json::json;

fn session_with(access: &str, refresh: &str) -> Session {
    Session {
        access_token: access.into(),
        refresh_token: refresh.into(),
        user: SessionUser { id: "42".into(), role: Role::Customer, name: "Sari".into(), email: None },
    }
}

fn fetcher(backend: &Arc<MockBackend>) -> AuthFetcher {
    AuthFetcher::new(backend.clone(), Duration::ZERO)
}

fn bookings_request() -> ApiRequest {
    ApiRequest::get("/bookings/customer/42")
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn attaches_bearer_and_returns_response() {
    let backend = Arc::new(MockBackend::new());
    backend.on(Method::GET, "/bookings/customer/42", 200, json!([]));
    let session = AuthSession::new(session_with("old", "r1"));

    let resp = fetcher(&backend).fetch(&session, &bookings_request()).await.unwrap();

    assert_eq!(resp.status, StatusCode::OK);
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].bearer.as_deref(), Some("old"));
    assert_eq!(backend.refresh_count(), 0);
    assert_eq!(session.outcome().await, SessionOutcome::Unchanged);
}

#[tokio::test]
async fn business_errors_are_returned_not_raised() {
    let backend = Arc::new(MockBackend::new());
    backend.on(Method::GET, "/bookings/customer/42", 500, json!({ "message": "boom" }));
    let session = AuthSession::new(session_with("old", "r1"));

    let resp = fetcher(&backend).fetch(&session, &bookings_request()).await.unwrap();

    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(backend.refresh_count(), 0);
}

#[tokio::test]
async fn transport_failure_propagates_without_sign_out() {
    let backend = Arc::new(MockBackend::new());
    backend.fail(Method::GET, "/bookings/customer/42", "connection reset");
    let session = AuthSession::new(session_with("old", "r1"));

    let err = fetcher(&backend).fetch(&session, &bookings_request()).await.unwrap_err();

    assert!(matches!(err, FetchError::Backend(BackendError::Request(_))));
    assert!(!session.is_signed_out().await);
}

// =============================================================================
// Refresh and retry
// =============================================================================

#[tokio::test]
async fn refreshes_once_and_retries_once_on_401() {
    let backend = Arc::new(MockBackend::new());
    backend.accept_only("old");
    backend.on(Method::GET, "/bookings/customer/42", 200, json!([{ "id": 1 }]));
    backend.on_refresh(Ok(pair("new", "r2")));
    let session = AuthSession::new(session_with("stale", "r1"));

    let resp = fetcher(&backend).fetch(&session, &bookings_request()).await.unwrap();

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(backend.refresh_count(), 1);
    let bearers: Vec<_> = backend
        .calls()
        .into_iter()
        .map(|c| c.bearer)
        .collect();
    assert_eq!(bearers, vec![Some("stale".to_owned()), Some("new".to_owned())]);

    match session.outcome().await {
        SessionOutcome::Rotated(s) => {
            assert_eq!(s.access_token, "new");
            assert_eq!(s.refresh_token, "r2");
        }
        other => panic!("expected rotated session, got {other:?}"),
    }
}

#[tokio::test]
async fn forbidden_also_triggers_refresh() {
    let backend = Arc::new(MockBackend::new());
    backend
        .on(Method::GET, "/bookings/customer/42", 403, json!({}))
        .on(Method::GET, "/bookings/customer/42", 200, json!([]));
    backend.on_refresh(Ok(pair("new", "r2")));
    let session = AuthSession::new(session_with("old", "r1"));

    let resp = fetcher(&backend).fetch(&session, &bookings_request()).await.unwrap();

    assert!(resp.is_success());
    assert_eq!(backend.refresh_count(), 1);
    assert_eq!(backend.calls().len(), 2);
}

#[tokio::test]
async fn failed_refresh_signs_out_with_session_expired() {
    let backend = Arc::new(MockBackend::new());
    backend.on(Method::GET, "/bookings/customer/42", 401, json!({}));
    backend.on_refresh(Err("refresh token revoked"));
    let session = AuthSession::new(session_with("old", "r1"));

    let err = fetcher(&backend).fetch(&session, &bookings_request()).await.unwrap_err();

    assert!(matches!(err, FetchError::SessionExpired));
    assert_eq!(err.to_string(), SESSION_EXPIRED_MESSAGE);
    assert_eq!(backend.refresh_count(), 1);
    assert_eq!(backend.calls().len(), 1, "no retry after a failed refresh");
    assert_eq!(session.outcome().await, SessionOutcome::SignedOut);
}

#[tokio::test]
async fn still_unauthorized_after_retry_signs_out() {
    let backend = Arc::new(MockBackend::new());
    backend.on(Method::GET, "/bookings/customer/42", 401, json!({}));
    backend.on_refresh(Ok(pair("new", "r2")));
    let session = AuthSession::new(session_with("old", "r1"));

    let err = fetcher(&backend).fetch(&session, &bookings_request()).await.unwrap_err();

    assert!(matches!(err, FetchError::SessionExpired));
    assert_eq!(backend.refresh_count(), 1);
    assert_eq!(backend.calls().len(), 2, "exactly one retry");
    assert_eq!(session.outcome().await, SessionOutcome::SignedOut);
}

#[tokio::test]
async fn missing_refresh_token_signs_out_without_refresh() {
    let backend = Arc::new(MockBackend::new());
    backend.on(Method::GET, "/bookings/customer/42", 401, json!({}));
    let session = AuthSession::new(session_with("old", ""));

    let err = fetcher(&backend).fetch(&session, &bookings_request()).await.unwrap_err();

    assert!(matches!(err, FetchError::SessionExpired));
    assert_eq!(backend.refresh_count(), 0);
    assert!(session.is_signed_out().await);
}

#[tokio::test]
async fn anonymous_request_rejected_is_session_expired() {
    let backend = Arc::new(MockBackend::new());
    backend.on(Method::GET, "/bookings", 401, json!({}));
    let session = AuthSession::anonymous();

    let err = fetcher(&backend)
        .fetch(&session, &ApiRequest::get("/bookings"))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::SessionExpired));
    assert_eq!(backend.calls()[0].bearer, None);
}

#[tokio::test]
async fn signed_out_session_sends_no_bearer() {
    let backend = Arc::new(MockBackend::new());
    backend.on(Method::GET, "/bookings/customer/42", 200, json!([]));
    let session = AuthSession::new(session_with("old", "r1"));
    session.sign_out().await;

    fetcher(&backend).fetch(&session, &bookings_request()).await.unwrap();

    assert_eq!(backend.calls()[0].bearer, None);
    assert!(session.snapshot().await.is_none());
}

// =============================================================================
// Single-flight refresh
// =============================================================================

#[tokio::test]
async fn concurrent_401s_share_a_single_refresh() {
    let backend = Arc::new(MockBackend::new());
    backend.accept_only("fresh");
    backend.on(Method::GET, "/bookings/customer/42", 200, json!([]));
    backend.on(Method::GET, "/users/42", 200, json!({ "name": "Sari" }));
    backend.on_refresh(Ok(pair("fresh", "r2")));
    backend.refresh_delay(Duration::from_millis(20));

    let session = AuthSession::new(session_with("old", "r1"));
    let fetcher = fetcher(&backend);
    let profile_request = ApiRequest::get("/users/42");
    let bookings = bookings_request();

    let (a, b) = futures::join!(
        fetcher.fetch(&session, &bookings),
        fetcher.fetch(&session, &profile_request),
    );

    assert!(a.unwrap().is_success());
    assert!(b.unwrap().is_success());
    assert_eq!(backend.refresh_count(), 1);
    let retried_with_fresh = backend
        .calls()
        .iter()
        .filter(|c| c.bearer.as_deref() == Some("fresh"))
        .count();
    assert_eq!(retried_with_fresh, 2);
}

#[tokio::test]
async fn queued_callers_fail_after_refresh_failure() {
    let backend = Arc::new(MockBackend::new());
    backend.on(Method::GET, "/bookings/customer/42", 401, json!({}));
    backend.on_refresh(Err("revoked"));
    backend.refresh_delay(Duration::from_millis(20));

    let session = AuthSession::new(session_with("old", "r1"));
    let fetcher = fetcher(&backend);
    let first = bookings_request();
    let second = bookings_request();

    let (a, b) = futures::join!(
        fetcher.fetch(&session, &first),
        fetcher.fetch(&session, &second),
    );

    assert!(matches!(a, Err(FetchError::SessionExpired)));
    assert!(matches!(b, Err(FetchError::SessionExpired)));
    assert_eq!(backend.refresh_count(), 1);
}

#[tokio::test]
async fn refresh_with_outdated_stale_token_reuses_current() {
    let backend = MockBackend::new();
    let session = AuthSession::new(session_with("current", "r1"));

    let token = session
        .refresh(&backend, Some("older"), Duration::ZERO)
        .await
        .unwrap();

    assert_eq!(token, "current");
    assert_eq!(backend.refresh_count(), 0);
    assert_eq!(session.outcome().await, SessionOutcome::Unchanged);
}
