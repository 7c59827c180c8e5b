//! Signed-in user's profile.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Map, Value};

use super::auth::SignedIn;
use crate::error::error_response_from;
use crate::services::account::ProfileContext;
use crate::state::AppState;

/// `GET /api/profile`.
pub async fn get_profile(State(state): State<AppState>, auth: SignedIn) -> Response {
    let mut context = ProfileContext::new(&state.fetcher, &auth.session);
    match context.refresh().await {
        Ok(profile) => Json(profile.clone()).into_response(),
        Err(e) => error_response_from(&e),
    }
}

/// `PATCH /api/profile`: allow-listed fields only; answers with the reloaded profile.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: SignedIn,
    Json(update): Json<Map<String, Value>>,
) -> Response {
    let mut context = ProfileContext::new(&state.fetcher, &auth.session);
    match context.update(update).await {
        Ok(profile) => Json(profile.clone()).into_response(),
        Err(e) => error_response_from(&e),
    }
}
