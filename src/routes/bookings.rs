//! Customer booking routes and available dates.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};

use super::auth::{AdminUser, SignedIn};
use crate::error::{error_response, error_response_from};
use crate::services::booking::{self, BookingEdit, BookingForm, BookingView, CustomerBookings};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingsQuery {
    user_id: Option<String>,
}

#[derive(Serialize)]
pub struct CustomerBookingsResponse {
    pub ongoing: Vec<BookingView>,
    pub history: Vec<BookingView>,
}

/// `GET /api/bookings?userId=`: the customer's bookings split into ongoing and history.
///
/// Customers may only read their own bookings; admins may read anyone's.
pub async fn customer_bookings(
    State(state): State<AppState>,
    auth: SignedIn,
    Query(query): Query<BookingsQuery>,
) -> Response {
    let Some(user_id) = query.user_id.filter(|id| !id.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing or invalid userId");
    };
    if user_id != auth.user.id && !auth.user.role.is_admin() {
        tracing::warn!(user_id = %auth.user.id, requested = %user_id, "cross-user bookings read refused");
        return error_response(StatusCode::FORBIDDEN, "Forbidden");
    }

    match CustomerBookings::load(&state.fetcher, &auth.session, &user_id).await {
        Ok(bookings) => Json(CustomerBookingsResponse {
            ongoing: bookings.ongoing().cloned().map(BookingView::from).collect(),
            history: bookings.history().cloned().map(BookingView::from).collect(),
        })
        .into_response(),
        Err(e) => error_response_from(&e),
    }
}

/// `POST /api/bookings`: submit a booking form.
pub async fn create_booking(State(state): State<AppState>, auth: SignedIn, Json(form): Json<BookingForm>) -> Response {
    match booking::create_booking(&state.fetcher, &auth.session, form).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => error_response_from(&e),
    }
}

/// `PATCH /api/bookings/{id}`: customer edit of date, time or WhatsApp number.
pub async fn update_booking(
    State(state): State<AppState>,
    auth: SignedIn,
    Path(id): Path<i64>,
    Json(edit): Json<BookingEdit>,
) -> Response {
    let mut bookings = match CustomerBookings::load(&state.fetcher, &auth.session, &auth.user.id).await {
        Ok(bookings) => bookings,
        Err(e) => return error_response_from(&e),
    };
    match bookings.update(id, edit).await {
        Ok(updated) => Json(BookingView::from(updated.clone())).into_response(),
        Err(e) => error_response_from(&e),
    }
}

// =============================================================================
// AVAILABLE DATES
// =============================================================================

/// `GET /api/available-dates` → `["YYYY-MM-DD", ...]`.
pub async fn list_available_dates(State(state): State<AppState>, auth: SignedIn) -> Response {
    match booking::list_available_dates(&state.fetcher, &auth.session).await {
        Ok(dates) => Json(dates).into_response(),
        Err(e) => error_response_from(&e),
    }
}

#[derive(Deserialize)]
pub struct AddDateBody {
    #[serde(default)]
    date: String,
}

/// `POST /api/available-dates` (admin).
pub async fn add_available_date(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    Json(body): Json<AddDateBody>,
) -> Response {
    match booking::add_available_date(&state.fetcher, &auth.session, &body.date).await {
        Ok(date) => (StatusCode::CREATED, Json(serde_json::json!({ "date": date }))).into_response(),
        Err(e) => error_response_from(&e),
    }
}

#[cfg(test)]
#[path = "bookings_test.rs"]
mod tests;
