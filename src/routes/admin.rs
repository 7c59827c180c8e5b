//! Admin dashboard routes: booking lifecycle and order design images.

use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use super::auth::AdminUser;
use super::{read_multipart, take_file};
use crate::error::error_response_from;
use crate::services::booking::{AdminBookings, Booking, BookingError, BookingView, OrderDetails, Reschedule};
use crate::services::gallery::{self, GalleryError};
use crate::state::AppState;

fn booking_response(result: Result<&Booking, BookingError>) -> Response {
    match result {
        Ok(booking) => Json(BookingView::from(booking.clone())).into_response(),
        Err(e) => error_response_from(&e),
    }
}

/// `GET /api/admin/bookings`.
pub async fn list_bookings(State(state): State<AppState>, AdminUser(auth): AdminUser) -> Response {
    match AdminBookings::load(&state.fetcher, &auth.session).await {
        Ok(bookings) => {
            let views: Vec<BookingView> = bookings.bookings().iter().cloned().map(BookingView::from).collect();
            Json(views).into_response()
        }
        Err(e) => error_response_from(&e),
    }
}

/// `POST /api/admin/bookings/{id}/confirm`: pending → confirmed.
pub async fn confirm_booking(State(state): State<AppState>, AdminUser(auth): AdminUser, Path(id): Path<i64>) -> Response {
    let mut bookings = match AdminBookings::load(&state.fetcher, &auth.session).await {
        Ok(bookings) => bookings,
        Err(e) => return error_response_from(&e),
    };
    booking_response(bookings.confirm(id).await)
}

/// `PATCH /api/admin/bookings/{id}/schedule`.
pub async fn reschedule_booking(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    Path(id): Path<i64>,
    Json(change): Json<Reschedule>,
) -> Response {
    let mut bookings = match AdminBookings::load(&state.fetcher, &auth.session).await {
        Ok(bookings) => bookings,
        Err(e) => return error_response_from(&e),
    };
    booking_response(bookings.reschedule(id, change).await)
}

/// `PATCH /api/admin/bookings/{id}/order-details`: confirmed → processing order.
pub async fn submit_order_details(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    Path(id): Path<i64>,
    Json(details): Json<OrderDetails>,
) -> Response {
    let mut bookings = match AdminBookings::load(&state.fetcher, &auth.session).await {
        Ok(bookings) => bookings,
        Err(e) => return error_response_from(&e),
    };
    booking_response(bookings.submit_order_details(id, details).await)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingCodeBody {
    #[serde(default)]
    tracking_code: String,
}

/// `PATCH /api/admin/bookings/{id}/tracking-code`: processing order → delivering.
pub async fn send_tracking_code(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    Path(id): Path<i64>,
    Json(body): Json<TrackingCodeBody>,
) -> Response {
    let mut bookings = match AdminBookings::load(&state.fetcher, &auth.session).await {
        Ok(bookings) => bookings,
        Err(e) => return error_response_from(&e),
    };
    booking_response(bookings.send_tracking_code(id, &body.tracking_code).await)
}

/// `POST /api/admin/uploads/design-image` (multipart field `image`) → `{ "url": ... }`.
pub async fn upload_order_image(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    multipart: Multipart,
) -> Response {
    let mut form = match read_multipart(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let Some(file) = take_file(&mut form, "image") else {
        return error_response_from(&GalleryError::MissingFile);
    };
    match gallery::upload_order_image(&state.fetcher, &auth.session, file).await {
        Ok(url) => Json(serde_json::json!({ "url": url })).into_response(),
        Err(e) => error_response_from(&e),
    }
}

#[cfg(test)]
#[path = "admin_test.rs"]
mod tests;
