//! Booking service: status machine, payload builders, dashboard view models.
//!
//! DESIGN
//! ======
//! Booking rows live in the backend. This module owns the rules the
//! backend does not enforce: the forward-only status machine, which fields
//! a booking form or order-details payload may carry, and when a customer
//! may still edit a booking. Every rule is checked before a request is sent.
//!
//! The view models load the current rows first, apply the rule against the
//! loaded status, then patch the backend and update the loaded entry in
//! place so the caller can answer without a reload.

use std::fmt;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::macros::format_description;

use crate::error::ErrorCode;
use crate::services::auth_fetch::{AuthFetcher, AuthSession, FetchError};
use crate::services::backend::{self, ApiRequest, BackendError};

// =============================================================================
// STATUS
// =============================================================================

/// Lifecycle of a booking. Only the three forward steps are legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BookingStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "confirmed")]
    Confirmed,
    #[serde(rename = "processing order")]
    ProcessingOrder,
    #[serde(rename = "delivering")]
    Delivering,
}

impl BookingStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::ProcessingOrder => "processing order",
            Self::Delivering => "delivering",
        }
    }

    /// The single legal successor, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::ProcessingOrder),
            Self::ProcessingOrder => Some(Self::Delivering),
            Self::Delivering => None,
        }
    }

    #[must_use]
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target)
    }

    /// Check `self -> target` against the transition table.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidTransition`] for anything but the next step.
    pub fn transition(self, target: Self) -> Result<Self, BookingError> {
        if self.can_transition_to(target) {
            Ok(target)
        } else {
            Err(BookingError::InvalidTransition { from: self, to: target })
        }
    }

    /// Customers may change date, time and WhatsApp only before production starts.
    #[must_use]
    pub fn is_customer_editable(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    /// Delivering bookings move from the ongoing list to history.
    #[must_use]
    pub fn is_history(self) -> bool {
        self == Self::Delivering
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Pending => "Our tailor is checking your booking details. Please wait for confirmation.",
            Self::Confirmed => "Your booking is confirmed. Our tailor will contact you via WhatsApp.",
            Self::ProcessingOrder => {
                "Video call session done, our team is processing your order. \
                 Please check the order status to get information about the progress."
            }
            Self::Delivering => "Your order is on its way.",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("{0}")]
    Validation(String),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    #[error("booking can no longer be changed once it is {0}")]
    NotEditable(BookingStatus),

    #[error("booking not found: {0}")]
    NotFound(i64),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ErrorCode for BookingError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_BOOKING_INVALID",
            Self::InvalidTransition { .. } => "E_BOOKING_TRANSITION",
            Self::NotEditable(_) => "E_BOOKING_LOCKED",
            Self::NotFound(_) => "E_BOOKING_NOT_FOUND",
            Self::Fetch(e) => e.error_code(),
            Self::Backend(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidTransition { .. } | Self::NotEditable(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
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

// =============================================================================
// BOOKING
// =============================================================================

/// A booking row as the backend returns it. Unknown fields pass through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: i64,
    pub status: BookingStatus,
    pub date: String,
    pub time: String,
    #[serde(default, deserialize_with = "backend::null_or_default")]
    pub whatsapp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurement_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_details: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Booking plus the customer-facing status text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub status_description: &'static str,
    pub editable: bool,
}

impl From<Booking> for BookingView {
    fn from(booking: Booking) -> Self {
        Self {
            status_description: booking.status.description(),
            editable: booking.status.is_customer_editable(),
            booking,
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    #[default]
    Online,
    Store,
}

impl ServiceType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Store => "store",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementType {
    #[default]
    Manual,
    Size,
}

impl MeasurementType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Size => "size",
        }
    }
}

const FORM_MANUAL_FIELDS: [&str; 6] = ["bust", "waist", "hip", "shoulder", "sleeve", "kebayaLength"];
const ORDER_MANUAL_FIELDS: [&str; 6] = ["bust", "waist", "hips", "shoulder", "sleeve", "length"];

/// Customer appointment request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BookingForm {
    pub name: String,
    pub email: String,
    pub whatsapp: String,
    pub date: String,
    pub time: String,
    pub service_type: ServiceType,
    pub measurement_type: MeasurementType,
    pub size: String,
    pub bust: String,
    pub waist: String,
    pub hip: String,
    pub shoulder: String,
    pub sleeve: String,
    pub kebaya_length: String,
    pub notes: String,
}

impl BookingForm {
    fn manual_values(&self) -> [&str; 6] {
        [&self.bust, &self.waist, &self.hip, &self.shoulder, &self.sleeve, &self.kebaya_length]
    }

    /// Validate and build the `POST /bookings` body.
    ///
    /// Size mode drops the manual measurements, manual mode drops `size`,
    /// and blank optional values are left out.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] for a missing required field or a
    /// malformed date or time.
    pub fn into_payload(self) -> Result<Value, BookingError> {
        for (field, value) in [
            ("name", &self.name),
            ("email", &self.email),
            ("whatsapp", &self.whatsapp),
            ("date", &self.date),
            ("time", &self.time),
        ] {
            require(field, value)?;
        }
        validate_date(&self.date)?;
        validate_time(&self.time)?;

        let mut body = Map::new();
        body.insert("name".into(), self.name.trim().into());
        body.insert("email".into(), self.email.trim().into());
        body.insert("whatsapp".into(), self.whatsapp.trim().into());
        body.insert("date".into(), self.date.trim().into());
        body.insert("time".into(), self.time.trim().into());
        body.insert("serviceType".into(), self.service_type.as_str().into());
        body.insert("measurementType".into(), self.measurement_type.as_str().into());

        match self.measurement_type {
            MeasurementType::Size => {
                require("size", &self.size)?;
                insert_non_empty(&mut body, "size", &self.size);
            }
            MeasurementType::Manual => {
                for (field, value) in FORM_MANUAL_FIELDS.iter().zip(self.manual_values()) {
                    insert_non_empty(&mut body, field, value);
                }
            }
        }
        insert_non_empty(&mut body, "notes", &self.notes);

        Ok(Value::Object(body))
    }
}

/// Order details an admin records after the video call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderDetails {
    pub name: String,
    pub whatsapp: String,
    pub design: String,
    pub notes: String,
    pub measurement_type: MeasurementType,
    pub image_url: String,
    pub bust: String,
    pub waist: String,
    pub hips: String,
    pub shoulder: String,
    pub sleeve: String,
    pub length: String,
    pub size: String,
}

impl OrderDetails {
    /// Build the `orderDetails` object with empty values removed.
    #[must_use]
    pub fn into_payload(self) -> Value {
        let mut body = Map::new();
        insert_non_empty(&mut body, "name", &self.name);
        insert_non_empty(&mut body, "whatsapp", &self.whatsapp);
        insert_non_empty(&mut body, "design", &self.design);
        insert_non_empty(&mut body, "notes", &self.notes);
        body.insert("measurementType".into(), self.measurement_type.as_str().into());
        insert_non_empty(&mut body, "imageUrl", &self.image_url);

        match self.measurement_type {
            MeasurementType::Manual => {
                let values = [&self.bust, &self.waist, &self.hips, &self.shoulder, &self.sleeve, &self.length];
                for (field, value) in ORDER_MANUAL_FIELDS.iter().zip(values) {
                    insert_non_empty(&mut body, field, value);
                }
            }
            MeasurementType::Size => insert_non_empty(&mut body, "size", &self.size),
        }
        Value::Object(body)
    }
}

/// New date and time for an existing booking.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Reschedule {
    pub date: String,
    pub time: String,
}

impl Reschedule {
    fn into_payload(self) -> Result<Value, BookingError> {
        require("date", &self.date)?;
        require("time", &self.time)?;
        validate_date(&self.date)?;
        validate_time(&self.time)?;
        Ok(serde_json::json!({ "date": self.date.trim(), "time": self.time.trim() }))
    }
}

/// Customer edit. Absent fields stay as they are.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingEdit {
    pub date: Option<String>,
    pub time: Option<String>,
    pub whatsapp: Option<String>,
}

impl BookingEdit {
    fn into_payload(self) -> Result<Map<String, Value>, BookingError> {
        let mut body = Map::new();
        if let Some(date) = self.date {
            require("date", &date)?;
            validate_date(&date)?;
            body.insert("date".into(), date.trim().into());
        }
        if let Some(time) = self.time {
            require("time", &time)?;
            validate_time(&time)?;
            body.insert("time".into(), time.trim().into());
        }
        if let Some(whatsapp) = self.whatsapp {
            require("whatsapp", &whatsapp)?;
            body.insert("whatsapp".into(), whatsapp.trim().into());
        }
        if body.is_empty() {
            return Err(BookingError::Validation("Nothing to update.".into()));
        }
        Ok(body)
    }
}

fn require(field: &str, value: &str) -> Result<(), BookingError> {
    if value.trim().is_empty() {
        return Err(BookingError::Validation(format!("Missing required field: {field}")));
    }
    Ok(())
}

fn insert_non_empty(body: &mut Map<String, Value>, field: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        body.insert(field.to_owned(), value.into());
    }
}

/// Accepts `YYYY-MM-DD`, or an ISO timestamp whose first ten characters are one.
fn validate_date(raw: &str) -> Result<time::Date, BookingError> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    time::Date::parse(day, format_description!("[year]-[month]-[day]"))
        .map_err(|_| BookingError::Validation(format!("Invalid date: {raw}")))
}

fn validate_time(raw: &str) -> Result<time::Time, BookingError> {
    let raw = raw.trim();
    time::Time::parse(raw, format_description!("[hour]:[minute]"))
        .or_else(|_| time::Time::parse(raw, format_description!("[hour]:[minute]:[second]")))
        .map_err(|_| BookingError::Validation(format!("Invalid time: {raw}")))
}

// =============================================================================
// BACKEND CALLS
// =============================================================================

/// Decode a bookings list. Anything other than an array reads as empty, and
/// a row that does not decode (an unknown status, say) is skipped.
fn parse_bookings(value: Value) -> Vec<Booking> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Booking>(item) {
            Ok(booking) => Some(booking),
            Err(e) => {
                tracing::warn!(error = %e, "skipping undecodable booking row");
                None
            }
        })
        .collect()
}

async fn fetch_bookings(
    fetcher: &AuthFetcher,
    session: &AuthSession,
    request: ApiRequest,
    fallback: &str,
) -> Result<Vec<Booking>, BookingError> {
    let response = fetcher.fetch(session, &request).await?.checked(fallback)?;
    Ok(parse_bookings(response.json()?))
}

async fn patch_booking(
    fetcher: &AuthFetcher,
    session: &AuthSession,
    id: i64,
    body: Value,
    fallback: &str,
) -> Result<(), BookingError> {
    let request = ApiRequest::patch(format!("/bookings/{id}")).json(body);
    fetcher.fetch(session, &request).await?.checked(fallback)?;
    Ok(())
}

/// `POST /bookings` with a validated form. Returns the backend's answer.
///
/// # Errors
///
/// Returns a validation error before sending, or the backend's message.
pub async fn create_booking(fetcher: &AuthFetcher, session: &AuthSession, form: BookingForm) -> Result<Value, BookingError> {
    let payload = form.into_payload()?;
    let response = fetcher
        .fetch(session, &ApiRequest::post("/bookings").json(payload))
        .await?
        .checked("Booking failed.")?;
    tracing::info!(status = response.status.as_u16(), "booking submitted");
    Ok(response.json().unwrap_or(Value::Null))
}

fn find_mut(bookings: &mut [Booking], id: i64) -> Result<&mut Booking, BookingError> {
    bookings
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or(BookingError::NotFound(id))
}

// =============================================================================
// ADMIN VIEW MODEL
// =============================================================================

/// Every booking, as seen from the admin dashboard.
pub struct AdminBookings<'a> {
    fetcher: &'a AuthFetcher,
    session: &'a AuthSession,
    bookings: Vec<Booking>,
}

impl<'a> AdminBookings<'a> {
    /// `GET /bookings`.
    ///
    /// # Errors
    ///
    /// Returns a fetch error or the backend's message.
    pub async fn load(fetcher: &'a AuthFetcher, session: &'a AuthSession) -> Result<Self, BookingError> {
        let bookings = fetch_bookings(fetcher, session, ApiRequest::get("/bookings"), "Failed to fetch bookings").await?;
        Ok(Self { fetcher, session, bookings })
    }

    #[must_use]
    pub fn bookings(&self) -> &[Booking] {
        &self.bookings
    }

    async fn advance(
        &mut self,
        id: i64,
        target: BookingStatus,
        mut body: Map<String, Value>,
        fallback: &str,
    ) -> Result<&Booking, BookingError> {
        let current = find_mut(&mut self.bookings, id)?.status;
        current.transition(target)?;
        body.insert("status".into(), target.as_str().into());

        patch_booking(self.fetcher, self.session, id, Value::Object(body), fallback).await?;
        tracing::info!(booking_id = id, from = %current, to = %target, "booking status advanced");

        let booking = find_mut(&mut self.bookings, id)?;
        booking.status = target;
        Ok(booking)
    }

    /// pending → confirmed.
    ///
    /// # Errors
    ///
    /// Rejects any other starting status before sending.
    pub async fn confirm(&mut self, id: i64) -> Result<&Booking, BookingError> {
        self.advance(id, BookingStatus::Confirmed, Map::new(), "Failed to confirm booking.").await
    }

    /// Move a booking to a new date and time. Status is untouched.
    ///
    /// # Errors
    ///
    /// Returns a validation error, [`BookingError::NotFound`], or the backend's message.
    pub async fn reschedule(&mut self, id: i64, change: Reschedule) -> Result<&Booking, BookingError> {
        find_mut(&mut self.bookings, id)?;
        let payload = change.into_payload()?;
        patch_booking(self.fetcher, self.session, id, payload.clone(), "Failed to reschedule booking.").await?;

        let booking = find_mut(&mut self.bookings, id)?;
        if let Some(date) = payload["date"].as_str() {
            date.clone_into(&mut booking.date);
        }
        if let Some(time) = payload["time"].as_str() {
            time.clone_into(&mut booking.time);
        }
        Ok(booking)
    }

    /// confirmed → processing order, recording the order details.
    ///
    /// # Errors
    ///
    /// Rejects any other starting status before sending.
    pub async fn submit_order_details(&mut self, id: i64, details: OrderDetails) -> Result<&Booking, BookingError> {
        let details = details.into_payload();
        let mut body = Map::new();
        body.insert("orderDetails".into(), details.clone());

        self.advance(id, BookingStatus::ProcessingOrder, body, "Failed to send Order details.")
            .await?;
        let booking = find_mut(&mut self.bookings, id)?;
        booking.order_details = Some(details);
        Ok(booking)
    }

    /// processing order → delivering, recording the courier tracking code.
    ///
    /// # Errors
    ///
    /// Rejects a blank code or any other starting status before sending.
    pub async fn send_tracking_code(&mut self, id: i64, code: &str) -> Result<&Booking, BookingError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(BookingError::Validation("Tracking code is required.".into()));
        }
        let mut body = Map::new();
        body.insert("trackingCode".into(), code.into());

        self.advance(id, BookingStatus::Delivering, body, "Failed to send tracking code.")
            .await?;
        let booking = find_mut(&mut self.bookings, id)?;
        booking.tracking_code = Some(code.to_owned());
        Ok(booking)
    }
}

// =============================================================================
// CUSTOMER VIEW MODEL
// =============================================================================

/// One customer's bookings.
pub struct CustomerBookings<'a> {
    fetcher: &'a AuthFetcher,
    session: &'a AuthSession,
    bookings: Vec<Booking>,
}

impl<'a> CustomerBookings<'a> {
    /// `GET /bookings/customer/:id`.
    ///
    /// # Errors
    ///
    /// Returns a fetch error or the backend's message.
    pub async fn load(fetcher: &'a AuthFetcher, session: &'a AuthSession, user_id: &str) -> Result<Self, BookingError> {
        let request = ApiRequest::get(format!("/bookings/customer/{user_id}"));
        let bookings = fetch_bookings(fetcher, session, request, "Failed to fetch bookings").await?;
        Ok(Self { fetcher, session, bookings })
    }

    pub fn ongoing(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(|b| !b.status.is_history())
    }

    pub fn history(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.iter().filter(|b| b.status.is_history())
    }

    /// Change date, time or WhatsApp on a booking that is still editable.
    ///
    /// # Errors
    ///
    /// [`BookingError::NotFound`] if the booking is not this customer's,
    /// [`BookingError::NotEditable`] once production has started.
    pub async fn update(&mut self, id: i64, edit: BookingEdit) -> Result<&Booking, BookingError> {
        let status = find_mut(&mut self.bookings, id)?.status;
        if !status.is_customer_editable() {
            return Err(BookingError::NotEditable(status));
        }
        let payload = edit.into_payload()?;
        patch_booking(self.fetcher, self.session, id, Value::Object(payload.clone()), "Failed to update booking").await?;

        let booking = find_mut(&mut self.bookings, id)?;
        if let Some(Value::String(date)) = payload.get("date") {
            booking.date.clone_from(date);
        }
        if let Some(Value::String(time)) = payload.get("time") {
            booking.time.clone_from(time);
        }
        if let Some(Value::String(whatsapp)) = payload.get("whatsapp") {
            booking.whatsapp.clone_from(whatsapp);
        }
        Ok(booking)
    }
}

// =============================================================================
// AVAILABLE DATES
// =============================================================================

#[derive(Debug, Deserialize)]
struct AvailableDate {
    date: String,
}

/// `GET /available-dates`, presented as `YYYY-MM-DD`.
///
/// # Errors
///
/// Returns a fetch error or the backend's message.
pub async fn list_available_dates(fetcher: &AuthFetcher, session: &AuthSession) -> Result<Vec<String>, BookingError> {
    let response = fetcher
        .fetch(session, &ApiRequest::get("/available-dates"))
        .await?
        .checked("Failed to fetch available dates")?;
    let dates: Vec<AvailableDate> = match response.json::<Value>()? {
        value @ Value::Array(_) => serde_json::from_value(value).map_err(|e| BackendError::Parse(e.to_string()))?,
        _ => Vec::new(),
    };
    Ok(dates
        .into_iter()
        .map(|d| d.date.get(..10).unwrap_or(d.date.as_str()).to_owned())
        .collect())
}

/// `POST /available-dates` with the day as a UTC-midnight ISO timestamp.
///
/// # Errors
///
/// Rejects a malformed date before sending, otherwise a fetch or backend error.
pub async fn add_available_date(fetcher: &AuthFetcher, session: &AuthSession, date: &str) -> Result<String, BookingError> {
    let day = validate_date(date)?;
    let iso = format!("{day}T00:00:00.000Z");
    fetcher
        .fetch(session, &ApiRequest::post("/available-dates").json(serde_json::json!({ "date": iso })))
        .await?
        .checked("Failed to add date")?;
    tracing::info!(%day, "available date added");
    Ok(day.to_string())
}

#[cfg(test)]
#[path = "booking_test.rs"]
mod tests;
