//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries the local JSON API, the public design gallery and
//! static files. Every request passes the route guard first; `/uploads` is
//! served from the uploads directory and anything unmatched falls back to
//! the `public/` directory.

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod designs;
pub mod guard;
pub mod profile;
pub mod upload;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::Response;
use axum::routing::{delete, get, patch, post};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::error::error_response;
use crate::services::backend::{FilePart, MultipartForm};
use crate::services::upload::UPLOADS_URL_PREFIX;
use crate::state::AppState;

/// Multipart bodies carry design photos; leave room above the 2 MiB image cap.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(upload::upload))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/confirm", get(auth::confirm))
        .route("/api/auth/session", get(auth::session))
        .route("/api/auth/update-session", post(auth::update_session))
        .route(
            "/api/available-dates",
            get(bookings::list_available_dates).post(bookings::add_available_date),
        )
        .route("/api/bookings", get(bookings::customer_bookings).post(bookings::create_booking))
        .route("/api/bookings/{id}", patch(bookings::update_booking))
        .route("/api/admin/bookings", get(admin::list_bookings))
        .route("/api/admin/bookings/{id}/confirm", post(admin::confirm_booking))
        .route("/api/admin/bookings/{id}/schedule", patch(admin::reschedule_booking))
        .route("/api/admin/bookings/{id}/order-details", patch(admin::submit_order_details))
        .route("/api/admin/bookings/{id}/tracking-code", patch(admin::send_tracking_code))
        .route("/api/admin/uploads/design-image", post(admin::upload_order_image))
        .route("/api/admin/design-images", post(designs::upload_design_image))
        .route("/api/admin/design-images/{id}", delete(designs::delete_design_image))
        .route("/design/images", get(designs::list_design_images))
        .route("/api/profile", get(profile::get_profile).patch(profile::update_profile))
        .route("/healthz", get(healthz))
}

/// Full application router: API, guard, static files.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = ServeDir::new(&state.config.uploads_dir);
    let public = ServeDir::new(&state.config.public_dir).append_index_html_on_directories(true);

    api_routes()
        .nest_service(UPLOADS_URL_PREFIX, uploads)
        .fallback_service(public)
        .layer(middleware::from_fn_with_state(state.clone(), guard::route_guard))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Drain a multipart body into owned parts. Parts with a file name are files.
pub(crate) async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm, Response> {
    let mut form = MultipartForm::default();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err(error_response(e.status(), e.body_text())),
        };
        let name = field.name().unwrap_or_default().to_owned();
        match field.file_name().map(str::to_owned) {
            Some(file_name) => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| error_response(e.status(), e.body_text()))?;
                form.files.push(FilePart { field: name, file_name, content_type, bytes: bytes.to_vec() });
            }
            None => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| error_response(e.status(), e.body_text()))?;
                form.texts.push((name, text));
            }
        }
    }
    Ok(form)
}

/// First file sent under `field`.
pub(crate) fn take_file(form: &mut MultipartForm, field: &str) -> Option<FilePart> {
    let index = form.files.iter().position(|f| f.field == field)?;
    Some(form.files.swap_remove(index))
}

/// First text value sent under `field`.
pub(crate) fn text_value<'a>(form: &'a MultipartForm, field: &str) -> Option<&'a str> {
    form.texts
        .iter()
        .find(|(name, _)| name == field)
        .map(|(_, value)| value.as_str())
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
