//! Design gallery: public listing and admin upload/delete.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use super::auth::AdminUser;
use super::{read_multipart, take_file, text_value};
use crate::error::error_response_from;
use crate::services::gallery::{self, DesignCategory, GalleryError};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct GalleryQuery {
    label: Option<String>,
}

/// `GET /design/images?label=`: public, no session needed.
pub async fn list_design_images(State(state): State<AppState>, Query(query): Query<GalleryQuery>) -> Response {
    let category = match DesignCategory::from_label(query.label.as_deref()) {
        Ok(category) => category,
        Err(e) => return error_response_from(&e),
    };
    match gallery::list_images(state.backend.as_ref(), category).await {
        Ok(images) => Json(images).into_response(),
        Err(e) => error_response_from(&e),
    }
}

/// `POST /api/admin/design-images` (multipart `file` + `label`) → the category's images.
pub async fn upload_design_image(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    multipart: Multipart,
) -> Response {
    let mut form = match read_multipart(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let category = match DesignCategory::from_label(text_value(&form, "label")) {
        Ok(category) => category,
        Err(e) => return error_response_from(&e),
    };
    let Some(file) = take_file(&mut form, "file") else {
        return error_response_from(&GalleryError::MissingFile);
    };
    match gallery::upload_image(&state.fetcher, &auth.session, category, file).await {
        Ok(images) => (StatusCode::CREATED, Json(images)).into_response(),
        Err(e) => error_response_from(&e),
    }
}

/// `DELETE /api/admin/design-images/{id}`.
pub async fn delete_design_image(
    State(state): State<AppState>,
    AdminUser(auth): AdminUser,
    Path(id): Path<i64>,
) -> Response {
    match gallery::delete_image(&state.fetcher, &auth.session, id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response_from(&e),
    }
}

#[cfg(test)]
#[path = "designs_test.rs"]
mod tests;
