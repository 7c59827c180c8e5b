//! Local file upload into the public uploads directory.

use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Json, Response};

use super::{read_multipart, take_file};
use crate::error::error_response_from;
use crate::services::upload::{self, UploadError};
use crate::state::AppState;

/// `POST /api/upload` (multipart field `file`) → `{ "url": "/uploads/..." }`.
pub async fn upload(State(state): State<AppState>, multipart: Multipart) -> Response {
    let mut form = match read_multipart(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };
    let Some(file) = take_file(&mut form, "file") else {
        return error_response_from(&UploadError::MissingFile);
    };

    match upload::save_upload(&state.config.uploads_dir, &file.file_name, &file.bytes).await {
        Ok(url) => Json(serde_json::json!({ "url": url })).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "upload save failed");
            error_response_from(&e)
        }
    }
}

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;
