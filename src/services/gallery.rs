//! Design-image gallery and order design uploads.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorCode;
use crate::services::auth_fetch::{AuthFetcher, AuthSession, FetchError};
use crate::services::backend::{ApiRequest, BackendApi, BackendError, FilePart, MultipartForm};

/// Largest accepted design image, 2 MiB.
pub const MAX_DESIGN_IMAGE_BYTES: usize = 2 * 1024 * 1024;

const DESIGN_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DesignCategory {
    #[default]
    Kartini,
    Balloon,
    Sabrina,
    Brides,
    ModernElegant,
}

impl DesignCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kartini => "kartini",
            Self::Balloon => "balloon",
            Self::Sabrina => "sabrina",
            Self::Brides => "brides",
            Self::ModernElegant => "modern-elegant",
        }
    }

    /// Parse a gallery label. Absent or blank means the first category.
    ///
    /// # Errors
    ///
    /// Returns [`GalleryError::UnknownCategory`] for any other label.
    pub fn from_label(label: Option<&str>) -> Result<Self, GalleryError> {
        match label.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some("kartini") => Ok(Self::Kartini),
            Some("balloon") => Ok(Self::Balloon),
            Some("sabrina") => Ok(Self::Sabrina),
            Some("brides") => Ok(Self::Brides),
            Some("modern-elegant") => Ok(Self::ModernElegant),
            Some(other) => Err(GalleryError::UnknownCategory(other.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("unknown design category: {0}")]
    UnknownCategory(String),
    #[error("Only JPG, JPEG, PNG files are allowed.")]
    UnsupportedType,
    #[error("Max file size is 2MB.")]
    TooLarge,
    #[error("No file uploaded")]
    MissingFile,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ErrorCode for GalleryError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownCategory(_) => "E_UNKNOWN_CATEGORY",
            Self::UnsupportedType => "E_UNSUPPORTED_IMAGE",
            Self::TooLarge => "E_IMAGE_TOO_LARGE",
            Self::MissingFile => "E_MISSING_FILE",
            Self::Fetch(e) => e.error_code(),
            Self::Backend(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Fetch(e) => e.status(),
            Self::Backend(e) => e.status(),
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn redirect(&self) -> Option<&'static str> {
        match self {
            Self::Fetch(e) => e.redirect(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignImage {
    pub id: i64,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Check an order design image before it is forwarded.
///
/// # Errors
///
/// Rejects anything but JPEG/PNG and anything over 2 MiB.
pub fn validate_design_image(part: &FilePart) -> Result<(), GalleryError> {
    let content_type = part.content_type.trim().to_ascii_lowercase();
    if !DESIGN_IMAGE_TYPES.contains(&content_type.as_str()) {
        return Err(GalleryError::UnsupportedType);
    }
    if part.bytes.len() > MAX_DESIGN_IMAGE_BYTES {
        return Err(GalleryError::TooLarge);
    }
    Ok(())
}

#[derive(Deserialize)]
struct UploadedImage {
    url: String,
}

fn parse_images(value: Value) -> Vec<DesignImage> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Public gallery listing, `GET /design-images?label=`.
///
/// # Errors
///
/// Returns a transport error; a non-array answer reads as an empty gallery.
pub async fn list_images(backend: &dyn BackendApi, category: DesignCategory) -> Result<Vec<DesignImage>, GalleryError> {
    let request = ApiRequest::get("/design-images").query("label", category.as_str());
    let response = backend.send(&request, None).await?.checked("Failed to load images.")?;
    Ok(parse_images(response.json()?))
}

/// Admin gallery upload. The backend answers with the category's updated list.
///
/// # Errors
///
/// Returns a fetch error or the backend's message.
pub async fn upload_image(
    fetcher: &AuthFetcher,
    session: &AuthSession,
    category: DesignCategory,
    file: FilePart,
) -> Result<Vec<DesignImage>, GalleryError> {
    let form = MultipartForm::default()
        .file(FilePart { field: "file".into(), ..file })
        .text("label", category.as_str());
    let response = fetcher
        .fetch(session, &ApiRequest::post("/design-images").multipart(form))
        .await?
        .checked("Failed to upload image.")?;
    tracing::info!(category = category.as_str(), "design image uploaded");
    Ok(parse_images(response.json()?))
}

/// Admin gallery delete.
///
/// # Errors
///
/// Returns a fetch error or the backend's message.
pub async fn delete_image(fetcher: &AuthFetcher, session: &AuthSession, id: i64) -> Result<(), GalleryError> {
    fetcher
        .fetch(session, &ApiRequest::delete(format!("/design-images/{id}")))
        .await?
        .checked("Failed to delete image.")?;
    tracing::info!(image_id = id, "design image deleted");
    Ok(())
}

/// Upload an order design image and return its URL.
///
/// # Errors
///
/// Rejects bad files before sending, otherwise a fetch or backend error.
pub async fn upload_order_image(fetcher: &AuthFetcher, session: &AuthSession, file: FilePart) -> Result<String, GalleryError> {
    validate_design_image(&file)?;
    let form = MultipartForm::default().file(FilePart { field: "image".into(), ..file });
    let response = fetcher
        .fetch(session, &ApiRequest::post("/uploads/design-image").multipart(form))
        .await?
        .checked("Failed to upload image.")?;
    let uploaded: UploadedImage = response.json()?;
    Ok(uploaded.url)
}

#[cfg(test)]
#[path = "gallery_test.rs"]
mod tests;
