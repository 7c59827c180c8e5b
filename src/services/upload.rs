//! Local file uploads served back from `/uploads`.

use std::path::Path;

use axum::http::StatusCode;
use time::OffsetDateTime;

use crate::error::ErrorCode;

pub const UPLOADS_URL_PREFIX: &str = "/uploads";

const FALLBACK_NAME: &str = "upload";

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    MissingFile,
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFile => "E_MISSING_FILE",
            Self::Io(_) => "E_UPLOAD_IO",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile => StatusCode::BAD_REQUEST,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Reduce a client file name to its last path component, keeping only
/// `[A-Za-z0-9._-]`. Names that end up empty or all dots become `upload`.
#[must_use]
pub fn sanitize_file_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = last
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        FALLBACK_NAME.to_owned()
    } else {
        cleaned
    }
}

/// Write `bytes` under `dir` as `<unix-millis>-<name>` and return its public URL.
///
/// # Errors
///
/// Returns [`UploadError::Io`] if the directory or file cannot be written.
pub async fn save_upload(dir: &Path, file_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    save_upload_as(dir, millis, file_name, bytes).await
}

pub(crate) async fn save_upload_as(dir: &Path, millis: i128, file_name: &str, bytes: &[u8]) -> Result<String, UploadError> {
    let stored = format!("{millis}-{}", sanitize_file_name(file_name));
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join(&stored), bytes).await?;
    tracing::info!(file = %stored, bytes = bytes.len(), "upload stored");
    Ok(format!("{UPLOADS_URL_PREFIX}/{stored}"))
}

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;
