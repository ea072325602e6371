//! Media file endpoint: serves fetched and re-sliced tracks to the
//! telephony provider.

use crate::{api::ApiError, AppState};
use axum::{
    extract::{Extension, Path},
    http::header,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Handler for `GET /media/{filename}`.
///
/// Only plain file names inside the storage directory are served; anything
/// else, and files already deleted by retention, is a 404.
pub async fn get_media_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ApiError> {
    let path = state
        .media
        .resolve(&filename)
        .ok_or_else(|| ApiError::NotFound("media file".to_string()))?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(filename = %filename, "media file not found");
            return Err(ApiError::NotFound("media file".to_string()));
        }
        Err(e) => {
            tracing::error!(filename = %filename, error = %e, "failed to read media file");
            return Err(ApiError::InternalServerError("media read failed".to_string()));
        }
    };

    tracing::debug!(filename = %filename, bytes = bytes.len(), "serving media file");
    Ok((
        [
            (header::CONTENT_TYPE, AUDIO_CONTENT_TYPE.to_string()),
            (header::CONTENT_LENGTH, bytes.len().to_string()),
        ],
        bytes,
    )
        .into_response())
}
