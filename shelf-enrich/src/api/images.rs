//! Image store API handlers
//!
//! POST /images (raw bytes), GET /images/:hash

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::services::StoredImage;
use crate::AppState;

/// Upload ceiling for a single photo
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024;

/// POST /images
///
/// Content-addressed upload; identical bytes return `exists: true`.
pub async fn upload_image(State(state): State<AppState>, body: Bytes) -> ApiResult<Json<StoredImage>> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Empty image body".to_string()));
    }

    let stored = state.image_store.upload(&body).await?;
    Ok(Json(stored))
}

/// GET /images/:hash
pub async fn get_image(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let bytes = state.image_store.read(&hash).await?;
    Ok((
        [
            (header::CONTENT_TYPE, content_type(&bytes)),
            (header::CACHE_CONTROL, "public, max-age=31536000, immutable"),
        ],
        bytes,
    ))
}

/// MIME type sniffed from magic bytes
fn content_type(bytes: &[u8]) -> &'static str {
    infer::get(bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream")
}

/// Build image routes
pub fn image_routes() -> Router<AppState> {
    Router::new()
        .route("/images", post(upload_image))
        .route("/images/:hash", get(get_image))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_magic_bytes() {
        assert_eq!(content_type(b"\xff\xd8\xff\xe0 rest"), "image/jpeg");
        assert_eq!(content_type(b"\x89PNG\r\n\x1a\n rest"), "image/png");
        assert_eq!(content_type(b"plain text"), "application/octet-stream");
        assert_eq!(content_type(b""), "application/octet-stream");
    }
}
