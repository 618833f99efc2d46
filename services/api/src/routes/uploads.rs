//! Image uploads
//!
//! Files are written to the configured upload directory under a random name
//! and served back from `/uploads/<name>`.

use std::path::Path;

use axum::{
    Extension, Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
};
use serde_json::{Value, json};
use tracing::info;
use uuid::Uuid;

use super::require_auth;
use crate::{
    error::{ApiError, ApiResult},
    middleware::AuthUser,
    state::AppState,
};

/// Room for multipart boundaries and headers around the file itself
const MULTIPART_OVERHEAD: usize = 16 * 1024;

pub fn router(state: &AppState) -> Router<AppState> {
    require_auth(
        state,
        Router::new()
            .route("/upload", post(upload))
            .layer(DefaultBodyLimit::max(
                state.config.max_upload_bytes + MULTIPART_OVERHEAD,
            )),
    )
}

/// File extension for the accepted image content types
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Store the multipart field `file` and return its public URL
pub async fn upload(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let extension = field
            .content_type()
            .and_then(image_extension)
            .ok_or_else(|| ApiError::BadRequest("Only image uploads are allowed".to_string()))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;

        if data.is_empty() {
            return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
        }
        if data.len() > state.config.max_upload_bytes {
            return Err(ApiError::BadRequest(format!(
                "File must be at most {} bytes",
                state.config.max_upload_bytes
            )));
        }

        let name = format!("{}.{}", Uuid::new_v4(), extension);
        tokio::fs::write(Path::new(&state.config.upload_dir).join(&name), &data).await?;
        info!("User {} uploaded {} ({} bytes)", user.id, name, data.len());

        return Ok((
            StatusCode::CREATED,
            Json(json!({ "url": format!("/uploads/{}", name) })),
        ));
    }

    Err(ApiError::BadRequest("No file provided".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_extension() {
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("IMAGE/JPEG"), Some("jpg"));
        assert_eq!(image_extension("image/webp"), Some("webp"));
        assert_eq!(image_extension("application/pdf"), None);
        assert_eq!(image_extension("image/svg+xml"), None);
    }
}
