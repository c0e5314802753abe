use anyhow::Context;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// An uploaded file as read from a multipart field.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Where an image belongs; picks the key prefix.
#[derive(Debug, Clone, Copy)]
pub enum ImageKind {
    Avatar,
    Cover,
}

impl ImageKind {
    fn prefix(self) -> &'static str {
        match self {
            ImageKind::Avatar => "avatars",
            ImageKind::Cover => "covers",
        }
    }
}

/// Stores an image and returns its public URL.
pub async fn upload_image(st: &AppState, kind: ImageKind, img: UploadItem) -> AppResult<String> {
    if img.body.is_empty() {
        return Err(AppError::Validation("uploaded file is empty".into()));
    }
    let ext = ext_from_mime(&img.content_type).ok_or_else(|| {
        AppError::Validation(format!("unsupported image type {}", img.content_type))
    })?;
    let key = format!("{}/{}.{}", kind.prefix(), Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, img.body, &img.content_type)
        .await
        .with_context(|| format!("put_object {}", key))
        .map_err(AppError::Storage)?;
    debug!(%key, "image uploaded");
    Ok(st.storage.public_url(&key))
}

/// Deletes the object behind a previously issued URL. Failures are only logged.
pub async fn delete_image(st: &AppState, url: &str) {
    let Some(key) = st.storage.key_from_url(url) else {
        debug!(%url, "not a managed object; skipping delete");
        return;
    };
    if let Err(e) = st.storage.delete_object(&key).await {
        warn!(error = %e, %key, "failed to delete old image");
    }
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}
