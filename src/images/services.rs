use anyhow::Context;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Longest a presigned image URL stays valid.
pub const PRESIGN_TTL_SECS: u64 = 30 * 60;

pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

/// Object key of a meal image: `meals/{user}/{meal}-{uuid}.{ext}`.
pub fn meal_image_key(user_id: Uuid, meal_id: Uuid, ext: &str) -> String {
    format!("meals/{}/{}-{}.{}", user_id, meal_id, Uuid::new_v4(), ext)
}

/// Stores every image and returns the new object keys in upload order.
/// Objects already stored are removed again if a later upload fails.
pub async fn upload_meal_images(
    st: &AppState,
    user_id: Uuid,
    meal_id: Uuid,
    images: Vec<UploadItem>,
) -> anyhow::Result<Vec<String>> {
    anyhow::ensure!(!images.is_empty(), "no images provided");

    let mut keys = Vec::with_capacity(images.len());
    for img in images {
        let ext = ext_from_mime(&img.content_type)
            .with_context(|| format!("unsupported image type {}", img.content_type))?;
        let key = meal_image_key(user_id, meal_id, ext);
        if let Err(e) = st
            .storage
            .put_object(&key, img.body, &img.content_type)
            .await
            .with_context(|| format!("put_object {}", key))
        {
            remove_objects(st, &keys).await;
            return Err(e);
        }
        debug!(key = %key, "meal image stored");
        keys.push(key);
    }
    Ok(keys)
}

/// Best-effort removal; failures are logged and skipped.
pub async fn remove_objects(st: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(e) = st.storage.delete_object(key).await {
            warn!(error = %e, key = %key, "failed to remove stored image");
        }
    }
}

pub async fn presign_many(
    st: &AppState,
    keys: Vec<String>,
    expires_seconds: u64,
) -> anyhow::Result<Vec<String>> {
    let mut out = Vec::with_capacity(keys.len());
    for k in keys {
        out.push(st.storage.presign_get(&k, expires_seconds).await?);
    }
    Ok(out)
}

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

pub async fn presign_key(st: &AppState, key: &str) -> anyhow::Result<String> {
    st.storage
        .presign_get(key, PRESIGN_TTL_SECS)
        .await
        .with_context(|| format!("presign url for key {}", key))
}
