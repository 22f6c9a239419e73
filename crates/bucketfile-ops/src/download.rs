//! Object download.

use std::path::{Path, PathBuf};

use bytes::Bytes;

use bucketfile_core::namespace::{is_folder_marker, leaf_name};
use bucketfile_core::{BucketError, BucketResult, ObjectStore, StoreError};

/// Fetch an object's full body into memory.
pub async fn download(store: &dyn ObjectStore, bucket: &str, key: &str) -> BucketResult<Bytes> {
    let body = store
        .get_object(bucket, key)
        .await
        .map_err(|source| BucketError::DownloadFailed {
            key: key.to_string(),
            source,
        })?;
    tracing::debug!(bucket, key, bytes = body.len(), "downloaded object");
    Ok(body)
}

/// Fetch an object and save it in `dir` under its leaf name.
///
/// Returns the path written. Folder markers cannot be downloaded.
pub async fn download_to(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    dir: &Path,
) -> BucketResult<PathBuf> {
    if is_folder_marker(key) {
        return Err(BucketError::InvalidName {
            name: key.to_string(),
            reason: "Folders cannot be downloaded".to_string(),
        });
    }

    let body = download(store, bucket, key).await?;
    let path = dir.join(leaf_name(key, ""));

    let target = path.clone();
    let written = tokio::task::spawn_blocking(move || {
        std::fs::write(&target, &body).map_err(|e| StoreError::io(&target, e))
    })
    .await
    .map_err(|e| StoreError::transport(format!("Task failed: {e}")))
    .and_then(|written| written);

    written.map_err(|source| BucketError::DownloadFailed {
        key: key.to_string(),
        source,
    })?;

    tracing::info!(bucket, key, path = %path.display(), "saved object");
    Ok(path)
}
