//! Directory-backed object store.
//!
//! Each bucket is a directory under the root and each key is a path relative
//! to it. Directories stand in for folder markers: every directory is listed
//! as a zero-byte key ending in the delimiter.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use jwalk::WalkDir;

use bucketfile_core::{
    BoxFuture, CompletedPart, DELIMITER, ListRequest, ListingPage, ObjectEntry, ObjectStore,
    StoreError, StoreResult,
};

use crate::paging::paginate;

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<u32, Bytes>,
}

/// Object store over a local directory tree.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    uploads: DashMap<String, PendingUpload>,
    next_upload: AtomicU64,
}

impl LocalStore {
    /// Create a store rooted at `root`. Buckets are its sub-directories.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            uploads: DashMap::new(),
            next_upload: AtomicU64::new(0),
        }
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_path(&self, bucket: &str) -> StoreResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(DELIMITER) || bucket.starts_with('.') {
            return Err(StoreError::InvalidRequest {
                message: format!("Invalid bucket name: {bucket}"),
            });
        }
        let path = self.root.join(bucket);
        if !path.is_dir() {
            return Err(StoreError::NoSuchBucket {
                bucket: bucket.to_string(),
            });
        }
        Ok(path)
    }

    fn object_path(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        let mut path = self.bucket_path(bucket)?;
        let trimmed = key.strip_suffix(DELIMITER).unwrap_or(key);
        if trimmed.is_empty() {
            return Err(invalid_key(key));
        }
        for segment in trimmed.split(DELIMITER) {
            if segment.is_empty() || segment == "." || segment == ".." || segment.contains('\\') {
                return Err(invalid_key(key));
            }
            path.push(segment);
        }
        Ok(path)
    }
}

fn invalid_key(key: &str) -> StoreError {
    StoreError::InvalidRequest {
        message: format!("Key cannot be stored on disk: {key}"),
    }
}

async fn blocking<T, F>(f: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::transport(format!("Task failed: {e}")))?
}

/// Collect files and directories under `start` as entries keyed relative to
/// `bucket_root`, sorted by key.
///
/// With `children_only` the walk stops at direct children. Deeper content
/// would fold into a child directory's common prefix anyway, and that
/// directory is listed as its own marker.
fn walk_entries(bucket_root: &Path, start: &Path, children_only: bool) -> StoreResult<Vec<ObjectEntry>> {
    let mut entries = Vec::new();
    if !start.is_dir() {
        return Ok(entries);
    }

    let mut walk = WalkDir::new(start).skip_hidden(false);
    if children_only {
        walk = walk.max_depth(1);
    }

    // Depth 0 is kept so a folder's own marker is listed with its content.
    for entry_result in walk {
        let entry = entry_result.map_err(|e| StoreError::transport(e.to_string()))?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(bucket_root) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let mut key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let file_type = entry.file_type();
        if file_type.is_dir() {
            key.push(DELIMITER);
            entries.push(ObjectEntry::new(key, 0));
        } else if file_type.is_file() {
            let metadata = entry
                .metadata()
                .map_err(|e| StoreError::transport(e.to_string()))?;
            let mut object = ObjectEntry::new(key, metadata.len());
            if let Ok(modified) = metadata.modified() {
                object = object.with_last_modified(DateTime::<Utc>::from(modified));
            }
            entries.push(object);
        }
    }

    entries.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(entries)
}

fn write_object(path: &Path, key: &str, body: &[u8]) -> StoreResult<()> {
    if key.ends_with(DELIMITER) {
        return fs::create_dir_all(path).map_err(|e| StoreError::io(path, e));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    fs::write(path, body).map_err(|e| StoreError::io(path, e))
}

impl ObjectStore for LocalStore {
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        request: &'a ListRequest,
    ) -> BoxFuture<'a, StoreResult<ListingPage>> {
        Box::pin(async move {
            let bucket_root = self.bucket_path(bucket)?;

            // Only the directory named by the prefix's folder part can hold matches.
            let start = match request.prefix.rfind(DELIMITER) {
                Some(idx) => bucket_root.join(&request.prefix[..idx]),
                None => bucket_root.clone(),
            };

            let children_only = request.delimiter == Some(DELIMITER);

            tracing::debug!(bucket, prefix = %request.prefix, children_only, "listing local bucket");
            let entries = blocking(move || walk_entries(&bucket_root, &start, children_only)).await?;
            Ok(paginate(&entries, request))
        })
    }

    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(async move {
            let path = self.object_path(bucket, key)?;
            let owned_key = key.to_string();
            blocking(move || {
                if owned_key.ends_with(DELIMITER) {
                    return if path.is_dir() {
                        Ok(Bytes::new())
                    } else {
                        Err(StoreError::NotFound { key: owned_key })
                    };
                }
                match fs::read(&path) {
                    Ok(data) => Ok(Bytes::from(data)),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        Err(StoreError::NotFound { key: owned_key })
                    }
                    Err(e) => Err(StoreError::io(&path, e)),
                }
            })
            .await
        })
    }

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let path = self.object_path(bucket, key)?;
            let owned_key = key.to_string();
            blocking(move || write_object(&path, &owned_key, &body)).await
        })
    }

    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let path = self.object_path(bucket, key)?;
            let is_marker = key.ends_with(DELIMITER);
            blocking(move || {
                let result = if is_marker {
                    fs::remove_dir(&path)
                } else {
                    fs::remove_file(&path)
                };
                match result {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    // A marker over remaining content leaves the content visible, as in S3.
                    Err(e) if is_marker && e.kind() == std::io::ErrorKind::DirectoryNotEmpty => Ok(()),
                    Err(e) => Err(StoreError::io(&path, e)),
                }
            })
            .await
        })
    }

    fn create_multipart_upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, StoreResult<String>> {
        Box::pin(async move {
            self.object_path(bucket, key)?;
            let id = format!("local-{}", self.next_upload.fetch_add(1, Ordering::Relaxed));
            self.uploads.insert(
                id.clone(),
                PendingUpload {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    parts: BTreeMap::new(),
                },
            );
            Ok(id)
        })
    }

    fn upload_part<'a>(
        &'a self,
        _bucket: &'a str,
        _key: &'a str,
        upload_id: &'a str,
        part_number: u32,
        body: Bytes,
    ) -> BoxFuture<'a, StoreResult<CompletedPart>> {
        Box::pin(async move {
            let mut upload =
                self.uploads
                    .get_mut(upload_id)
                    .ok_or_else(|| StoreError::InvalidRequest {
                        message: format!("No such upload: {upload_id}"),
                    })?;
            let etag = format!("{part_number}-{}", body.len());
            upload.parts.insert(part_number, body);
            Ok(CompletedPart { part_number, etag })
        })
    }

    fn complete_multipart_upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
        mut parts: Vec<CompletedPart>,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            let (_, upload) =
                self.uploads
                    .remove(upload_id)
                    .ok_or_else(|| StoreError::InvalidRequest {
                        message: format!("No such upload: {upload_id}"),
                    })?;
            if upload.bucket != bucket || upload.key != key {
                return Err(StoreError::InvalidRequest {
                    message: format!("Upload {upload_id} belongs to {}", upload.key),
                });
            }

            parts.sort_by_key(|p| p.part_number);
            let mut body = BytesMut::new();
            for part in &parts {
                let data = upload.parts.get(&part.part_number).ok_or_else(|| {
                    StoreError::InvalidRequest {
                        message: format!("Missing part {}", part.part_number),
                    }
                })?;
                body.extend_from_slice(data);
            }

            let path = self.object_path(bucket, key)?;
            let owned_key = key.to_string();
            let body = body.freeze();
            blocking(move || write_object(&path, &owned_key, &body)).await
        })
    }

    fn abort_multipart_upload<'a>(
        &'a self,
        _bucket: &'a str,
        _key: &'a str,
        upload_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.uploads.remove(upload_id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("b")).unwrap();
        let store = LocalStore::new(dir.path());

        assert!(store.object_path("b", "../escape").is_err());
        assert!(store.object_path("b", "a//b").is_err());
        assert!(store.object_path("b", "/").is_err());
        assert!(store.object_path("b", "docs/report.pdf").is_ok());
        assert!(store.object_path("b", "docs/").is_ok());
    }

    #[test]
    fn test_missing_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(matches!(
            store.bucket_path("nope"),
            Err(StoreError::NoSuchBucket { .. })
        ));
    }
}
