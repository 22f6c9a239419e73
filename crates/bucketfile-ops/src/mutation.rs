//! Best-effort deletes and folder creation.
//!
//! There is no multi-object transaction. Every fan-out delete attempts all
//! of its items, never rolls back the ones that succeeded, and reports one
//! aggregate failure at the end. Fan-out is capped at `delete_concurrency`
//! requests in flight.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use itertools::Itertools;
use tokio::sync::mpsc;

use bucketfile_core::namespace::{folder_key, is_folder_marker, validate_folder_name};
use bucketfile_core::{
    BucketError, BucketResult, DELIMITER, DeleteFailure, ObjectStore, SessionConfig, StoreResult,
};
use bucketfile_scan::{AggregateScanner, ScanScope};

use crate::OPERATION_CHANNEL_SIZE;
use crate::progress::{OperationComplete, OperationProgress, OperationResult, OperationType};

/// Executes delete and create-folder operations against one store.
pub struct MutationCoordinator {
    store: Arc<dyn ObjectStore>,
    scanner: AggregateScanner,
    delete_concurrency: usize,
}

impl MutationCoordinator {
    /// Create a coordinator. Folder expansion lists `max_keys` per page.
    pub fn new(store: Arc<dyn ObjectStore>, max_keys: usize, delete_concurrency: usize) -> Self {
        Self {
            scanner: AggregateScanner::new(store.clone(), max_keys),
            store,
            delete_concurrency: delete_concurrency.max(1),
        }
    }

    /// Create a coordinator from session settings.
    pub fn from_config(store: Arc<dyn ObjectStore>, config: &SessionConfig) -> Self {
        Self::new(store, config.max_keys, config.delete_concurrency)
    }

    /// Delete one object. An absent key counts as deleted.
    pub async fn delete_one(&self, bucket: &str, key: &str) -> BucketResult<()> {
        ensure_absent(self.store.delete_object(bucket, key).await).map_err(|source| {
            BucketError::DeleteFailed {
                key: key.to_string(),
                source,
            }
        })?;
        tracing::info!(bucket, key, "deleted object");
        Ok(())
    }

    /// Delete every object under `prefix`, returning how many were removed.
    ///
    /// Content goes first with bounded parallelism, then folder markers one
    /// at a time from the deepest up. A folder with no objects is a no-op.
    pub async fn delete_folder(&self, bucket: &str, prefix: &str) -> BucketResult<usize> {
        self.delete_folder_with_progress(bucket, prefix, |_| {}).await
    }

    /// Like [`delete_folder`](Self::delete_folder), calling `on_progress`
    /// after each object. Nothing is reported for an empty folder.
    pub async fn delete_folder_with_progress<F>(
        &self,
        bucket: &str,
        prefix: &str,
        mut on_progress: F,
    ) -> BucketResult<usize>
    where
        F: FnMut(&OperationProgress) + Send,
    {
        let scan = self
            .scanner
            .scan_all(bucket, &ScanScope::Folder(prefix.to_string()))
            .await?;
        if scan.object_keys.is_empty() {
            tracing::debug!(bucket, prefix, "folder is already empty");
            return Ok(0);
        }

        let attempted = scan.object_keys.len();
        let (markers, content): (Vec<_>, Vec<_>) = scan
            .object_keys
            .into_iter()
            .partition(|key| is_folder_marker(key));

        let mut progress = OperationProgress::new(OperationType::DeleteFolder, attempted);
        self.delete_keys(bucket, content, |key, failure| {
            progress.complete_item(key, failure.cloned());
            on_progress(&progress);
        })
        .await;
        for marker in deepest_first(markers) {
            let failure = ensure_absent(self.store.delete_object(bucket, &marker).await)
                .err()
                .map(|e| DeleteFailure::new(marker.as_str(), e.to_string()));
            progress.complete_item(&marker, failure);
            on_progress(&progress);
        }

        if progress.has_errors() {
            tracing::warn!(
                bucket,
                prefix,
                failed = progress.errors.len(),
                attempted,
                "folder delete incomplete"
            );
            return Err(BucketError::FolderDeleteFailed {
                prefix: prefix.to_string(),
                failed: progress.errors.len(),
                attempted,
            });
        }

        tracing::info!(bucket, prefix, deleted = attempted, "deleted folder");
        Ok(attempted)
    }

    /// Delete a mixed selection of file keys and folder prefixes.
    ///
    /// Files are deleted in parallel; folders are expanded and deleted one
    /// after another. Every item is attempted before any failure is
    /// reported.
    pub async fn delete_bulk(&self, bucket: &str, keys: &[String]) -> BucketResult<()> {
        self.delete_bulk_with_progress(bucket, keys, |_, _| {}).await
    }

    /// Like [`delete_bulk`](Self::delete_bulk), calling `on_item` as each
    /// file or folder finishes.
    pub async fn delete_bulk_with_progress<F>(
        &self,
        bucket: &str,
        keys: &[String],
        mut on_item: F,
    ) -> BucketResult<()>
    where
        F: FnMut(&str, Option<&DeleteFailure>) + Send,
    {
        let (folders, files): (Vec<String>, Vec<String>) = keys
            .iter()
            .unique()
            .cloned()
            .partition(|key| is_folder_marker(key));
        let attempted = files.len() + folders.len();

        let mut failures = self.delete_keys(bucket, files, &mut on_item).await;

        for folder in folders {
            match self.delete_folder(bucket, &folder).await {
                Ok(_) => on_item(&folder, None),
                Err(e) => {
                    let failure = DeleteFailure::new(folder.as_str(), e.detailed());
                    on_item(&folder, Some(&failure));
                    failures.push(failure);
                }
            }
        }

        if !failures.is_empty() {
            tracing::warn!(bucket, failed = failures.len(), attempted, "bulk delete incomplete");
            return Err(BucketError::BulkDeleteFailed { failures, attempted });
        }

        tracing::info!(bucket, deleted = attempted, "bulk delete complete");
        Ok(())
    }

    /// Create the marker object for folder `name` inside `current_prefix`.
    ///
    /// Names are validated before any request is made.
    pub async fn create_folder(
        &self,
        bucket: &str,
        current_prefix: &str,
        name: &str,
    ) -> BucketResult<String> {
        validate_folder_name(name).map_err(|reason| BucketError::InvalidName {
            name: name.to_string(),
            reason,
        })?;

        let key = folder_key(current_prefix, name);
        self.store
            .put_object(bucket, &key, bytes::Bytes::new())
            .await
            .map_err(|source| BucketError::CreateFolderFailed {
                name: name.to_string(),
                source,
            })?;

        tracing::info!(bucket, key = %key, "created folder");
        Ok(key)
    }

    /// Delete `keys` with at most `delete_concurrency` requests in flight.
    async fn delete_keys<F>(&self, bucket: &str, keys: Vec<String>, mut on_item: F) -> Vec<DeleteFailure>
    where
        F: FnMut(&str, Option<&DeleteFailure>) + Send,
    {
        let store = &self.store;
        let mut results = stream::iter(keys)
            .map(|key| async move {
                let result = ensure_absent(store.delete_object(bucket, &key).await);
                (key, result)
            })
            .buffer_unordered(self.delete_concurrency);

        let mut failures = Vec::new();
        while let Some((key, result)) = results.next().await {
            match result {
                Ok(()) => on_item(&key, None),
                Err(e) => {
                    tracing::debug!(bucket, key = %key, error = %e, "delete failed");
                    let failure = DeleteFailure::new(key.as_str(), e.to_string());
                    on_item(&key, Some(&failure));
                    failures.push(failure);
                }
            }
        }
        failures
    }
}

/// Treat "already gone" as success.
fn ensure_absent(result: StoreResult<()>) -> StoreResult<()> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

/// Order folder markers so children come before their parents.
fn deepest_first(mut markers: Vec<String>) -> Vec<String> {
    markers.sort_by(|a, b| {
        let depth = |key: &str| key.matches(DELIMITER).count();
        depth(b).cmp(&depth(a)).then_with(|| b.cmp(a))
    });
    markers
}

/// Start a bulk delete on a background task.
///
/// The channel yields one progress update per finished item followed by a
/// single [`OperationResult::Complete`].
pub fn start_bulk_delete(
    coordinator: Arc<MutationCoordinator>,
    bucket: String,
    keys: Vec<String>,
) -> mpsc::Receiver<OperationResult> {
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::spawn(async move {
        let total = keys.iter().unique().count();
        let mut progress = OperationProgress::new(OperationType::Delete, total);
        let _ = tx.send(OperationResult::Progress(progress.clone())).await;

        let progress_tx = tx.clone();
        let result = coordinator
            .delete_bulk_with_progress(&bucket, &keys, |key, failure| {
                progress.complete_item(key, failure.cloned());
                let _ = progress_tx.try_send(OperationResult::Progress(progress.clone()));
            })
            .await;

        let errors = match result {
            Ok(()) => Vec::new(),
            Err(BucketError::BulkDeleteFailed { failures, .. }) => failures,
            Err(e) => vec![DeleteFailure::new(bucket.as_str(), e.detailed())],
        };
        let _ = tx
            .send(OperationResult::Complete(OperationComplete {
                operation_type: OperationType::Delete,
                succeeded: total.saturating_sub(errors.len()),
                failed: errors.len(),
                errors,
            }))
            .await;
    });

    rx
}

/// Start a folder delete on a background task.
///
/// The channel yields a progress update per deleted object followed by a
/// single [`OperationResult::Complete`] whose counts are objects. An empty
/// folder completes with zero items.
pub fn start_folder_delete(
    coordinator: Arc<MutationCoordinator>,
    bucket: String,
    prefix: String,
) -> mpsc::Receiver<OperationResult> {
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::spawn(async move {
        let mut last = None;
        let progress_tx = tx.clone();
        let result = coordinator
            .delete_folder_with_progress(&bucket, &prefix, |progress| {
                let _ = progress_tx.try_send(OperationResult::Progress(progress.clone()));
                last = Some(progress.clone());
            })
            .await;

        let complete = match (result, last) {
            (Ok(deleted), _) => OperationComplete {
                operation_type: OperationType::DeleteFolder,
                succeeded: deleted,
                failed: 0,
                errors: Vec::new(),
            },
            (Err(BucketError::FolderDeleteFailed { failed, attempted, .. }), Some(progress)) => {
                OperationComplete {
                    operation_type: OperationType::DeleteFolder,
                    succeeded: attempted.saturating_sub(failed),
                    failed,
                    errors: progress.errors,
                }
            }
            (Err(e), _) => OperationComplete {
                operation_type: OperationType::DeleteFolder,
                succeeded: 0,
                failed: 1,
                errors: vec![DeleteFailure::new(prefix.as_str(), e.detailed())],
            },
        };
        let _ = tx.send(OperationResult::Complete(complete)).await;
    });

    rx
}
