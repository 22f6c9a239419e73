//! Explicit per-bucket session context.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bucketfile_core::namespace::{is_folder_marker, parent_prefix};
use bucketfile_core::{
    BucketResult, DirectoryListing, ObjectStore, SelectionModel, SessionConfig,
};
use bucketfile_ops::{MutationCoordinator, TransferController, TransferOutcome, UploadFile};
use bucketfile_scan::{AggregateScanner, ListingCursor, ScanScope};

use crate::view::{DirectoryRow, SortOrder, directory_rows};

/// Cached whole-bucket storage usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsageState {
    /// Never scanned.
    #[default]
    Unknown,
    /// A scan is running.
    Loading,
    /// Total bytes from the last complete scan.
    Known(u64),
    /// The last scan failed.
    Unavailable,
}

impl UsageState {
    /// Known total, if any.
    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Known(bytes) => Some(*bytes),
            _ => None,
        }
    }
}

/// Everything one open bucket needs: the store handle, where the user is,
/// what they picked, and the operation drivers.
///
/// The store handle never changes after [`open`](Self::open). Every
/// operation clears `last_error` when it starts and sets it when it fails,
/// so the session stays usable for a retry.
pub struct Session {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    region: String,
    config: SessionConfig,
    current_prefix: String,
    listing: ListingCursor,
    scanner: AggregateScanner,
    usage: UsageState,
    selection: SelectionModel,
    transfers: Arc<TransferController>,
    mutations: Arc<MutationCoordinator>,
    last_error: Option<String>,
}

impl Session {
    /// Open a session at the bucket root. Nothing is fetched until the first
    /// refresh.
    pub fn open(
        store: Arc<dyn ObjectStore>,
        bucket: impl Into<String>,
        region: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            listing: ListingCursor::from_config(store.clone(), &config),
            scanner: AggregateScanner::new(store.clone(), config.max_keys),
            transfers: Arc::new(TransferController::from_config(store.clone(), &config)),
            mutations: Arc::new(MutationCoordinator::from_config(store.clone(), &config)),
            store,
            bucket: bucket.into(),
            region: region.into(),
            config,
            current_prefix: String::new(),
            usage: UsageState::Unknown,
            selection: SelectionModel::new(),
            last_error: None,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Folder currently shown ("" is the bucket root).
    pub fn current_prefix(&self) -> &str {
        &self.current_prefix
    }

    /// Listing of the current folder.
    pub fn listing(&self) -> &DirectoryListing {
        self.listing.current()
    }

    pub fn usage(&self) -> UsageState {
        self.usage
    }

    pub fn selection(&self) -> &SelectionModel {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut SelectionModel {
        &mut self.selection
    }

    /// Shared handle to the upload driver, for cancelling from another task.
    pub fn transfers(&self) -> Arc<TransferController> {
        self.transfers.clone()
    }

    /// Shared handle to the delete driver, for background bulk deletes.
    pub fn mutations(&self) -> Arc<MutationCoordinator> {
        self.mutations.clone()
    }

    /// Message of the most recent failure, cleared by the next operation.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Select every folder and file in the current listing.
    pub fn select_all_visible(&mut self) {
        let keys: Vec<String> = self.listing.current().keys().map(str::to_string).collect();
        self.selection.select_all(keys);
    }

    /// View rows for the current folder.
    pub fn rows(&self, order: SortOrder, search: &str) -> Vec<DirectoryRow> {
        directory_rows(self.listing.current(), order, search)
    }

    /// List the current folder and scan the whole bucket.
    pub async fn refresh_all(&mut self) -> BucketResult<()> {
        self.last_error = None;
        let listed = self.relist().await;
        let scanned = self.rescan().await;
        self.record(listed.and(scanned))
    }

    /// Move to folder `prefix` and list it. The selection is cleared.
    pub async fn navigate(&mut self, prefix: impl Into<String>) -> BucketResult<()> {
        self.current_prefix = prefix.into();
        self.selection.clear();
        tracing::debug!(bucket = %self.bucket, prefix = %self.current_prefix, "navigate");
        self.refresh().await
    }

    /// Move to the parent folder. At the root this re-lists the root.
    pub async fn back(&mut self) -> BucketResult<()> {
        let parent = parent_prefix(&self.current_prefix);
        self.navigate(parent).await
    }

    /// Re-list the current folder.
    pub async fn refresh(&mut self) -> BucketResult<()> {
        self.last_error = None;
        let listed = self.relist().await;
        self.record(listed)
    }

    /// Rescan the bucket's total size.
    pub async fn refresh_usage(&mut self) -> BucketResult<()> {
        self.last_error = None;
        let scanned = self.rescan().await;
        self.record(scanned)
    }

    /// Upload `files` into the current folder.
    ///
    /// A cancelled upload is not an error. A call made while another upload
    /// is running is rejected as cancelled.
    pub async fn upload<F>(&mut self, files: Vec<UploadFile>, on_progress: F) -> BucketResult<TransferOutcome>
    where
        F: FnMut(u8) + Send,
    {
        self.last_error = None;
        let result = self
            .transfers
            .upload(&self.bucket, &self.current_prefix, files, on_progress)
            .await;
        self.finish(result).await
    }

    /// Ask the running upload to stop.
    pub fn cancel_upload(&self) {
        self.transfers.cancel();
    }

    /// Delete one file, or a whole folder when `key` ends with the delimiter.
    pub async fn delete(&mut self, key: &str) -> BucketResult<()> {
        self.last_error = None;
        let result = if is_folder_marker(key) {
            self.mutations
                .delete_folder(&self.bucket, key)
                .await
                .map(|_| ())
        } else {
            self.mutations.delete_one(&self.bucket, key).await
        };
        self.finish(result).await
    }

    /// Delete every selected key. Does nothing when the selection is empty.
    ///
    /// The selection is cleared only if every item was deleted.
    pub async fn delete_selected(&mut self) -> BucketResult<()> {
        if self.selection.is_empty() {
            return Ok(());
        }

        self.last_error = None;
        let keys = self.selection.to_vec();
        let result = self.mutations.delete_bulk(&self.bucket, &keys).await;
        if result.is_ok() {
            self.selection.clear();
        }
        self.finish(result).await
    }

    /// Create folder `name` inside the current folder, returning its key.
    pub async fn create_folder(&mut self, name: &str) -> BucketResult<String> {
        self.last_error = None;
        let result = self
            .mutations
            .create_folder(&self.bucket, &self.current_prefix, name)
            .await;
        self.finish(result).await
    }

    /// Save object `key` into `dir`, returning the written path.
    pub async fn download(&mut self, key: &str, dir: &Path) -> BucketResult<PathBuf> {
        self.last_error = None;
        let result = bucketfile_ops::download_to(self.store.as_ref(), &self.bucket, key, dir).await;
        self.record(result)
    }

    async fn relist(&mut self) -> BucketResult<()> {
        self.listing
            .list(&self.bucket, &self.current_prefix)
            .await
            .map(|_| ())
    }

    async fn rescan(&mut self) -> BucketResult<()> {
        self.usage = UsageState::Loading;
        match self.scanner.scan_all(&self.bucket, &ScanScope::Bucket).await {
            Ok(result) => {
                self.usage = UsageState::Known(result.total_bytes);
                Ok(())
            }
            Err(e) => {
                self.usage = UsageState::Unavailable;
                Err(e)
            }
        }
    }

    /// Re-list and rescan after a mutation, then record the outcome.
    ///
    /// Both run even when the mutation failed, since partial work may have
    /// landed. The mutation's own result is returned unchanged; a reload
    /// failure after a successful mutation only shows up in `last_error`.
    async fn finish<T>(&mut self, result: BucketResult<T>) -> BucketResult<T> {
        let listed = self.relist().await;
        let scanned = self.rescan().await;
        if result.is_ok() {
            let _ = self.record(listed.and(scanned));
        }
        self.record(result)
    }

    fn record<T>(&mut self, result: BucketResult<T>) -> BucketResult<T> {
        if let Err(e) = &result {
            let message = e.detailed();
            tracing::warn!(bucket = %self.bucket, error = %message, "operation failed");
            self.last_error = Some(message);
        }
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("current_prefix", &self.current_prefix)
            .field("usage", &self.usage)
            .field("selected", &self.selection.len())
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}
