//! Whole-bucket and whole-folder scanning.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use bucketfile_core::{
    AggregateResult, BucketError, BucketResult, ListRequest, ObjectStore, StoreError,
};

use crate::progress::{ProgressTracker, ScanProgress};

/// What a scan walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanScope {
    /// Every object in the bucket; only totals are kept.
    Bucket,
    /// Every object under a folder prefix; keys are kept for deletion.
    Folder(String),
}

impl ScanScope {
    /// Key prefix passed to each list call.
    pub fn prefix(&self) -> &str {
        match self {
            Self::Bucket => "",
            Self::Folder(prefix) => prefix,
        }
    }

    fn collects_keys(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

/// Walks every page under a scope via continuation tokens.
pub struct AggregateScanner {
    store: Arc<dyn ObjectStore>,
    max_keys: usize,
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl AggregateScanner {
    /// Create a scanner requesting `max_keys` objects per page.
    pub fn new(store: Arc<dyn ObjectStore>, max_keys: usize) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            store,
            max_keys: max_keys.max(1),
            progress_tx,
        }
    }

    /// Subscribe to per-page progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Scan every page under `scope`.
    ///
    /// Any failed page aborts the scan and nothing accumulated so far is
    /// returned.
    pub async fn scan_all(&self, bucket: &str, scope: &ScanScope) -> BucketResult<AggregateResult> {
        self.scan(bucket, scope, None).await
    }

    /// Like [`scan_all`](Self::scan_all), stopping with
    /// [`BucketError::ScanCancelled`] once `cancel` fires.
    pub async fn scan_all_with_cancel(
        &self,
        bucket: &str,
        scope: &ScanScope,
        cancel: &CancellationToken,
    ) -> BucketResult<AggregateResult> {
        self.scan(bucket, scope, Some(cancel)).await
    }

    async fn scan(
        &self,
        bucket: &str,
        scope: &ScanScope,
        cancel: Option<&CancellationToken>,
    ) -> BucketResult<AggregateResult> {
        let prefix = scope.prefix();
        let mut tracker = ProgressTracker::new(bucket, prefix);
        let mut result = AggregateResult::default();
        let mut token: Option<String> = None;

        let failed = |source: StoreError| BucketError::ScanFailed {
            bucket: bucket.to_string(),
            source,
        };
        let cancelled = || BucketError::ScanCancelled {
            bucket: bucket.to_string(),
        };

        loop {
            let request = ListRequest::recursive(prefix, self.max_keys).with_token(token.take());

            let page = match cancel {
                Some(cancel) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(cancelled()),
                        page = self.store.list_objects(bucket, &request) => page,
                    }
                }
                None => self.store.list_objects(bucket, &request).await,
            };
            let page = page.map_err(|source| {
                tracing::debug!(bucket, prefix, pages = tracker.pages_fetched(), "scan page failed");
                failed(source)
            })?;

            let page_bytes = page.total_bytes();
            let page_objects = page.entries.len() as u64;
            result.total_bytes += page_bytes;
            result.object_count += page_objects;
            if scope.collects_keys() {
                result
                    .object_keys
                    .extend(page.entries.into_iter().map(|entry| entry.key));
            }

            tracker.record_page(page_objects, page_bytes);
            // No subscribers is not an error.
            let _ = self.progress_tx.send(tracker.snapshot());

            if !page.is_truncated {
                break;
            }
            match page.next_continuation_token {
                Some(next) => token = Some(next),
                None => {
                    return Err(failed(StoreError::transport(
                        "Truncated page carried no continuation token",
                    )));
                }
            }
        }

        result.pages = tracker.pages_fetched();
        tracing::info!(
            bucket,
            prefix,
            total_bytes = result.total_bytes,
            objects = result.object_count,
            pages = result.pages,
            "scan complete"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_prefix() {
        assert_eq!(ScanScope::Bucket.prefix(), "");
        assert_eq!(ScanScope::Folder("docs/".into()).prefix(), "docs/");
        assert!(!ScanScope::Bucket.collects_keys());
        assert!(ScanScope::Folder(String::new()).collects_keys());
    }
}
