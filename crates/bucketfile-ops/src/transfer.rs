//! Multi-file upload as one cancellable job.
//!
//! Files upload one after another. Each file larger than one part goes up as
//! a multipart upload with at most `queue_size` parts in flight. The job's
//! cancellation token is checked before every file and raced against the
//! file's in-flight requests, so cancelling stops promptly. Files that already
//! finished stay uploaded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::stream::{self, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use bucketfile_core::namespace::destination_key;
use bucketfile_core::{
    BucketError, BucketResult, CompletedPart, ObjectStore, SessionConfig, StoreResult,
};

use crate::OPERATION_CHANNEL_SIZE;
use crate::progress::ProgressAggregator;
use crate::source::UploadFile;

/// Lifecycle of the most recent upload job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
pub enum TransferState {
    #[default]
    Idle,
    Active,
    Completed,
    Cancelled,
    Failed,
}

/// How an upload job ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferOutcome {
    /// The job stopped early at the user's request, or was rejected
    /// because another job was active.
    pub cancelled: bool,
    /// Files fully uploaded.
    pub files_uploaded: usize,
    /// Bytes in fully uploaded files.
    pub bytes_uploaded: u64,
}

/// Message sent through the channel of a background upload.
#[derive(Debug)]
pub enum TransferEvent {
    /// Overall percentage, strictly increasing.
    Progress(u8),
    /// The job ended.
    Finished(BucketResult<TransferOutcome>),
}

enum FileOutcome {
    Done,
    Cancelled,
}

/// Clears the active flag however the job ends, including when its future
/// is dropped.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs at most one upload job at a time.
pub struct TransferController {
    store: Arc<dyn ObjectStore>,
    part_size: u64,
    queue_size: usize,
    active: AtomicBool,
    state: Mutex<TransferState>,
    cancel: Mutex<CancellationToken>,
}

impl TransferController {
    /// Create a controller with the given chunking policy.
    pub fn new(store: Arc<dyn ObjectStore>, part_size: u64, queue_size: usize) -> Self {
        Self {
            store,
            part_size: part_size.max(1),
            queue_size: queue_size.max(1),
            active: AtomicBool::new(false),
            state: Mutex::new(TransferState::Idle),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Create a controller from session settings.
    pub fn from_config(store: Arc<dyn ObjectStore>, config: &SessionConfig) -> Self {
        Self::new(store, config.part_size, config.queue_size)
    }

    /// State of the current or most recent job.
    pub fn state(&self) -> TransferState {
        *lock(&self.state)
    }

    /// Check if a job is in flight.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Ask the active job to stop. Does nothing when idle.
    pub fn cancel(&self) {
        if self.is_active() {
            tracing::info!("cancelling upload");
            lock(&self.cancel).cancel();
        }
    }

    /// Upload `files` under `destination_prefix`.
    ///
    /// A call made while another job is active is rejected with
    /// `cancelled: true` and issues no request. Cancellation also returns
    /// `Ok` with `cancelled: true`; only transfer errors return `Err`, after
    /// which the remaining files are abandoned.
    pub async fn upload<F>(
        &self,
        bucket: &str,
        destination_prefix: &str,
        files: Vec<UploadFile>,
        mut on_progress: F,
    ) -> BucketResult<TransferOutcome>
    where
        F: FnMut(u8) + Send,
    {
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(bucket, "upload rejected: another upload is active");
            return Ok(TransferOutcome {
                cancelled: true,
                ..Default::default()
            });
        }
        let _guard = ActiveGuard(&self.active);

        let token = CancellationToken::new();
        *lock(&self.cancel) = token.clone();
        *lock(&self.state) = TransferState::Active;

        let result = self
            .run(bucket, destination_prefix, &files, &token, &mut on_progress)
            .await;

        *lock(&self.state) = match &result {
            Ok(outcome) if outcome.cancelled => TransferState::Cancelled,
            Ok(_) => TransferState::Completed,
            Err(_) => TransferState::Failed,
        };
        result
    }

    async fn run<F>(
        &self,
        bucket: &str,
        destination_prefix: &str,
        files: &[UploadFile],
        token: &CancellationToken,
        on_progress: &mut F,
    ) -> BucketResult<TransferOutcome>
    where
        F: FnMut(u8) + Send,
    {
        let mut aggregator = ProgressAggregator::new(files.len());
        let mut outcome = TransferOutcome::default();

        for file in files {
            if token.is_cancelled() {
                outcome.cancelled = true;
                break;
            }

            let key = destination_key(destination_prefix, &file.relative_path);
            tracing::debug!(bucket, key = %key, size = file.size, "uploading file");

            let mut report = |fraction: f64| {
                if let Some(pct) = aggregator.update(fraction) {
                    on_progress(pct);
                }
            };
            let uploaded = self.upload_file(bucket, &key, file, token, &mut report).await;

            match uploaded {
                Ok(FileOutcome::Done) => {
                    outcome.files_uploaded += 1;
                    outcome.bytes_uploaded += file.size;
                    if let Some(pct) = aggregator.file_done() {
                        on_progress(pct);
                    }
                }
                Ok(FileOutcome::Cancelled) => {
                    outcome.cancelled = true;
                    break;
                }
                Err(source) => {
                    tracing::warn!(bucket, key = %key, error = %source, "upload failed");
                    return Err(BucketError::UploadFailed { key, source });
                }
            }
        }

        tracing::info!(
            bucket,
            files = outcome.files_uploaded,
            bytes = outcome.bytes_uploaded,
            cancelled = outcome.cancelled,
            "upload finished"
        );
        Ok(outcome)
    }

    async fn upload_file<R>(
        &self,
        bucket: &str,
        key: &str,
        file: &UploadFile,
        token: &CancellationToken,
        report: &mut R,
    ) -> StoreResult<FileOutcome>
    where
        R: FnMut(f64) + Send,
    {
        if file.size <= self.part_size {
            let body = file.body.read_range(0, file.size).await?;
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(FileOutcome::Cancelled),
                put = self.store.put_object(bucket, key, body) => put?,
            }
            report(1.0);
            return Ok(FileOutcome::Done);
        }

        let upload_id = self.store.create_multipart_upload(bucket, key).await?;
        let result = self
            .upload_parts(bucket, key, &upload_id, file, token, report)
            .await;

        match result {
            Ok(Some(parts)) => {
                let completed = self
                    .store
                    .complete_multipart_upload(bucket, key, &upload_id, parts)
                    .await;
                if let Err(e) = completed {
                    self.abort(bucket, key, &upload_id).await;
                    return Err(e);
                }
                Ok(FileOutcome::Done)
            }
            Ok(None) => {
                self.abort(bucket, key, &upload_id).await;
                Ok(FileOutcome::Cancelled)
            }
            Err(e) => {
                self.abort(bucket, key, &upload_id).await;
                Err(e)
            }
        }
    }

    /// Upload every part with a bounded window. `None` means cancelled.
    async fn upload_parts<R>(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        file: &UploadFile,
        token: &CancellationToken,
        report: &mut R,
    ) -> StoreResult<Option<Vec<CompletedPart>>>
    where
        R: FnMut(f64) + Send,
    {
        let part_size = self.part_size;
        let total = file.size;
        let part_count = total.div_ceil(part_size);
        let store = &self.store;

        let mut in_flight = stream::iter(1..=part_count)
            .map(|number| async move {
                let offset = (number - 1) * part_size;
                let len = part_size.min(total - offset);
                let body = file.body.read_range(offset, len).await?;
                let part = store
                    .upload_part(bucket, key, upload_id, number as u32, body)
                    .await?;
                Ok::<_, bucketfile_core::StoreError>((part, len))
            })
            .buffer_unordered(self.queue_size);

        let mut parts = Vec::with_capacity(part_count as usize);
        let mut sent = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(None),
                next = in_flight.next() => match next {
                    Some(Ok((part, len))) => {
                        sent += len;
                        report(sent as f64 / total as f64);
                        parts.push(part);
                    }
                    Some(Err(e)) => return Err(e),
                    None => break,
                },
            }
        }

        parts.sort_by_key(|p| p.part_number);
        Ok(Some(parts))
    }

    async fn abort(&self, bucket: &str, key: &str, upload_id: &str) {
        if let Err(e) = self.store.abort_multipart_upload(bucket, key, upload_id).await {
            tracing::warn!(bucket, key, upload_id, error = %e, "failed to abort multipart upload");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Start an upload on a background task.
///
/// The channel yields deduplicated progress followed by exactly one
/// [`TransferEvent::Finished`].
pub fn start_upload(
    controller: Arc<TransferController>,
    bucket: String,
    destination_prefix: String,
    files: Vec<UploadFile>,
) -> mpsc::Receiver<TransferEvent> {
    let (tx, rx) = mpsc::channel(OPERATION_CHANNEL_SIZE);

    tokio::spawn(async move {
        let progress_tx = tx.clone();
        let result = controller
            .upload(&bucket, &destination_prefix, files, move |pct| {
                // A full channel drops the update; the next one supersedes it.
                let _ = progress_tx.try_send(TransferEvent::Progress(pct));
            })
            .await;
        let _ = tx.send(TransferEvent::Finished(result)).await;
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(TransferState::Cancelled.to_string(), "Cancelled");
        assert_eq!(TransferState::default(), TransferState::Idle);
    }
}
