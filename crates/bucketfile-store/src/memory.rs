//! In-memory object store with call journal and failure injection.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use chrono::Utc;
use dashmap::DashMap;

use bucketfile_core::{
    BoxFuture, CompletedPart, ListRequest, ListingPage, ObjectEntry, ObjectStore, StoreError,
    StoreResult,
};

use crate::paging::paginate;

/// Kind of store call, used by the journal and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum StoreOp {
    List,
    Get,
    Put,
    Delete,
    CreateMultipart,
    UploadPart,
    CompleteMultipart,
    AbortMultipart,
}

/// One recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    /// Operation kind.
    pub op: StoreOp,
    /// Target bucket.
    pub bucket: String,
    /// Key, or the prefix for list calls.
    pub key: String,
    /// Continuation token for list calls.
    pub token: Option<String>,
}

#[derive(Debug)]
enum Fault {
    /// Every call of `op` on `key` fails.
    Key { op: StoreOp, key: String },
    /// The `nth` call (1-based) of `op` fails.
    Nth { op: StoreOp, nth: usize },
}

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<u32, Bytes>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    entry: ObjectEntry,
    body: Bytes,
}

type Bucket = BTreeMap<String, StoredObject>;

/// Object store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: DashMap<String, Bucket>,
    uploads: DashMap<String, PendingUpload>,
    next_upload: AtomicU64,
    journal: Mutex<Vec<StoreCall>>,
    faults: Mutex<Vec<Fault>>,
    page_size: Option<usize>,
    latency: Option<Duration>,
}

impl MemoryStore {
    /// Create an empty store with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding one empty bucket.
    pub fn with_bucket(bucket: &str) -> Self {
        let store = Self::new();
        store.create_bucket(bucket);
        store
    }

    /// Cap every list page at `page_size` results regardless of the request.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Delay every call by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Create an empty bucket if it does not exist.
    pub fn create_bucket(&self, bucket: &str) {
        self.buckets.entry(bucket.to_string()).or_default();
    }

    /// Store an object directly, bypassing the journal.
    pub fn insert(&self, bucket: &str, key: &str, body: impl Into<Bytes>) {
        let body = body.into();
        let object = stored(key, body);
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), object);
    }

    /// Every key in a bucket, sorted.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Body of an object, if present.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets
            .get(bucket)
            .and_then(|b| b.get(key).map(|o| o.body.clone()))
    }

    /// Check if an object exists.
    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .get(bucket)
            .is_some_and(|b| b.contains_key(key))
    }

    /// Number of multipart uploads started but neither completed nor aborted.
    pub fn pending_uploads(&self) -> usize {
        self.uploads.len()
    }

    /// Make every `op` call on `key` fail with a transport error.
    pub fn fail_key(&self, op: StoreOp, key: impl Into<String>) {
        self.lock_faults().push(Fault::Key {
            op,
            key: key.into(),
        });
    }

    /// Make the `nth` call (1-based) of `op` fail with a transport error.
    pub fn fail_call(&self, op: StoreOp, nth: usize) {
        self.lock_faults().push(Fault::Nth { op, nth });
    }

    /// Copy of the call journal.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock_journal().clone()
    }

    /// Recorded calls of one kind.
    pub fn calls_of(&self, op: StoreOp) -> Vec<StoreCall> {
        self.lock_journal()
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }

    /// Number of recorded calls of one kind.
    pub fn count(&self, op: StoreOp) -> usize {
        self.lock_journal().iter().filter(|c| c.op == op).count()
    }

    /// Forget recorded calls.
    pub fn clear_journal(&self) {
        self.lock_journal().clear();
    }

    fn lock_journal(&self) -> std::sync::MutexGuard<'_, Vec<StoreCall>> {
        self.journal.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Vec<Fault>> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a call and decide whether it should fail.
    async fn enter(
        &self,
        op: StoreOp,
        bucket: &str,
        key: &str,
        token: Option<&str>,
    ) -> StoreResult<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let nth = {
            let mut journal = self.lock_journal();
            journal.push(StoreCall {
                op,
                bucket: bucket.to_string(),
                key: key.to_string(),
                token: token.map(str::to_string),
            });
            journal.iter().filter(|c| c.op == op).count()
        };

        let injected = self.lock_faults().iter().any(|fault| match fault {
            Fault::Key { op: o, key: k } => *o == op && k == key,
            Fault::Nth { op: o, nth: n } => *o == op && *n == nth,
        });
        if injected {
            tracing::debug!(%op, bucket, key, "injected store failure");
            return Err(StoreError::transport(format!("injected failure: {op} {key}")));
        }

        if !self.buckets.contains_key(bucket) {
            return Err(StoreError::NoSuchBucket {
                bucket: bucket.to_string(),
            });
        }
        Ok(())
    }

    fn take_upload(&self, upload_id: &str) -> StoreResult<PendingUpload> {
        self.uploads
            .remove(upload_id)
            .map(|(_, upload)| upload)
            .ok_or_else(|| StoreError::InvalidRequest {
                message: format!("No such upload: {upload_id}"),
            })
    }
}

fn stored(key: &str, body: Bytes) -> StoredObject {
    let etag = blake3::hash(&body).to_hex().to_string();
    StoredObject {
        entry: ObjectEntry::new(key, body.len() as u64)
            .with_last_modified(Utc::now())
            .with_etag(etag),
        body,
    }
}

impl ObjectStore for MemoryStore {
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        request: &'a ListRequest,
    ) -> BoxFuture<'a, StoreResult<ListingPage>> {
        Box::pin(async move {
            self.enter(
                StoreOp::List,
                bucket,
                &request.prefix,
                request.continuation_token.as_deref(),
            )
            .await?;

            let mut request = request.clone();
            if let Some(page_size) = self.page_size {
                request.max_keys = request.max_keys.min(page_size);
            }

            let objects = self.buckets.get(bucket).ok_or_else(|| StoreError::NoSuchBucket {
                bucket: bucket.to_string(),
            })?;
            Ok(paginate(objects.values().map(|o| &o.entry), &request))
        })
    }

    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> BoxFuture<'a, StoreResult<Bytes>> {
        Box::pin(async move {
            self.enter(StoreOp::Get, bucket, key, None).await?;
            self.object(bucket, key).ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })
        })
    }

    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.enter(StoreOp::Put, bucket, key, None).await?;
            self.insert(bucket, key, body);
            Ok(())
        })
    }

    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.enter(StoreOp::Delete, bucket, key, None).await?;
            if let Some(mut objects) = self.buckets.get_mut(bucket) {
                objects.remove(key);
            }
            Ok(())
        })
    }

    fn create_multipart_upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, StoreResult<String>> {
        Box::pin(async move {
            self.enter(StoreOp::CreateMultipart, bucket, key, None).await?;
            let id = format!("upload-{}", self.next_upload.fetch_add(1, Ordering::Relaxed));
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
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
        part_number: u32,
        body: Bytes,
    ) -> BoxFuture<'a, StoreResult<CompletedPart>> {
        Box::pin(async move {
            self.enter(StoreOp::UploadPart, bucket, key, None).await?;
            let etag = blake3::hash(&body).to_hex().to_string();
            let mut upload =
                self.uploads
                    .get_mut(upload_id)
                    .ok_or_else(|| StoreError::InvalidRequest {
                        message: format!("No such upload: {upload_id}"),
                    })?;
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
            self.enter(StoreOp::CompleteMultipart, bucket, key, None).await?;
            let upload = self.take_upload(upload_id)?;
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

            self.insert(bucket, key, body.freeze());
            Ok(())
        })
    }

    fn abort_multipart_upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<()>> {
        Box::pin(async move {
            self.enter(StoreOp::AbortMultipart, bucket, key, None).await?;
            self.uploads.remove(upload_id);
            Ok(())
        })
    }
}
