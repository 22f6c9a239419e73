//! Object-store capability.
//!
//! [`ObjectStore`] is the only way bucketfile talks to a bucket. Any
//! S3-compatible client can sit behind it; bucketfile-store ships an
//! in-memory and a directory-backed implementation.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::StoreResult;
use crate::object::{ListRequest, ListingPage};

/// Type alias for boxed futures returned by store methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Receipt for one uploaded part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// Version tag of the part.
    pub etag: String,
}

/// Request/response operations of an S3-compatible store.
///
/// Implementations hold their own credentials and endpoint. A store handle
/// is shared immutably for the lifetime of a session.
pub trait ObjectStore: Send + Sync {
    /// Issue one list call.
    fn list_objects<'a>(
        &'a self,
        bucket: &'a str,
        request: &'a ListRequest,
    ) -> BoxFuture<'a, StoreResult<ListingPage>>;

    /// Fetch an object's full body.
    fn get_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> BoxFuture<'a, StoreResult<Bytes>>;

    /// Store an object in one request.
    fn put_object<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        body: Bytes,
    ) -> BoxFuture<'a, StoreResult<()>>;

    /// Delete an object. Deleting an absent key succeeds.
    fn delete_object<'a>(&'a self, bucket: &'a str, key: &'a str) -> BoxFuture<'a, StoreResult<()>>;

    /// Start a multipart upload and return its upload id.
    fn create_multipart_upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
    ) -> BoxFuture<'a, StoreResult<String>>;

    /// Upload one part of a multipart upload.
    fn upload_part<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
        part_number: u32,
        body: Bytes,
    ) -> BoxFuture<'a, StoreResult<CompletedPart>>;

    /// Assemble uploaded parts into the final object.
    fn complete_multipart_upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
        parts: Vec<CompletedPart>,
    ) -> BoxFuture<'a, StoreResult<()>>;

    /// Discard a multipart upload and its parts.
    fn abort_multipart_upload<'a>(
        &'a self,
        bucket: &'a str,
        key: &'a str,
        upload_id: &'a str,
    ) -> BoxFuture<'a, StoreResult<()>>;
}
