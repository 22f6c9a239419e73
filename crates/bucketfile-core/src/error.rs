//! Error types for store calls and session operations.

use std::error::Error as _;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for raw store calls.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for session operations.
pub type BucketResult<T> = Result<T, BucketError>;

/// Failures reported by an object-store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Key does not exist.
    #[error("No such key: {key}")]
    NotFound { key: String },

    /// Bucket does not exist.
    #[error("No such bucket: {bucket}")]
    NoSuchBucket { bucket: String },

    /// Credentials lack permission.
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// The store rejected the request.
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Network or protocol failure.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Local I/O failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied {
                message: path.display().to_string(),
            },
            _ => Self::Io { path, source },
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Check if the key was absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// One item of a best-effort delete that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFailure {
    /// Key or folder prefix that could not be deleted.
    pub key: String,
    /// Human-readable reason.
    pub message: String,
}

impl DeleteFailure {
    /// Create a new delete failure.
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for DeleteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message)
    }
}

/// Failures surfaced by session operations.
///
/// None of these are fatal: the session stays usable and every retry is
/// user-initiated.
#[derive(Debug, Error)]
pub enum BucketError {
    /// A directory list call failed.
    #[error("Failed to list objects in bucket {bucket}")]
    ListingFailed {
        bucket: String,
        prefix: String,
        #[source]
        source: StoreError,
    },

    /// A full scan aborted before the last page.
    #[error("Failed to get storage usage for bucket {bucket}")]
    ScanFailed {
        bucket: String,
        #[source]
        source: StoreError,
    },

    /// A full scan was cancelled.
    #[error("Storage scan of bucket {bucket} was cancelled")]
    ScanCancelled { bucket: String },

    /// A file transfer errored.
    #[error("Failed to upload {key}")]
    UploadFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// A single delete failed.
    #[error("Failed to delete {key}")]
    DeleteFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Some objects under a folder could not be deleted.
    #[error("Failed to delete folder {prefix}: {failed} of {attempted} objects remain")]
    FolderDeleteFailed {
        prefix: String,
        failed: usize,
        attempted: usize,
    },

    /// One or more items of a bulk delete failed.
    #[error("Failed to delete selected items: {} of {attempted} failed", .failures.len())]
    BulkDeleteFailed {
        failures: Vec<DeleteFailure>,
        attempted: usize,
    },

    /// Writing a folder marker failed.
    #[error("Failed to create folder {name}")]
    CreateFolderFailed {
        name: String,
        #[source]
        source: StoreError,
    },

    /// Fetching or saving an object failed.
    #[error("Failed to download {key}")]
    DownloadFailed {
        key: String,
        #[source]
        source: StoreError,
    },

    /// A user-supplied name was rejected before any request.
    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Login input was rejected.
    #[error("Invalid credentials: {message}")]
    InvalidCredentials { message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl BucketError {
    /// Message including the underlying cause, suitable for a status line.
    pub fn detailed(&self) -> String {
        let mut message = self.to_string();
        let mut source = self.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }
}
