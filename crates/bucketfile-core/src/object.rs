//! Object listing data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::namespace;

/// A stored object as reported by a list call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Object key, unique within its bucket.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the store reports one.
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    /// Opaque version tag.
    #[serde(default)]
    pub etag: Option<String>,
}

impl ObjectEntry {
    /// Create an entry with only key and size.
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            etag: None,
        }
    }

    /// Set the last modification time.
    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Set the version tag.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }

    /// Check if this entry is a folder marker rather than file content.
    pub fn is_folder_marker(&self) -> bool {
        namespace::is_folder_marker(&self.key)
    }
}

/// Parameters of a single list call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Only keys starting with this prefix are returned.
    pub prefix: String,
    /// Roll keys up into common prefixes at this delimiter.
    pub delimiter: Option<char>,
    /// Page size cap (entries plus common prefixes).
    pub max_keys: usize,
    /// Token from the previous page, if continuing.
    pub continuation_token: Option<String>,
}

impl ListRequest {
    /// A delimited request listing one virtual folder.
    pub fn delimited(prefix: impl Into<String>, max_keys: usize) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some(crate::DELIMITER),
            max_keys,
            continuation_token: None,
        }
    }

    /// A flat request listing every key under a prefix.
    pub fn recursive(prefix: impl Into<String>, max_keys: usize) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
            max_keys,
            continuation_token: None,
        }
    }

    /// Continue from a previous page.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.continuation_token = token;
        self
    }
}

/// Result of one list call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Objects on this page.
    pub entries: Vec<ObjectEntry>,
    /// Common prefixes (virtual folders) on this page.
    pub common_prefixes: Vec<String>,
    /// Token for the next page.
    pub next_continuation_token: Option<String>,
    /// Whether more results remain.
    pub is_truncated: bool,
}

impl ListingPage {
    /// Sum of entry sizes on this page.
    pub fn total_bytes(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}

/// Filtered contents of one virtual folder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryListing {
    /// The folder these entries belong to.
    pub prefix: String,
    /// Displayable files (no folder markers).
    pub objects: Vec<ObjectEntry>,
    /// Direct child folders.
    pub prefixes: Vec<String>,
    /// Whether the store had more entries than one page.
    pub truncated: bool,
}

impl DirectoryListing {
    /// An empty listing for `prefix`.
    pub fn empty(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Default::default()
        }
    }

    /// Number of rows (files plus folders).
    pub fn len(&self) -> usize {
        self.objects.len() + self.prefixes.len()
    }

    /// Check if the folder shows no rows.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.prefixes.is_empty()
    }

    /// Keys of every row, files first.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.objects
            .iter()
            .map(|o| o.key.as_str())
            .chain(self.prefixes.iter().map(String::as_str))
    }
}

/// Whole-bucket or whole-subtree aggregate produced by a full scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateResult {
    /// Sum of all object sizes.
    pub total_bytes: u64,
    /// Number of objects seen.
    pub object_count: u64,
    /// Every key under the scanned folder (empty for bucket-wide scans).
    pub object_keys: Vec<String>,
    /// Number of list calls issued.
    pub pages: u32,
}
