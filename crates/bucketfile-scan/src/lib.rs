//! Directory listing and bucket scanning for bucketfile.
//!
//! # Overview
//!
//! `bucketfile-scan` turns paged list calls into the two views a file
//! manager needs:
//!
//! - **[`ListingCursor`]** lists one virtual folder with a single delimited
//!   request and filters it through the namespace rules
//! - **[`AggregateScanner`]** follows continuation tokens across every page
//!   under a bucket or folder to total its size and collect its keys
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bucketfile_scan::{AggregateScanner, ScanScope};
//! use bucketfile_store::MemoryStore;
//!
//! # async fn run() -> bucketfile_core::BucketResult<()> {
//! let store = Arc::new(MemoryStore::with_bucket("photos"));
//! let scanner = AggregateScanner::new(store, 1000);
//! let usage = scanner.scan_all("photos", &ScanScope::Bucket).await?;
//!
//! println!("{} bytes in {} objects", usage.total_bytes, usage.object_count);
//! # Ok(())
//! # }
//! ```
//!
//! # Progress Monitoring
//!
//! Scans are O(bucket size). Subscribe to per-page progress to drive a
//! loading indicator:
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use bucketfile_scan::AggregateScanner;
//! # use bucketfile_store::MemoryStore;
//! # let scanner = AggregateScanner::new(Arc::new(MemoryStore::new()), 1000);
//! let mut progress_rx = scanner.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(progress) = progress_rx.recv().await {
//!         println!("{} objects after {} pages", progress.objects_seen, progress.pages_fetched);
//!     }
//! });
//! ```

mod aggregate;
mod listing;
mod progress;

pub use aggregate::{AggregateScanner, ScanScope};
pub use listing::{ListingCursor, partition_page};
pub use progress::ScanProgress;

// Re-export core types for convenience
pub use bucketfile_core::{AggregateResult, BucketError, BucketResult, DirectoryListing};
