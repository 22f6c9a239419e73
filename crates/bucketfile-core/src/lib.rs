//! Core types and traits for bucketfile.
//!
//! This crate provides the pieces every other bucketfile crate builds on:
//! the virtual-folder view over flat object keys, the listing data model,
//! the object-store capability trait, selection state, and configuration.

mod config;
mod error;
pub mod namespace;
mod object;
mod selection;
mod store;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::{BucketError, BucketResult, DeleteFailure, StoreError, StoreResult};
pub use object::{AggregateResult, DirectoryListing, ListRequest, ListingPage, ObjectEntry};
pub use selection::SelectionModel;
pub use store::{BoxFuture, CompletedPart, ObjectStore};

/// Separator used to derive folders from flat keys.
pub const DELIMITER: char = '/';
