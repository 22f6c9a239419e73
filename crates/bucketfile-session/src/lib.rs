//! Bucket session context for bucketfile.
//!
//! A [`Session`] holds everything one logged-in bucket view needs: the
//! store handle, the current folder and its listing, cached storage usage,
//! the selection, and the upload and delete coordinators. Every operation
//! takes the session explicitly; nothing is global.
//!
//! Failures never end a session. Each one is returned as an error and also
//! kept as a human-readable message in [`Session::last_error`] for display.

pub mod auth;
mod session;
pub mod view;

pub use auth::{Credentials, CredentialStore, LoginRequest, MemoryCredentialStore, StoredLogin};
pub use session::{Session, UsageState};
pub use view::{DirectoryRow, RowKind, SortDirection, SortKey, SortOrder};
