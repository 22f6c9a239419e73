//! Upload, delete, and download operations for bucketfile.
//!
//! Multi-step operations against an object store have no transaction to
//! fall back on, so each one here defines its own progress and
//! partial-failure semantics:
//!
//! - [`TransferController`] uploads a batch of files one at a time, in
//!   bounded multipart chunks, as a single cancellable job
//! - [`MutationCoordinator`] deletes objects, whole folders, and mixed
//!   selections best-effort with bounded parallelism, and creates folders
//!
//! Long-running operations also have `start_*` variants that run on a
//! spawned task and report through a channel.

mod download;
mod mutation;
mod progress;
mod source;
mod transfer;

pub use download::{download, download_to};
pub use mutation::{MutationCoordinator, start_bulk_delete, start_folder_delete};
pub use progress::{
    OperationComplete, OperationProgress, OperationResult, OperationType, ProgressAggregator,
};
pub use source::{SourceError, UploadBody, UploadFile, collect_upload_files};
pub use transfer::{
    TransferController, TransferEvent, TransferOutcome, TransferState, start_upload,
};

/// Default channel buffer size for operation progress updates.
pub const OPERATION_CHANNEL_SIZE: usize = 100;
