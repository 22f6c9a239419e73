//! Object-store backends for bucketfile.
//!
//! Two implementations of [`ObjectStore`](bucketfile_core::ObjectStore):
//!
//! - [`MemoryStore`] keeps buckets in process memory. It records every call
//!   and can inject failures, which makes it the synthetic store for tests.
//! - [`LocalStore`] maps buckets to directories under a root, so the CLI can
//!   browse a bucket laid out on disk.
//!
//! Both share the ListObjectsV2 paging rules in [`paginate`].

mod local;
mod memory;
mod paging;

pub use local::LocalStore;
pub use memory::{MemoryStore, StoreCall, StoreOp};
pub use paging::paginate;
