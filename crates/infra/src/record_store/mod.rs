//! Versioned record storage.
//!
//! Each record carries the [`VersionStamp`](bedrock_core::VersionStamp) of
//! its last committed write. A write names the stamp it expects to replace and
//! is rejected as a concurrent modification when another writer got there
//! first; [`StoredRecordUpdate`] pairs this with the
//! [`ConflictRetryExecutor`](crate::consistency::ConflictRetryExecutor) and the
//! [`VersionClock`](crate::consistency::VersionClock).

pub mod in_memory;
pub mod r#trait;
pub mod update;

pub use in_memory::InMemoryRecordStore;
pub use r#trait::{RecordStore, StoreError};
pub use update::StoredRecordUpdate;
