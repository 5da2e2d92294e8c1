//! `bedrock-core`: consistency building blocks shared by every service.
//!
//! This crate contains **pure** primitives (no threads, no IO): version stamps,
//! optimistic-concurrency expectations and the error taxonomy the retry
//! protocol classifies.

pub mod error;
pub mod id;
pub mod record;
pub mod version;

pub use error::{ConflictAware, DomainError, DomainResult};
pub use id::RecordId;
pub use record::{ExpectedVersion, Versioned};
pub use version::VersionStamp;
