//! Domain error model.

use thiserror::Error;

use crate::version::VersionStamp;

/// Result type used across the consistency primitives.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic failures of the consistency protocol
/// (validation, conflicts, clock integrity). Transport and storage concerns
/// belong to the layers that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested record was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A single commit attempt lost a race against another writer.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    /// A prior version stamp is implausibly far ahead of the wall clock.
    #[error("clock skew: previous version {previous} is ahead of current time {now}")]
    ClockSkew {
        previous: VersionStamp,
        now: VersionStamp,
    },

    /// A blocking wait was cancelled before it completed.
    #[error("interrupted while waiting")]
    Interrupted,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::ConcurrentModification(msg.into())
    }
}

/// Classifies errors that signal a lost optimistic-concurrency race.
///
/// The conflict retry loop only retries errors for which this returns `true`;
/// everything else propagates on first occurrence.
pub trait ConflictAware {
    fn is_concurrent_modification(&self) -> bool;
}

impl ConflictAware for DomainError {
    fn is_concurrent_modification(&self) -> bool {
        matches!(self, DomainError::ConcurrentModification(_))
    }
}
