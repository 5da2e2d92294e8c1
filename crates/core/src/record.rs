//! Versioned records and optimistic-concurrency expectations.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::version::VersionStamp;

/// A record value together with the stamp of its last committed write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub value: T,
    pub version: VersionStamp,
}

impl<T> Versioned<T> {
    pub fn new(value: T, version: VersionStamp) -> Self {
        Self { value, version }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            value: f(self.value),
            version: self.version,
        }
    }
}

/// Optimistic concurrency expectation for a conditional write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (blind overwrite).
    Any,
    /// Require the stored record to carry exactly this stamp.
    ///
    /// `Exact(VersionStamp::ZERO)` requires that the record does not exist yet.
    Exact(VersionStamp),
}

impl ExpectedVersion {
    pub fn matches(self, actual: VersionStamp) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: VersionStamp) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}
