use std::sync::Arc;

use thiserror::Error;

use bedrock_core::{ConflictAware, DomainError, ExpectedVersion, VersionStamp, Versioned};

/// Record store operation error.
///
/// ## Error Categories
///
/// - **ConcurrentModification**: the conditional write lost against another writer
/// - **NonMonotonicVersion**: a write tried to move a record's stamp backwards
/// - **NotFound**: the record to update does not exist
/// - **Storage**: the backend itself failed
/// - **Domain**: the change was rejected, or no version stamp could be produced
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),

    #[error("non-monotonic version: current {current}, attempted {attempted}")]
    NonMonotonicVersion {
        current: VersionStamp,
        attempted: VersionStamp,
    },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl ConflictAware for StoreError {
    fn is_concurrent_modification(&self) -> bool {
        match self {
            StoreError::ConcurrentModification(_) => true,
            StoreError::Domain(err) => err.is_concurrent_modification(),
            _ => false,
        }
    }
}

/// Keyed store of versioned records with a conditional write.
///
/// The store is the only synchronisation point of the update protocol:
/// `commit` must compare the stored stamp against `expected` and write in one
/// atomic step (check-and-set), so that of two writers that read the same
/// version exactly one succeeds.
///
/// Implementations must:
/// - reject a write whose `expected` does not match with `ConcurrentModification`
/// - treat a missing record as `VersionStamp::ZERO`
/// - never let a record's stamp decrease
pub trait RecordStore<K, V>: Send + Sync {
    /// Load the current value and stamp, or `None` if the record does not exist.
    fn load(&self, key: &K) -> Result<Option<Versioned<V>>, StoreError>;

    /// Write `value` stamped with `version` if the stored stamp matches `expected`.
    fn commit(
        &self,
        key: &K,
        value: V,
        expected: ExpectedVersion,
        version: VersionStamp,
    ) -> Result<Versioned<V>, StoreError>;
}

impl<K, V, S> RecordStore<K, V> for Arc<S>
where
    S: RecordStore<K, V> + ?Sized,
{
    fn load(&self, key: &K) -> Result<Option<Versioned<V>>, StoreError> {
        (**self).load(key)
    }

    fn commit(
        &self,
        key: &K,
        value: V,
        expected: ExpectedVersion,
        version: VersionStamp,
    ) -> Result<Versioned<V>, StoreError> {
        (**self).commit(key, value, expected, version)
    }
}

impl<K, V, S> RecordStore<K, V> for &S
where
    S: RecordStore<K, V> + ?Sized,
{
    fn load(&self, key: &K) -> Result<Option<Versioned<V>>, StoreError> {
        (**self).load(key)
    }

    fn commit(
        &self,
        key: &K,
        value: V,
        expected: ExpectedVersion,
        version: VersionStamp,
    ) -> Result<Versioned<V>, StoreError> {
        (**self).commit(key, value, expected, version)
    }
}
