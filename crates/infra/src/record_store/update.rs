//! Conflict-safe update of one stored record.

use std::marker::PhantomData;

use bedrock_core::{DomainError, ExpectedVersion, Versioned};

use crate::consistency::{CancelToken, Clock, RetryableUpdate, SystemClock, VersionClock};

use super::r#trait::{RecordStore, StoreError};

/// Binds a store, a key and a pure change into the operations the
/// [`ConflictRetryExecutor`](crate::consistency::ConflictRetryExecutor) drives.
///
/// - `fetch` loads the record (missing → [`StoreError::NotFound`])
/// - `apply_change` runs the change on the loaded value, keeping the read stamp
/// - `commit` asks the [`VersionClock`] for a stamp newer than the read one and
///   writes conditionally on the read stamp still being current
pub struct StoredRecordUpdate<S, K, V, F, C = SystemClock> {
    store: S,
    key: K,
    change: F,
    clock: VersionClock<C>,
    cancel: Option<CancelToken>,
    _value: PhantomData<fn() -> V>,
}

impl<S, K, V, F> StoredRecordUpdate<S, K, V, F, SystemClock>
where
    S: RecordStore<K, V>,
    F: Fn(V) -> Result<V, DomainError>,
{
    pub fn new(store: S, key: K, change: F) -> Self {
        Self {
            store,
            key,
            change,
            clock: VersionClock::new(),
            cancel: None,
            _value: PhantomData,
        }
    }
}

impl<S, K, V, F, C> StoredRecordUpdate<S, K, V, F, C>
where
    S: RecordStore<K, V>,
    F: Fn(V) -> Result<V, DomainError>,
    C: Clock,
{
    /// Stamp commits with `clock` instead of the system clock.
    pub fn with_clock<C2: Clock>(self, clock: VersionClock<C2>) -> StoredRecordUpdate<S, K, V, F, C2> {
        StoredRecordUpdate {
            store: self.store,
            key: self.key,
            change: self.change,
            clock,
            cancel: self.cancel,
            _value: PhantomData,
        }
    }

    /// Make the version clock's wait interruptible.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<S, K, V, F, C> RetryableUpdate for StoredRecordUpdate<S, K, V, F, C>
where
    S: RecordStore<K, V>,
    K: core::fmt::Debug,
    F: Fn(V) -> Result<V, DomainError>,
    C: Clock,
{
    type Record = Versioned<V>;
    type Error = StoreError;

    fn fetch(&mut self) -> Result<Versioned<V>, StoreError> {
        self.store
            .load(&self.key)?
            .ok_or_else(|| StoreError::NotFound(format!("{:?}", self.key)))
    }

    fn apply_change(&self, current: Versioned<V>) -> Result<Versioned<V>, StoreError> {
        let version = current.version;
        let value = (self.change)(current.value)?;
        Ok(Versioned::new(value, version))
    }

    fn commit(&mut self, updated: Versioned<V>) -> Result<Versioned<V>, StoreError> {
        let read_version = updated.version;
        let stamp = match &self.cancel {
            Some(cancel) => self.clock.next_cancellable(read_version, cancel)?,
            None => self.clock.next(read_version)?,
        };

        self.store.commit(
            &self.key,
            updated.value,
            ExpectedVersion::Exact(read_version),
            stamp,
        )
    }
}
