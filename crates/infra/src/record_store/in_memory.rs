use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

use bedrock_core::{ExpectedVersion, VersionStamp, Versioned};

use super::r#trait::{RecordStore, StoreError};

/// In-memory versioned record store.
///
/// Intended for tests/dev and for services whose shared state fits in one
/// process. The conditional write runs under the write lock.
#[derive(Debug)]
pub struct InMemoryRecordStore<K, V> {
    records: RwLock<HashMap<K, Versioned<V>>>,
}

impl<K, V> InMemoryRecordStore<K, V> {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryRecordStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RecordStore<K, V> for InMemoryRecordStore<K, V>
where
    K: Eq + Hash + Clone + core::fmt::Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn load(&self, key: &K) -> Result<Option<Versioned<V>>, StoreError> {
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;

        Ok(records.get(key).cloned())
    }

    fn commit(
        &self,
        key: &K,
        value: V,
        expected: ExpectedVersion,
        version: VersionStamp,
    ) -> Result<Versioned<V>, StoreError> {
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Storage("lock poisoned".to_string()))?;

        let current = records
            .get(key)
            .map(|r| r.version)
            .unwrap_or(VersionStamp::ZERO);

        if !expected.matches(current) {
            return Err(StoreError::ConcurrentModification(format!(
                "record {key:?}: expected {expected:?}, found {current}"
            )));
        }

        if version <= current {
            return Err(StoreError::NonMonotonicVersion {
                current,
                attempted: version,
            });
        }

        let committed = Versioned::new(value, version);
        records.insert(key.clone(), committed.clone());
        Ok(committed)
    }
}
