//! Durable storage for the once-only reward slot.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::record::{ActorName, RewardRecord};

/// Failures surfaced by reward store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("reward store unavailable: {0}")]
    Unavailable(String),
    #[error("reward store lock poisoned")]
    Poisoned,
    #[error("column {field} holds an unusable value {value}")]
    Corrupt { field: &'static str, value: String },
    #[cfg(feature = "sqlite")]
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Narrow read/upsert surface over the world's storage engine.
///
/// Implementations must be safe to share across worker threads; the award
/// machine serializes its own writes but other parts of the host may hold the
/// same store.
pub trait RewardStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create the backing storage and the default ungranted row for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage engine rejects the statement.
    fn ensure_schema(&self, key: &str) -> Result<(), Self::Error>;

    /// Current persisted state; a missing row reads as ungranted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage engine cannot be read.
    fn load(&self, key: &str) -> Result<RewardRecord, Self::Error>;

    /// Force the slot back to ungranted, clearing timestamp and actor.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn reset_to_ungranted(&self, key: &str) -> Result<(), Self::Error>;

    /// Mark the slot granted with the given metadata (last writer wins).
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn record_grant(
        &self,
        key: &str,
        actor: Option<&ActorName>,
        at_epoch_seconds: u64,
    ) -> Result<(), Self::Error>;

    /// Update collector metadata without touching the granted flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn record_collection_metadata(
        &self,
        key: &str,
        actor: &ActorName,
        at_epoch_seconds: u64,
    ) -> Result<(), Self::Error>;
}

impl<T> RewardStore for Arc<T>
where
    T: RewardStore + ?Sized,
{
    type Error = T::Error;

    fn ensure_schema(&self, key: &str) -> Result<(), Self::Error> {
        (**self).ensure_schema(key)
    }

    fn load(&self, key: &str) -> Result<RewardRecord, Self::Error> {
        (**self).load(key)
    }

    fn reset_to_ungranted(&self, key: &str) -> Result<(), Self::Error> {
        (**self).reset_to_ungranted(key)
    }

    fn record_grant(
        &self,
        key: &str,
        actor: Option<&ActorName>,
        at_epoch_seconds: u64,
    ) -> Result<(), Self::Error> {
        (**self).record_grant(key, actor, at_epoch_seconds)
    }

    fn record_collection_metadata(
        &self,
        key: &str,
        actor: &ActorName,
        at_epoch_seconds: u64,
    ) -> Result<(), Self::Error> {
        (**self).record_collection_metadata(key, actor, at_epoch_seconds)
    }
}

/// In-process store; clones share the same rows.
///
/// Building a second award machine over a clone models a server restart over
/// the same world storage. [`MemoryRewardStore::set_available`] simulates an
/// outage of the storage engine.
#[derive(Debug, Clone)]
pub struct MemoryRewardStore {
    rows: Arc<Mutex<HashMap<String, RewardRecord>>>,
    available: Arc<AtomicBool>,
}

impl Default for MemoryRewardStore {
    fn default() -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MemoryRewardStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle the simulated storage engine on or off.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Raw row for `key`, bypassing the missing-row default.
    #[must_use]
    pub fn row(&self, key: &str) -> Option<RewardRecord> {
        self.rows
            .lock()
            .ok()
            .and_then(|rows| rows.get(key).cloned())
    }

    fn with_rows<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, RewardRecord>) -> T,
    ) -> Result<T, StoreError> {
        if !self.is_available() {
            return Err(StoreError::Unavailable(String::from(
                "memory store switched off",
            )));
        }
        let mut rows = self.rows.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(f(&mut rows))
    }
}

impl RewardStore for MemoryRewardStore {
    type Error = StoreError;

    fn ensure_schema(&self, key: &str) -> Result<(), Self::Error> {
        self.with_rows(|rows| {
            rows.entry(key.to_string())
                .or_insert_with(|| RewardRecord::ungranted(key));
        })
    }

    fn load(&self, key: &str) -> Result<RewardRecord, Self::Error> {
        self.with_rows(|rows| {
            rows.get(key)
                .cloned()
                .unwrap_or_else(|| RewardRecord::ungranted(key))
        })
    }

    fn reset_to_ungranted(&self, key: &str) -> Result<(), Self::Error> {
        self.with_rows(|rows| {
            rows.entry(key.to_string())
                .or_insert_with(|| RewardRecord::ungranted(key))
                .clear();
        })
    }

    fn record_grant(
        &self,
        key: &str,
        actor: Option<&ActorName>,
        at_epoch_seconds: u64,
    ) -> Result<(), Self::Error> {
        self.with_rows(|rows| {
            rows.entry(key.to_string())
                .or_insert_with(|| RewardRecord::ungranted(key))
                .apply_grant(actor, at_epoch_seconds);
        })
    }

    fn record_collection_metadata(
        &self,
        key: &str,
        actor: &ActorName,
        at_epoch_seconds: u64,
    ) -> Result<(), Self::Error> {
        self.with_rows(|rows| {
            rows.entry(key.to_string())
                .or_insert_with(|| RewardRecord::ungranted(key))
                .apply_collection(actor, at_epoch_seconds);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "test_slot";

    #[test]
    fn missing_row_loads_as_ungranted() {
        let store = MemoryRewardStore::new();
        let record = store.load(KEY).unwrap();
        assert_eq!(record, RewardRecord::ungranted(KEY));
        assert!(store.row(KEY).is_none(), "load must not create rows");
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let store = MemoryRewardStore::new();
        store.ensure_schema(KEY).unwrap();
        store.record_grant(KEY, None, 10).unwrap();
        store.ensure_schema(KEY).unwrap();
        assert!(store.load(KEY).unwrap().granted);
    }

    #[test]
    fn grant_collection_and_reset_flow() {
        let store = MemoryRewardStore::new();
        store.ensure_schema(KEY).unwrap();

        let killer = ActorName::sanitize("Killer").unwrap();
        store.record_grant(KEY, Some(&killer), 100).unwrap();
        let looter = ActorName::sanitize("Looter").unwrap();
        store.record_collection_metadata(KEY, &looter, 200).unwrap();

        let record = store.load(KEY).unwrap();
        assert!(record.granted);
        assert_eq!(record.granted_at_epoch_seconds, 200);
        assert_eq!(record.last_actor, Some(looter));

        store.reset_to_ungranted(KEY).unwrap();
        assert_eq!(store.load(KEY).unwrap(), RewardRecord::ungranted(KEY));
    }

    #[test]
    fn repeated_grant_overwrites_metadata() {
        let store = MemoryRewardStore::new();
        store.ensure_schema(KEY).unwrap();
        let first = ActorName::sanitize("A").unwrap();
        let second = ActorName::sanitize("B").unwrap();
        store.record_grant(KEY, Some(&first), 10).unwrap();
        store.record_grant(KEY, Some(&second), 20).unwrap();

        let record = store.load(KEY).unwrap();
        assert!(record.granted);
        assert_eq!(record.granted_at_epoch_seconds, 20);
        assert_eq!(record.last_actor.as_ref().map(ActorName::as_str), Some("B"));
    }

    #[test]
    fn clones_share_rows_and_outages() {
        let store = MemoryRewardStore::new();
        let restarted = store.clone();
        store.record_grant(KEY, None, 5).unwrap();
        assert!(restarted.load(KEY).unwrap().granted);

        restarted.set_available(false);
        assert!(matches!(store.load(KEY), Err(StoreError::Unavailable(_))));
        assert!(store.record_grant(KEY, None, 6).is_err());
        store.set_available(true);
        assert_eq!(store.load(KEY).unwrap().granted_at_epoch_seconds, 5);
    }

    #[test]
    fn arc_store_delegates() {
        let shared: Arc<dyn RewardStore<Error = StoreError>> = Arc::new(MemoryRewardStore::new());
        shared.ensure_schema(KEY).unwrap();
        shared.record_grant(KEY, None, 9).unwrap();
        let again = Arc::clone(&shared);
        assert!(again.load(KEY).unwrap().granted);
    }
}
