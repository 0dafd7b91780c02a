//! Process-local state store backed by `DashMap`.
//!
//! Every mutation goes through `DashMap::entry`, which holds the shard lock
//! for the duration of the read-modify-write, so `increment` and the
//! initialize-once numeric write are atomic. No guard is ever held across
//! an `.await`.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use waypoint_types::error::RepositoryError;
use waypoint_types::state::{StateRecord, now_millis};

use super::state_store::StateStore;

/// In-memory `StateStore`. Cloning shares the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<DashMap<String, StateRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Snapshot of all stored keys, expired ones included.
    pub fn keys(&self) -> Vec<String> {
        self.inner.iter().map(|r| r.key().clone()).collect()
    }

    /// Drop every record expired at `now_ms`. Returns how many were removed.
    pub fn purge_expired(&self, now_ms: i64) -> u64 {
        let mut removed = 0u64;
        self.inner.retain(|_, record| {
            let expired = record.is_expired_at(now_ms);
            if expired {
                removed += 1;
            }
            !expired
        });
        removed
    }

    /// Get the live record in an entry, resetting it first when expired.
    fn live<'a>(
        entry: Entry<'a, String, StateRecord>,
        key: &str,
        now_ms: i64,
    ) -> dashmap::mapref::one::RefMut<'a, String, StateRecord> {
        let fresh = || StateRecord {
            key: key.to_string(),
            string_value: None,
            numeric_value: None,
            expire_at: None,
            updated_at: Utc::now(),
        };
        match entry {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired_at(now_ms) {
                    occupied.insert(fresh());
                }
                occupied.into_ref()
            }
            Entry::Vacant(vacant) => vacant.insert(fresh()),
        }
    }
}

impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<StateRecord>, RepositoryError> {
        let now = now_millis();
        Ok(self
            .inner
            .get(key)
            .filter(|r| !r.is_expired_at(now))
            .map(|r| r.value().clone()))
    }

    async fn put_string(
        &self,
        key: &str,
        value: &str,
        expire_at: Option<i64>,
    ) -> Result<(), RepositoryError> {
        let mut record = Self::live(self.inner.entry(key.to_string()), key, now_millis());
        record.string_value = Some(value.to_string());
        record.expire_at = expire_at;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn put_number(
        &self,
        key: &str,
        value: f64,
        expire_at: Option<i64>,
        overwrite: bool,
    ) -> Result<bool, RepositoryError> {
        let mut record = Self::live(self.inner.entry(key.to_string()), key, now_millis());
        if !overwrite && record.numeric_value.is_some() {
            return Ok(false);
        }
        record.numeric_value = Some(value);
        record.expire_at = expire_at;
        record.updated_at = Utc::now();
        Ok(true)
    }

    async fn increment(&self, key: &str, by: f64) -> Result<f64, RepositoryError> {
        let mut record = Self::live(self.inner.entry(key.to_string()), key, now_millis());
        let next = record.numeric_value.unwrap_or(0.0) + by;
        record.numeric_value = Some(next);
        record.updated_at = Utc::now();
        Ok(next)
    }

    async fn set_expiry(&self, key: &str, expire_at: i64) -> Result<(), RepositoryError> {
        let now = now_millis();
        if let Some(mut record) = self.inner.get_mut(key) {
            if !record.is_expired_at(now) {
                record.expire_at = Some(expire_at);
                record.updated_at = Utc::now();
            }
        }
        Ok(())
    }
}
