//! In-memory implementation of [`LockStore`] for testing.
//!
//! Mirrors the behavior of the production backend without network I/O,
//! including TTL expiry, so the deferred scheduling path can be exercised
//! deterministically in unit tests and simulations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::store::LockStore;

/// Sentinel for a key that exists but carries no TTL.
const PTTL_NO_TTL: i64 = -1;
/// Sentinel for a key that does not exist.
const PTTL_NO_KEY: i64 = -2;

#[derive(Debug, Clone)]
struct Record {
    value: String,
    deadline: Option<Instant>,
}

impl Record {
    fn expired(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }
}

/// In-memory deterministic implementation of [`LockStore`].
///
/// Values live in a `HashMap` behind an async mutex; expired records are
/// purged lazily on access, which is indistinguishable from store-side
/// eviction through this trait.
#[derive(Clone, Default)]
pub struct DeterministicLockStore {
    inner: Arc<Mutex<HashMap<String, Record>>>,
}

impl DeterministicLockStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn drop_expired(map: &mut HashMap<String, Record>, key: &str) {
        let now = Instant::now();
        if map.get(key).is_some_and(|record| record.expired(now)) {
            map.remove(key);
        }
    }
}

#[async_trait]
impl LockStore for DeterministicLockStore {
    async fn connect(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn quit(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::drop_expired(&mut inner, key);
        Ok(inner.contains_key(key))
    }

    async fn pttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::drop_expired(&mut inner, key);
        match inner.get(key) {
            None => Ok(PTTL_NO_KEY),
            Some(Record { deadline: None, .. }) => Ok(PTTL_NO_TTL),
            Some(Record {
                deadline: Some(deadline),
                ..
            }) => {
                // Round up to whole milliseconds so a timer scheduled from
                // this value fires at or after the deadline.
                let remaining = deadline.saturating_duration_since(Instant::now());
                Ok(remaining.as_nanos().div_ceil(1_000_000) as i64)
            }
        }
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_ms: Option<u64>,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::drop_expired(&mut inner, key);
        if inner.contains_key(key) {
            return Ok(false);
        }
        let deadline = ttl_ms.map(|ttl| Instant::now() + std::time::Duration::from_millis(ttl));
        inner.insert(
            key.to_string(),
            Record {
                value: value.to_string(),
                deadline,
            },
        );
        Ok(true)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        Self::drop_expired(&mut inner, key);
        match inner.get(key) {
            Some(record) if record.value == expected => {
                inner.remove(key);
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}
