//! The key-value store collaborator contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

/// Key-value store client backing the lock coordinator.
///
/// Implementations translate these operations into single atomic
/// store-side commands. Cross-process exclusion rests entirely on that
/// atomicity: two processes racing [`set_if_absent`](LockStore::set_if_absent)
/// on the same key must never both see `true`, and
/// [`compare_and_delete`](LockStore::compare_and_delete) must never be
/// emulated with a client-side read followed by a delete.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Establish the connection to the store.
    ///
    /// Implementations connect lazily on first use; this forces the round
    /// trip up front so connectivity failures surface early.
    async fn connect(&self) -> Result<(), StoreError>;

    /// Release the connection to the store.
    async fn quit(&self) -> Result<(), StoreError>;

    /// Whether a value currently exists at `key`.
    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Remaining time to live at `key`, in milliseconds.
    ///
    /// Negative sentinels mean "key holds no TTL" or "key does not
    /// exist"; callers normalize them, implementations pass them through.
    async fn pttl(&self, key: &str) -> Result<i64, StoreError>;

    /// Atomically set `key` to `value` only if the key is absent,
    /// optionally attaching a TTL. Returns `true` iff the key was absent
    /// and is now set by this call.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_ms: Option<u64>,
    ) -> Result<bool, StoreError>;

    /// Atomically delete `key` only if its current value equals
    /// `expected`. Returns the number of keys deleted (1 or 0).
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<u64, StoreError>;
}

#[async_trait]
impl<T: LockStore + ?Sized> LockStore for Arc<T> {
    async fn connect(&self) -> Result<(), StoreError> {
        (**self).connect().await
    }

    async fn quit(&self) -> Result<(), StoreError> {
        (**self).quit().await
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        (**self).exists(key).await
    }

    async fn pttl(&self, key: &str) -> Result<i64, StoreError> {
        (**self).pttl(key).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_ms: Option<u64>,
    ) -> Result<bool, StoreError> {
        (**self).set_if_absent(key, value, ttl_ms).await
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<u64, StoreError> {
        (**self).compare_and_delete(key, expected).await
    }
}
