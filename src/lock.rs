//! The lock coordinator and its deferred executor.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use snafu::ResultExt;
use snafu::ensure;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use crate::error::AcquisitionSnafu;
use crate::error::CancelledSnafu;
use crate::error::HeldSnafu;
use crate::error::LockError;
use crate::error::ReleaseSnafu;
use crate::error::SchedulingSnafu;
use crate::error::StoreError;
use crate::error::StoreSnafu;
use crate::store::LockStore;
use crate::types::LockId;
use crate::types::LockOptions;
use crate::types::lock_key;

/// A deferred retry waiting for the current holder's TTL to elapse.
struct DeferredTask {
    scope: String,
    handle: JoinHandle<()>,
}

/// Distributed mutual exclusion over a shared key-value store.
///
/// Serializes access to a named resource (a scope) across independent
/// processes. The store is the sole source of truth for who holds a
/// scope; the coordinator keeps no lock state of its own apart from the
/// single deferred-retry timer slot used by [`execute`](Self::execute).
///
/// Clones share the store connection and the timer slot, so a clone is
/// the same coordinator instance for scheduling purposes.
pub struct DistributedLock<S: LockStore + ?Sized> {
    store: Arc<S>,
    deferred: Arc<Mutex<Option<DeferredTask>>>,
}

impl<S: LockStore + ?Sized> Clone for DistributedLock<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            deferred: Arc::clone(&self.deferred),
        }
    }
}

impl<S: LockStore + ?Sized + 'static> DistributedLock<S> {
    /// Create a coordinator over the given store client.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            deferred: Arc::new(Mutex::new(None)),
        }
    }

    /// Establish the store connection up front.
    ///
    /// The store connects lazily on first command; call this to surface
    /// connectivity failures early.
    pub async fn connect(&self) -> Result<(), StoreError> {
        self.store.connect().await
    }

    /// Cancel any pending deferred execution and release the store
    /// connection.
    ///
    /// A deferred run still waiting on its timer is cancelled
    /// deterministically and its caller resolves with
    /// [`LockError::Cancelled`]. A run whose timer has already fired is
    /// past cancellation and runs to completion.
    pub async fn dispose(&self) -> Result<(), StoreError> {
        let pending = self.deferred.lock().unwrap().take();
        if let Some(task) = pending {
            debug!(scope = %task.scope, "cancelling pending deferred execution");
            task.handle.abort();
        }
        self.store.quit().await
    }

    /// Whether a lock record currently exists for the scope.
    ///
    /// Side-effect free; never reports `false` on a store failure.
    pub async fn is_locked(&self, scope: &str) -> Result<bool, LockError> {
        self.store
            .exists(&lock_key(scope))
            .await
            .context(StoreSnafu { scope })
    }

    /// Remaining TTL of the scope's lock record, in milliseconds.
    ///
    /// Returns 0 when the scope is unlocked or its record carries no TTL;
    /// never negative.
    pub async fn expiry(&self, scope: &str) -> Result<u64, LockError> {
        let pttl = self
            .store
            .pttl(&lock_key(scope))
            .await
            .context(StoreSnafu { scope })?;
        Ok(u64::try_from(pttl).unwrap_or(0))
    }

    /// Attempt to acquire the scope's lock with a single atomic
    /// set-if-absent.
    ///
    /// Returns the freshly minted [`LockId`] iff the store confirms the
    /// key was unset and is now set by this call; `None` when another
    /// holder already owns the key. The store's answer is the sole source
    /// of truth — there is no false success.
    pub async fn lock(
        &self,
        scope: &str,
        options: LockOptions,
    ) -> Result<Option<LockId>, LockError> {
        let key = lock_key(scope);
        let lock_id = LockId::mint();
        let ttl_ms = options.effective_ttl_ms();
        let acquired = self
            .store
            .set_if_absent(&key, lock_id.as_str(), ttl_ms)
            .await
            .context(AcquisitionSnafu { scope })?;
        if acquired {
            debug!(scope, key = %key, ttl_ms, "lock acquired");
            Ok(Some(lock_id))
        } else {
            debug!(scope, key = %key, "lock declined: already held");
            Ok(None)
        }
    }

    /// Release the scope's lock if `lock_id` still owns it.
    ///
    /// The compare-and-delete is evaluated atomically store-side, so a
    /// caller whose TTL already expired cannot delete a record now owned
    /// by someone else. Returns `true` iff a record was actually deleted;
    /// `false` on ownership mismatch or when the record was already gone.
    pub async fn unlock(&self, scope: &str, lock_id: &LockId) -> Result<bool, LockError> {
        let key = lock_key(scope);
        let deleted = self
            .store
            .compare_and_delete(&key, lock_id.as_str())
            .await
            .context(ReleaseSnafu { scope })?;
        if deleted > 0 {
            debug!(scope, key = %key, "lock released");
            Ok(true)
        } else {
            warn!(scope, key = %key, "lock release declined: ownership mismatch or record gone");
            Ok(false)
        }
    }

    /// Run `callback` exactly once while holding the scope's lock.
    ///
    /// When the scope reads as free (remaining TTL 0) the
    /// acquire-call-release sequence runs immediately, failing fast with
    /// [`LockError::Held`] if acquisition is declined. When the current
    /// holder's TTL is still counting down, one retry is scheduled for
    /// the moment it elapses; a second call while that timer is pending
    /// is rejected with [`LockError::Scheduling`] rather than queued.
    ///
    /// A holder without TTL reads as 0 here too, so contention against it
    /// is not deferred — the immediate attempt simply fails with `Held`.
    ///
    /// The callback's output propagates once release completes; a
    /// release-side store failure supersedes it with
    /// [`LockError::Release`].
    pub async fn execute<F, Fut, T>(
        &self,
        scope: &str,
        callback: F,
        options: LockOptions,
    ) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send,
        T: Send + 'static,
    {
        let remaining_ms = self.expiry(scope).await?;

        if remaining_ms == 0 {
            return self.run_exclusive(scope, callback, options).await;
        }

        let (result_tx, result_rx) = oneshot::channel();
        {
            let mut slot = self.deferred.lock().unwrap();
            ensure!(
                slot.is_none(),
                SchedulingSnafu {
                    scope,
                    task: std::any::type_name::<F>(),
                }
            );

            let coordinator = self.clone();
            let task_scope = scope.to_string();
            debug!(scope, delay_ms = remaining_ms, "deferring execution until the current lock expires");
            let handle = tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(remaining_ms)).await;
                // Free the slot before running so a fired timer never
                // blocks the next execute call.
                coordinator.deferred.lock().unwrap().take();
                let result = coordinator
                    .run_exclusive(&task_scope, callback, options)
                    .await;
                let _ = result_tx.send(result);
            });
            *slot = Some(DeferredTask {
                scope: scope.to_string(),
                handle,
            });
        }

        match result_rx.await {
            Ok(result) => result,
            Err(_) => CancelledSnafu { scope }.fail(),
        }
    }

    /// The acquire-call-release sequence shared by the immediate and
    /// deferred paths.
    async fn run_exclusive<F, Fut, T>(
        &self,
        scope: &str,
        callback: F,
        options: LockOptions,
    ) -> Result<T, LockError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let Some(lock_id) = self.lock(scope, options).await? else {
            return HeldSnafu { scope }.fail();
        };
        let result = callback().await;
        self.unlock(scope, &lock_id).await?;
        Ok(result)
    }
}
