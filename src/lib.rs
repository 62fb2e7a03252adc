//! Distributed mutual exclusion over a shared key-value store.
//!
//! Serializes access to a named resource (a *scope*) across independent
//! processes in a microservices deployment:
//!
//! - `DistributedLock` — acquire/release with an atomic set-if-absent and
//!   an atomic server-side compare-and-delete, plus TTL introspection
//! - `execute` — run a callback exactly once inside the exclusive region,
//!   deferring and retrying once when the resource is currently held
//! - `RedisLockStore` — production Redis backend
//! - `DeterministicLockStore` — in-memory backend for tests and simulation
//!
//! Cross-process exclusion rests entirely on the store's atomic
//! primitives; this is not a consensus protocol and makes no safety claim
//! under store failover or network partitions. There is no queuing,
//! fairness, or reentrancy, and no background TTL renewal — a callback
//! that outlives its record's TTL risks losing exclusivity silently.
//!
//! ## Example
//!
//! ```ignore
//! use distributed_lock::{DistributedLock, LockOptions, RedisLockStore, RedisStoreConfig};
//! use std::sync::Arc;
//!
//! let store = Arc::new(RedisLockStore::new(RedisStoreConfig::default())?);
//! let coordinator = DistributedLock::new(store);
//! coordinator.connect().await?;
//!
//! // Run a job while holding the "billing" lock, with a 30s TTL
//! let report = coordinator
//!     .execute("billing", || async { run_billing_cycle().await }, LockOptions::with_ttl_ms(30_000))
//!     .await?;
//!
//! coordinator.dispose().await?;
//! ```
//!
//! The primitives are also usable directly:
//!
//! ```ignore
//! if let Some(lock_id) = coordinator.lock("reports", LockOptions::with_ttl_ms(5_000)).await? {
//!     // ... exclusive work ...
//!     coordinator.unlock("reports", &lock_id).await?;
//! }
//! ```

mod error;
mod lock;
mod memory;
mod redis;
mod store;
mod types;

pub use error::LockError;
pub use error::StoreError;
pub use lock::DistributedLock;
pub use memory::DeterministicLockStore;
pub use self::redis::DEFAULT_KEY_PREFIX;
pub use self::redis::RedisLockStore;
pub use self::redis::RedisStoreConfig;
pub use store::LockStore;
pub use types::LOCK_KEY_SUFFIX;
pub use types::LockId;
pub use types::LockOptions;
