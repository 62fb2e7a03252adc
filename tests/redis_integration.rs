//! Integration tests against a live Redis.
//!
//! These tests require Redis running on localhost:6379 (or a custom URL
//! via env).
//!
//! To run Redis with Docker:
//! ```bash
//! docker run -d -p 6379:6379 redis:7
//! ```
//!
//! Configure the Redis URL (optional):
//! ```bash
//! export REDIS_URL=redis://myhost:6379
//! ```
//!
//! Run the tests with:
//! ```bash
//! cargo test --test redis_integration -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use distributed_lock::DEFAULT_KEY_PREFIX;
use distributed_lock::DistributedLock;
use distributed_lock::LockOptions;
use distributed_lock::RedisLockStore;
use distributed_lock::RedisStoreConfig;
use uuid::Uuid;

/// Get the Redis URL from the environment or default to localhost.
fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn coordinator() -> DistributedLock<RedisLockStore> {
    let store = RedisLockStore::new(RedisStoreConfig {
        url: redis_url(),
        ..RedisStoreConfig::default()
    })
    .expect("redis client");
    DistributedLock::new(Arc::new(store))
}

/// Unique scope per run so concurrent/aborted runs never collide.
fn unique_scope(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn lock_unlock_round_trip() {
    let coordinator = coordinator();
    let scope = unique_scope("roundtrip");

    assert!(!coordinator.is_locked(&scope).await.unwrap());

    let lock_id = coordinator
        .lock(&scope, LockOptions::with_ttl_ms(5_000))
        .await
        .unwrap()
        .expect("first acquisition succeeds");
    assert!(coordinator.is_locked(&scope).await.unwrap());

    assert!(coordinator.unlock(&scope, &lock_id).await.unwrap());
    assert!(!coordinator.is_locked(&scope).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn contention_and_ttl_expiry() {
    let coordinator = coordinator();
    let scope = unique_scope("contention");

    let holder = coordinator
        .lock(&scope, LockOptions::with_ttl_ms(300))
        .await
        .unwrap();
    assert!(holder.is_some());

    let declined = coordinator
        .lock(&scope, LockOptions::with_ttl_ms(300))
        .await
        .unwrap();
    assert!(declined.is_none());

    // Redis evicts the record once the TTL elapses
    tokio::time::sleep(Duration::from_millis(400)).await;
    let reacquired = coordinator
        .lock(&scope, LockOptions::with_ttl_ms(300))
        .await
        .unwrap();
    assert!(reacquired.is_some());
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn expiry_tracks_the_configured_ttl() {
    let coordinator = coordinator();
    let scope = unique_scope("expiry");

    assert_eq!(coordinator.expiry(&scope).await.unwrap(), 0);

    let lock_id = coordinator
        .lock(&scope, LockOptions::with_ttl_ms(2_000))
        .await
        .unwrap()
        .expect("acquisition succeeds");
    let remaining = coordinator.expiry(&scope).await.unwrap();
    assert!(remaining > 0);
    assert!(remaining <= 2_000);

    coordinator.unlock(&scope, &lock_id).await.unwrap();
    assert_eq!(coordinator.expiry(&scope).await.unwrap(), 0);
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn execute_defers_until_the_holder_expires() {
    let coordinator = coordinator();
    let scope = unique_scope("deferred");

    coordinator
        .lock(&scope, LockOptions::with_ttl_ms(400))
        .await
        .unwrap()
        .expect("holder acquisition succeeds");

    let started = Instant::now();
    let value = coordinator
        .execute(&scope, || async { 7 }, LockOptions::default())
        .await
        .unwrap();
    assert_eq!(value, 7);
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(!coordinator.is_locked(&scope).await.unwrap());
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn key_layout_matches_existing_deployments() {
    let coordinator = coordinator();
    let scope = unique_scope("interop");

    let lock_id = coordinator
        .lock(&scope, LockOptions::with_ttl_ms(5_000))
        .await
        .unwrap()
        .expect("acquisition succeeds");

    // The record must live at "<prefix><scope>:lock" and hold the raw id,
    // byte-identical to what existing deployments read and write.
    let client = redis::Client::open(redis_url()).unwrap();
    let mut conn = client.get_multiplexed_async_connection().await.unwrap();
    let stored: Option<String> = redis::cmd("GET")
        .arg(format!("{DEFAULT_KEY_PREFIX}{scope}:lock"))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(stored.as_deref(), Some(lock_id.as_str()));

    coordinator.unlock(&scope, &lock_id).await.unwrap();
}

#[tokio::test]
#[ignore = "requires a running Redis server"]
async fn connect_and_dispose_lifecycle() {
    let coordinator = coordinator();
    coordinator.connect().await.unwrap();
    coordinator.dispose().await.unwrap();
}
