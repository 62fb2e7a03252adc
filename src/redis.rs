//! Redis-backed implementation of [`LockStore`].
//!
//! Maps the collaborator contract onto single atomic Redis commands:
//! `SET key value [PX ttl] NX` for acquisition, `EXISTS`/`PTTL` for
//! introspection, and a server-side Lua script for compare-and-delete so
//! release parity is evaluated inside Redis rather than client-side.

use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use redis::aio::ConnectionManagerConfig;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::CommandSnafu;
use crate::error::ConnectionSnafu;
use crate::error::StoreError;
use crate::store::LockStore;

/// Key prefix shared with existing deployments of the protocol.
pub const DEFAULT_KEY_PREFIX: &str = "<distributed-lock>";

/// Deletes the key only if the value it holds matches expectation.
/// Evaluated as one atomic script (EVALSHA with automatic load).
const RELEASE_SCRIPT: &str = r#"
if redis.call("get", KEYS[1]) == ARGV[1] then
    return redis.call("del", KEYS[1])
else
    return 0
end
"#;

/// Configuration for [`RedisLockStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`).
    pub url: String,
    /// Prefix applied store-side to every key this client touches.
    pub key_prefix: Option<String>,
    /// Timeout for establishing the connection, in milliseconds.
    pub connection_timeout_ms: u64,
    /// Per-command response timeout, in milliseconds. Absent means no
    /// client-side command timeout.
    pub response_timeout_ms: Option<u64>,
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: Some(DEFAULT_KEY_PREFIX.to_string()),
            connection_timeout_ms: 10_000,
            response_timeout_ms: None,
        }
    }
}

/// Redis client for the lock coordinator.
///
/// Connects lazily: the first command (or an explicit
/// [`connect`](LockStore::connect)) establishes a multiplexed connection
/// that is shared by all subsequent commands. Commands are not queued or
/// retried while the connection is down; failures surface immediately.
pub struct RedisLockStore {
    client: redis::Client,
    conn: Mutex<Option<ConnectionManager>>,
    key_prefix: Option<String>,
    release_script: Script,
    connection_timeout: Duration,
    response_timeout: Option<Duration>,
}

impl RedisLockStore {
    /// Build a store client from configuration.
    ///
    /// No connection is made until the first command.
    pub fn new(config: RedisStoreConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|err| ConnectionSnafu { reason: err.to_string() }.build())?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            key_prefix: config.key_prefix,
            release_script: Script::new(RELEASE_SCRIPT),
            connection_timeout: Duration::from_millis(config.connection_timeout_ms),
            response_timeout: config.response_timeout_ms.map(Duration::from_millis),
        })
    }

    fn prefixed(&self, key: &str) -> String {
        match &self.key_prefix {
            Some(prefix) => format!("{prefix}{key}"),
            None => key.to_string(),
        }
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let mut slot = self.conn.lock().await;
        if let Some(manager) = slot.as_ref() {
            return Ok(manager.clone());
        }

        // Fail fast instead of queueing commands while disconnected.
        let mut manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(self.connection_timeout)
            .set_number_of_retries(0);
        if let Some(timeout) = self.response_timeout {
            manager_config = manager_config.set_response_timeout(timeout);
        }

        let manager = ConnectionManager::new_with_config(self.client.clone(), manager_config)
            .await
            .map_err(|err| ConnectionSnafu { reason: err.to_string() }.build())?;
        *slot = Some(manager.clone());
        Ok(manager)
    }
}

fn command_error(command: &str, err: redis::RedisError) -> StoreError {
    CommandSnafu {
        command,
        reason: err.to_string(),
    }
    .build()
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn connect(&self) -> Result<(), StoreError> {
        self.connection().await.map(drop)
    }

    async fn quit(&self) -> Result<(), StoreError> {
        // Dropping the manager tears down the multiplexed connection.
        self.conn.lock().await.take();
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let found: i64 = redis::cmd("EXISTS")
            .arg(self.prefixed(key))
            .query_async(&mut conn)
            .await
            .map_err(|err| command_error("EXISTS", err))?;
        Ok(found > 0)
    }

    async fn pttl(&self, key: &str) -> Result<i64, StoreError> {
        let mut conn = self.connection().await?;
        redis::cmd("PTTL")
            .arg(self.prefixed(key))
            .query_async(&mut conn)
            .await
            .map_err(|err| command_error("PTTL", err))
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl_ms: Option<u64>,
    ) -> Result<bool, StoreError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.prefixed(key)).arg(value);
        if let Some(ttl) = ttl_ms {
            cmd.arg("PX").arg(ttl);
        }
        cmd.arg("NX");
        // NX replies OK on success and nil when the key pre-existed.
        let reply: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|err| command_error("SET", err))?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<u64, StoreError> {
        let mut conn = self.connection().await?;
        let deleted: i64 = self
            .release_script
            .key(self.prefixed(key))
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(|err| command_error("EVALSHA", err))?;
        Ok(u64::try_from(deleted).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_deployed_clients() {
        let config = RedisStoreConfig::default();
        assert_eq!(config.key_prefix.as_deref(), Some(DEFAULT_KEY_PREFIX));
        assert_eq!(config.response_timeout_ms, None);
    }

    #[test]
    fn prefix_is_prepended_verbatim() {
        let store = RedisLockStore::new(RedisStoreConfig::default()).unwrap();
        assert_eq!(store.prefixed("app:lock"), "<distributed-lock>app:lock");

        let bare = RedisLockStore::new(RedisStoreConfig {
            key_prefix: None,
            ..RedisStoreConfig::default()
        })
        .unwrap();
        assert_eq!(bare.prefixed("app:lock"), "app:lock");
    }

    #[test]
    fn construction_rejects_malformed_urls() {
        let result = RedisLockStore::new(RedisStoreConfig {
            url: "not-a-redis-url".to_string(),
            ..RedisStoreConfig::default()
        });
        assert!(matches!(result, Err(StoreError::Connection { .. })));
    }
}
