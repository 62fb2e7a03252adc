//! Shared types for the lock protocol.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Literal suffix appended to a scope to form its lock key.
///
/// The `"<scope>:lock"` mapping is shared with existing deployments of the
/// protocol and must never change.
pub const LOCK_KEY_SUFFIX: &str = ":lock";

/// Derive the store key holding a scope's lock record.
pub(crate) fn lock_key(scope: &str) -> String {
    format!("{scope}{LOCK_KEY_SUFFIX}")
}

/// Token proving ownership of an acquired lock.
///
/// Minted fresh on every acquisition attempt: 128 bits of randomness
/// (a v4 UUID), base64-encoded to match the textual form stored by
/// existing deployments. Only the call that acquired the lock may present
/// this token back to [`unlock`](crate::DistributedLock::unlock).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockId(String);

impl LockId {
    /// Mint a globally unique lock id.
    ///
    /// Minting happens before the atomic set so a declined acquisition
    /// discards the id without side effects.
    pub(crate) fn mint() -> Self {
        Self(BASE64.encode(Uuid::new_v4().hyphenated().to_string()))
    }

    /// The textual form stored at the lock key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-call lock configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOptions {
    /// Time to live before the lock record expires, in milliseconds.
    ///
    /// Absent (or zero) means the record persists until explicitly
    /// unlocked. Once set, the TTL cannot be extended or renewed.
    pub ttl_ms: Option<u64>,
}

impl LockOptions {
    /// Options with the given TTL in milliseconds.
    pub fn with_ttl_ms(ttl_ms: u64) -> Self {
        Self { ttl_ms: Some(ttl_ms) }
    }

    /// TTL as handed to the store: zero is treated as "no TTL".
    pub(crate) fn effective_ttl_ms(&self) -> Option<u64> {
        self.ttl_ms.filter(|ttl| *ttl > 0)
    }
}
