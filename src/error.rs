//! Error types for the lock coordinator and its store client.

use snafu::Snafu;

/// Errors from the key-value store client.
///
/// Reasons are carried as strings so store errors stay cheap to clone and
/// compare across the async boundary.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// The connection to the store could not be established.
    #[snafu(display("store connection failed: {reason}"))]
    Connection {
        /// Description of the connection failure.
        reason: String,
    },

    /// A store command failed after the connection was established.
    #[snafu(display("store command {command} failed: {reason}"))]
    Command {
        /// The command that failed (e.g. `SET`, `PTTL`).
        command: String,
        /// Description of the failure.
        reason: String,
    },
}

/// Errors surfaced by [`DistributedLock`](crate::DistributedLock).
///
/// Every store failure is wrapped with the scope it concerns and the
/// original cause preserved. Nothing is retried internally; the single
/// application-level deferred retry in `execute` is the only automatic
/// re-attempt.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LockError {
    /// The store round trip for a lock-state query failed.
    #[snafu(display("failed to retrieve lock state for the resource '{scope}'"))]
    Store {
        /// The scope whose state was queried.
        scope: String,
        /// The underlying store failure.
        source: StoreError,
    },

    /// The acquisition round trip failed at the store layer.
    #[snafu(display("failed to acquire lock for the resource '{scope}'"))]
    Acquisition {
        /// The scope being locked.
        scope: String,
        /// The underlying store failure.
        source: StoreError,
    },

    /// The lock was already held when `execute` tried to take it.
    ///
    /// Distinct from [`LockError::Acquisition`]: the store round trip
    /// succeeded but declined the set because the key pre-existed.
    #[snafu(display("failed to acquire lock for the resource '{scope}': already held"))]
    Held {
        /// The contended scope.
        scope: String,
    },

    /// The release round trip failed at the store layer.
    ///
    /// An ownership mismatch is not an error; it surfaces as a normal
    /// `false` return from `unlock`.
    #[snafu(display("failed to release lock for the resource '{scope}'"))]
    Release {
        /// The scope being unlocked.
        scope: String,
        /// The underlying store failure.
        source: StoreError,
    },

    /// A deferred retry was already pending on this coordinator instance.
    ///
    /// The second call is rejected outright rather than queued; the
    /// protocol makes no fairness or queuing guarantee.
    #[snafu(display("unable to execute task '{task}' within the exclusive region for the resource '{scope}'"))]
    Scheduling {
        /// The scope the rejected call targeted.
        scope: String,
        /// Type name of the rejected callback.
        task: String,
    },

    /// A pending deferred execution was cancelled by `dispose`.
    #[snafu(display("deferred execution for the resource '{scope}' was cancelled by dispose"))]
    Cancelled {
        /// The scope whose deferred run was cancelled.
        scope: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_names_the_command() {
        let err = StoreError::Command {
            command: "PTTL".to_string(),
            reason: "broken pipe".to_string(),
        };
        assert_eq!(err.to_string(), "store command PTTL failed: broken pipe");
    }

    #[test]
    fn lock_error_preserves_the_cause() {
        use std::error::Error as _;

        let err = LockError::Store {
            scope: "billing".to_string(),
            source: StoreError::Connection {
                reason: "refused".to_string(),
            },
        };
        assert!(err.to_string().contains("billing"));
        assert_eq!(
            err.source().map(ToString::to_string),
            Some("store connection failed: refused".to_string())
        );
    }

    #[test]
    fn held_is_not_a_store_failure() {
        let err = LockError::Held {
            scope: "jobs".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to acquire lock for the resource 'jobs': already held"
        );
    }
}
