//! State store trait.
//!
//! Defines the flat key/value port every stateful read and write of a run
//! goes through. Keys arrive fully namespaced from the persistence gateway.
//! Implementations live in waypoint-infra (SQLite) and in `storage::memory`.

use waypoint_types::error::RepositoryError;
use waypoint_types::state::StateRecord;

/// Trait for the flat, expiring key/value store behind the persistence gateway.
///
/// Each record holds an optional string and an optional numeric value.
/// Records whose expiry is at or before "now" must read as absent and must
/// behave as absent for every write (a write to an expired key starts a
/// fresh record).
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait StateStore: Send + Sync {
    /// Get the live record for a key. Returns None if absent or expired.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<StateRecord>, RepositoryError>> + Send;

    /// Upsert the string value of a key. The numeric value of a live record
    /// is kept; `expire_at` replaces any previous expiry.
    fn put_string(
        &self,
        key: &str,
        value: &str,
        expire_at: Option<i64>,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Upsert the numeric value of a key.
    ///
    /// With `overwrite = false` the write only happens when the key holds no
    /// numeric value. Returns whether a write happened.
    fn put_number(
        &self,
        key: &str,
        value: f64,
        expire_at: Option<i64>,
        overwrite: bool,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Atomically add `by` to the numeric value (absent counts as 0) and
    /// return the new value. Must be a single operation at the store.
    fn increment(
        &self,
        key: &str,
        by: f64,
    ) -> impl std::future::Future<Output = Result<f64, RepositoryError>> + Send;

    /// Set the expiry (unix ms) of a live record. No-op if the key is absent.
    fn set_expiry(
        &self,
        key: &str,
        expire_at: i64,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
