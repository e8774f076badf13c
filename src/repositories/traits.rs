//! Storage traits for the stream cache
//!
//! The resolver only talks to these traits so the same logic runs against
//! SQLite, PostgreSQL or an in-test implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::errors::StorageResult;
use crate::models::{CachedEntry, StreamDescriptor};

/// Durable store of stream descriptors plus a small key/value table
#[async_trait]
pub trait StreamCache: Send + Sync {
    /// The non-dead entry whose start time (or last check time when it has
    /// none) is closest to `now`. Ties go to the lexicographically smaller link.
    async fn get_nearest(&self, now: DateTime<Utc>) -> StorageResult<Option<CachedEntry>>;

    /// Insert or overwrite every descriptor in one transaction, stamping
    /// them with `now` as the last check time.
    async fn upsert(&self, descriptors: &[StreamDescriptor], now: DateTime<Utc>) -> StorageResult<()>;

    async fn get_config(&self, name: &str) -> StorageResult<Option<String>>;

    async fn set_config(&self, name: &str, value: &str) -> StorageResult<()>;

    /// Open a transaction for multi-step work
    async fn begin(&self) -> StorageResult<Box<dyn CacheTransaction>>;

    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> StorageResult<()>;
}

/// A single open transaction against the cache
#[async_trait]
pub trait CacheTransaction: Send {
    async fn upsert(&mut self, descriptors: &[StreamDescriptor], now: DateTime<Utc>) -> StorageResult<()>;

    async fn get_config(&mut self, name: &str) -> StorageResult<Option<String>>;

    async fn set_config(&mut self, name: &str, value: &str) -> StorageResult<()>;

    /// Atomically claim a rate-limit slot stored under `name`.
    ///
    /// The slot holds the epoch milliseconds of the last claim. Returns `true`
    /// and records `now` when the previous claim is at least `interval` old
    /// (or absent). Returns `false` and leaves the row untouched otherwise.
    /// Concurrent claimers serialise on the row so at most one wins per
    /// interval.
    async fn claim_throttle(
        &mut self,
        name: &str,
        now: DateTime<Utc>,
        interval: Duration,
    ) -> StorageResult<bool>;

    async fn commit(self: Box<Self>) -> StorageResult<()>;

    async fn rollback(self: Box<Self>) -> StorageResult<()>;
}
