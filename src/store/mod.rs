//! Contract for the sorted interval index (spec §4.D): an ordered container
//! keyed by a 64-bit score, supporting insert, "lowest member with score >= q",
//! atomic rename, and cardinality. The reference implementation is a Redis
//! sorted set; an in-memory implementation backs the unit and property tests.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;

use crate::error::Result;

/// A batch of `(member, score)` pairs to insert in one round trip.
pub type Batch = Vec<(String, u64)>;

#[async_trait]
pub trait IntervalStore: Send + Sync {
    /// Inserts a batch of `(member, score)` pairs under `key`.
    async fn insert_batch(&self, key: &str, batch: &Batch) -> Result<()>;

    /// Returns the member with the lowest score `>= q`, if any.
    async fn query_ge(&self, key: &str, q: u64) -> Result<Option<String>>;

    /// Atomically replaces `dest` with the contents of `src`, removing `src`.
    async fn rename(&self, src: &str, dest: &str) -> Result<()>;

    /// Number of members stored under `key`.
    async fn cardinality(&self, key: &str) -> Result<u64>;

    /// Deletes `key` entirely (used to clean up a failed update's temp key).
    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether `key` exists at all.
    async fn exists(&self, key: &str) -> Result<bool>;
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Sets `key` to `value` only if absent, with a TTL in milliseconds.
    /// Returns whether the set took effect (lock/idempotency semantics).
    async fn set_if_absent(&self, key: &str, value: &str, ttl_ms: u64) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Sets `key` to `value` with a TTL in seconds, unconditionally.
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;

    /// Deletes `key` only if its current value equals `expected` (atomic
    /// compare-and-delete, used to release a lock safely).
    async fn delete_if_eq(&self, key: &str, expected: &str) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;
}
