//! Key/value storage contract of a ring node.
//!
//! The engine only touches the store for key-range transfers around joins
//! and departures; everything else about the store is opaque to it.

use async_trait::async_trait;

use crate::dht::RingId;
use crate::error::Result;

mod memory;
pub use memory::MemStore;

/// Storage of ring-id keys and byte values.
#[async_trait]
pub trait RingStore: Send + Sync {
    /// Value stored under `key`, if any.
    async fn get(&self, key: &RingId) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing an existing value.
    async fn set(&self, key: &RingId, value: Vec<u8>) -> Result<()>;

    /// Drop the value stored under `key`. Removing an absent key is not
    /// an error.
    async fn remove(&self, key: &RingId) -> Result<()>;

    /// Keys inside the closed-open modular interval `[from, to)`.
    async fn keys_in_range(&self, from: &RingId, to: &RingId) -> Result<Vec<RingId>>;
}
