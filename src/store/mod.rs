//! Key-value store capability shared by every tier and by the layered store.
//!
//! Concrete adapters (Redis, Memcached, Couchbase, SQL) live outside this
//! crate and plug in by implementing [`KeyValueStore`]. [`MemoryStore`] is the
//! in-process reference implementation.

pub mod error;
pub mod expiry;
pub mod factory;
pub mod memory;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod tests;

pub use error::{StoreError, StoreResult};
pub use expiry::{ABSOLUTE_EXPIRY_THRESHOLD_SECS, Expiry};
pub use factory::{ExternalStores, build_store};
pub use memory::MemoryStore;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockOp, MockStore, OpLog};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::hashing::keyed_fingerprint;

/// Opaque compare-and-set token: a fingerprint of the value a read returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CasToken([u8; 32]);

impl CasToken {
    /// Computes the token for `value` as read under `key`.
    #[inline]
    pub fn of(key: &str, value: &[u8]) -> Self {
        Self(keyed_fingerprint(key, value))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A value returned by a successful read, with its CAS token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    value: Vec<u8>,
    token: CasToken,
}

impl Item {
    /// Wraps a value read under `key`, computing its token.
    pub fn new(key: &str, value: Vec<u8>) -> Self {
        let token = CasToken::of(key, &value);
        Self { value, token }
    }

    #[inline]
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    #[inline]
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    #[inline]
    pub fn token(&self) -> &CasToken {
        &self.token
    }
}

#[async_trait]
/// Key-value capability every tier implements.
///
/// `Ok(None)` and `Ok(false)` are ordinary outcomes (key absent, precondition
/// not met). `Err` means the backend itself failed.
pub trait KeyValueStore: Send + Sync {
    /// Reads one key.
    async fn get(&self, key: &str) -> StoreResult<Option<Item>>;

    /// Reads several keys; absent keys are omitted from the map.
    async fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, Vec<u8>>>;

    /// Stores a value unconditionally.
    async fn set(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool>;

    /// Stores several values; reports success per key.
    async fn set_multi(
        &self,
        items: &HashMap<String, Vec<u8>>,
        expire: Expiry,
    ) -> StoreResult<HashMap<String, bool>>;

    /// Removes a key. `Ok(false)` if it was not present.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Removes several keys; reports per key whether it was removed.
    async fn delete_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, bool>>;

    /// Stores a value only if the key is absent.
    async fn add(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool>;

    /// Stores a value only if the key is present.
    async fn replace(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool>;

    /// Stores a value only if the current value still matches `token`.
    async fn cas(
        &self,
        token: &CasToken,
        key: &str,
        value: &[u8],
        expire: Expiry,
    ) -> StoreResult<bool>;

    /// Adds `offset` to a counter, creating it with `initial` if absent.
    ///
    /// Returns the new value, or `Ok(None)` if the counter could not be updated.
    async fn increment(
        &self,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>>;

    /// Subtracts `offset` from a counter (saturating at zero), creating it with
    /// `initial` if absent.
    async fn decrement(
        &self,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>>;

    /// Updates only the expiry of an existing key.
    async fn touch(&self, key: &str, expire: Expiry) -> StoreResult<bool>;

    /// Removes every key.
    async fn flush(&self) -> StoreResult<bool>;

    /// Returns a store scoped to the named sub-collection.
    async fn collection(&self, name: &str) -> StoreResult<Arc<dyn KeyValueStore>>;
}

/// Encodes a counter the way stores hold plain values (decimal ASCII).
#[inline]
pub fn encode_counter(value: u64) -> Vec<u8> {
    value.to_string().into_bytes()
}

/// Parses a value written by [`encode_counter`].
#[inline]
pub fn decode_counter(value: &[u8]) -> Option<u64> {
    std::str::from_utf8(value).ok()?.trim().parse().ok()
}
