//! Layered store: one key-value interface over a chain of tiers.
//!
//! Reads go front to back and promote hits into the faster tiers. Writes go
//! back to front so the authoritative tier commits (or refuses) first. Each
//! tier's relative TTLs are clamped to its configured max lifetime.
//!
//! The store holds no lock across tier I/O: concurrent calls on different keys
//! never contend, and calls on the same key may interleave across tiers.
//! Cross-tier consistency is best-effort, not linearizable.

pub mod chain;
mod collections;
mod read;
pub mod ttl;
mod write;


pub use chain::{Tier, TierChain};
pub use ttl::clamp_expiry;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use collections::Collections;

use crate::config::Config;
use crate::store::{
    CasToken, Expiry, ExternalStores, Item, KeyValueStore, StoreResult, build_store,
};

/// Coordinator over an ordered chain of [`KeyValueStore`] tiers.
///
/// Implements [`KeyValueStore`] itself, so layered stores nest.
pub struct LayeredStore {
    chain: TierChain,
    collections: Collections,
}

impl LayeredStore {
    /// Creates a layered store over `stores` (nearest first).
    ///
    /// `max_lifetimes` is parallel to `stores`; missing entries are unbounded.
    pub fn new<L>(stores: Vec<Arc<dyn KeyValueStore>>, max_lifetimes: L) -> Self
    where
        L: IntoIterator,
        L::Item: Into<Option<u64>>,
    {
        Self::with_chain(TierChain::new(stores, max_lifetimes))
    }

    /// Creates a layered store from candidates, dropping the `None` ones.
    pub fn from_candidates<I, L>(candidates: I, max_lifetimes: L) -> Self
    where
        I: IntoIterator<Item = Option<Arc<dyn KeyValueStore>>>,
        L: IntoIterator,
        L::Item: Into<Option<u64>>,
    {
        Self::with_chain(TierChain::from_candidates(candidates, max_lifetimes))
    }

    /// Builds every configured tier and chains the ones that could be built.
    pub fn from_config(config: &Config, external: &ExternalStores) -> Self {
        let candidates = config
            .tiers
            .iter()
            .map(|spec| build_store(&spec.kind, config, external));
        Self::from_candidates(candidates, config.max_lifetimes())
    }

    pub fn with_chain(chain: TierChain) -> Self {
        Self {
            chain,
            collections: Collections::default(),
        }
    }

    #[inline]
    pub fn chain(&self) -> &TierChain {
        &self.chain
    }

    #[inline]
    pub fn tiers(&self) -> &[Tier] {
        self.chain.tiers()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    #[inline]
    pub fn max_lifetime(&self, index: usize) -> Option<u64> {
        self.chain.tier(index).and_then(Tier::max_lifetime)
    }

    /// Number of named collections derived so far.
    pub fn collection_count(&self) -> usize {
        self.collections.len()
    }
}

impl std::fmt::Debug for LayeredStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredStore")
            .field("chain", &self.chain)
            .field("collections", &self.collections.len())
            .finish()
    }
}

#[async_trait]
impl KeyValueStore for LayeredStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Item>> {
        Ok(self.read_through(key).await)
    }

    async fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, Vec<u8>>> {
        Ok(self.read_through_multi(keys).await)
    }

    async fn set(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool> {
        Ok(self.write_through(write::WriteOp::Set, key, value, expire).await)
    }

    async fn set_multi(
        &self,
        items: &HashMap<String, Vec<u8>>,
        expire: Expiry,
    ) -> StoreResult<HashMap<String, bool>> {
        Ok(self.write_through_multi(items, expire).await)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self.delete_through(key).await)
    }

    async fn delete_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, bool>> {
        Ok(self.delete_through_multi(keys).await)
    }

    async fn add(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool> {
        Ok(self.write_through(write::WriteOp::Add, key, value, expire).await)
    }

    async fn replace(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool> {
        Ok(self
            .write_through(write::WriteOp::Replace, key, value, expire)
            .await)
    }

    /// Weak compare-and-set.
    ///
    /// Reads the current value through the chain, compares its fingerprint
    /// with `token`, then runs a full [`KeyValueStore::set`]. Nothing locks the
    /// chain between the read and the write: another writer may land in that
    /// window and be overwritten. Use a single-backend CAS where that matters.
    async fn cas(
        &self,
        token: &CasToken,
        key: &str,
        value: &[u8],
        expire: Expiry,
    ) -> StoreResult<bool> {
        Ok(self.compare_and_set(token, key, value, expire).await)
    }

    /// Increments on the authoritative tier only, then copies the result
    /// forward as a plain value. Fails with `Unsupported` on an empty chain.
    async fn increment(
        &self,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>> {
        self.adjust_counter(write::CounterOp::Increment, key, offset, initial, expire)
            .await
    }

    async fn decrement(
        &self,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>> {
        self.adjust_counter(write::CounterOp::Decrement, key, offset, initial, expire)
            .await
    }

    async fn touch(&self, key: &str, expire: Expiry) -> StoreResult<bool> {
        Ok(self.touch_through(key, expire).await)
    }

    async fn flush(&self) -> StoreResult<bool> {
        Ok(self.flush_through().await)
    }

    async fn collection(&self, name: &str) -> StoreResult<Arc<dyn KeyValueStore>> {
        let store: Arc<dyn KeyValueStore> = self.collection_store(name).await?;
        Ok(store)
    }
}
