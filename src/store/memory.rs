//! In-process memory store (moka-backed).
//!
//! Entries carry an optional deadline that is checked lazily on access; moka
//! handles capacity eviction. Every mutation (plain writes and deletes as well
//! as `add`, `replace`, `cas`, counters and `touch`) runs under a store-local
//! mutex, so compound read-modify-write is atomic within this tier. Reads
//! take the mutex only to evict an expired entry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use parking_lot::Mutex;
use tokio::time::Instant;

use super::error::{StoreError, StoreResult};
use super::expiry::Expiry;
use super::{CasToken, Item, KeyValueStore, decode_counter, encode_counter};

#[derive(Clone)]
struct Entry {
    value: Arc<[u8]>,
    deadline: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.deadline.is_none_or(|deadline| deadline > now)
    }
}

/// Outcome of resolving an [`Expiry`] against the current instant.
enum Deadline {
    None,
    At(Instant),
    Elapsed,
}

fn resolve(expire: Expiry, now: Instant) -> Deadline {
    match expire.remaining() {
        None => Deadline::None,
        Some(Duration::ZERO) => Deadline::Elapsed,
        Some(ttl) => Deadline::At(now + ttl),
    }
}

/// In-memory key-value store with per-entry expiry.
pub struct MemoryStore {
    entries: Cache<String, Entry>,
    capacity: u64,
    write_lock: Mutex<()>,
    collections: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryStore {
    pub const DEFAULT_CAPACITY: u64 = 10_000;

    /// Creates a store with the default capacity.
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Creates a store with a max entry capacity.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
            capacity,
            write_lock: Mutex::new(()),
            collections: Mutex::new(HashMap::new()),
        }
    }

    /// Configured max entry capacity.
    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the live value for `key`, dropping it if expired.
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.live_entry(key, Instant::now())
            .map(|entry| entry.value.to_vec())
    }

    /// Returns `true` if `key` holds a live value.
    pub fn contains(&self, key: &str) -> bool {
        self.live_entry(key, Instant::now()).is_some()
    }

    /// Time until `key` expires.
    ///
    /// `None` if the key is absent; `Some(None)` if it never expires.
    pub fn remaining_ttl(&self, key: &str) -> Option<Option<Duration>> {
        let now = Instant::now();
        self.live_entry(key, now).map(|entry| {
            entry
                .deadline
                .map(|deadline| deadline.saturating_duration_since(now))
        })
    }

    /// Approximate number of entries (may include expired ones not yet touched).
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lock-free read. An expired entry is evicted under the write lock,
    /// re-checked there so a concurrent write is never dropped.
    fn live_entry(&self, key: &str, now: Instant) -> Option<Entry> {
        let entry = self.entries.get(key)?;
        if entry.is_live(now) {
            return Some(entry);
        }
        let _guard = self.write_lock.lock();
        self.live_entry_locked(key, now);
        None
    }

    /// Caller holds `write_lock`.
    fn live_entry_locked(&self, key: &str, now: Instant) -> Option<Entry> {
        let entry = self.entries.get(key)?;
        if entry.is_live(now) {
            Some(entry)
        } else {
            self.entries.invalidate(key);
            None
        }
    }

    fn store(&self, key: &str, value: Arc<[u8]>, expire: Expiry) -> bool {
        match resolve(expire, Instant::now()) {
            Deadline::Elapsed => {
                // Already expired: the write is accepted and the key is gone.
                self.entries.invalidate(key);
            }
            Deadline::None => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        value,
                        deadline: None,
                    },
                );
            }
            Deadline::At(deadline) => {
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        value,
                        deadline: Some(deadline),
                    },
                );
            }
        }
        true
    }

    /// Caller holds `write_lock`.
    fn write_locked(&self, key: &str, value: &[u8], expire: Expiry) -> bool {
        self.store(key, Arc::from(value), expire)
    }

    /// Caller holds `write_lock`.
    fn remove_locked(&self, key: &str, now: Instant) -> bool {
        let existed = self.live_entry_locked(key, now).is_some();
        self.entries.invalidate(key);
        existed
    }

    fn set_now(&self, key: &str, value: &[u8], expire: Expiry) -> bool {
        let _guard = self.write_lock.lock();
        self.write_locked(key, value, expire)
    }

    fn add_now(&self, key: &str, value: &[u8], expire: Expiry) -> bool {
        let _guard = self.write_lock.lock();
        if self.live_entry_locked(key, Instant::now()).is_some() {
            return false;
        }
        self.write_locked(key, value, expire)
    }

    fn replace_now(&self, key: &str, value: &[u8], expire: Expiry) -> bool {
        let _guard = self.write_lock.lock();
        if self.live_entry_locked(key, Instant::now()).is_none() {
            return false;
        }
        self.write_locked(key, value, expire)
    }

    fn cas_now(&self, token: &CasToken, key: &str, value: &[u8], expire: Expiry) -> bool {
        let _guard = self.write_lock.lock();
        match self.live_entry_locked(key, Instant::now()) {
            Some(entry) if CasToken::of(key, &entry.value) == *token => {
                self.write_locked(key, value, expire)
            }
            _ => false,
        }
    }

    fn adjust_counter(
        &self,
        key: &str,
        initial: u64,
        expire: Expiry,
        apply: impl Fn(u64) -> u64,
    ) -> StoreResult<Option<u64>> {
        let _guard = self.write_lock.lock();
        let next = match self.live_entry_locked(key, Instant::now()) {
            Some(entry) => {
                let current =
                    decode_counter(&entry.value).ok_or_else(|| StoreError::NotACounter {
                        key: key.to_string(),
                    })?;
                let next = apply(current);
                // An existing counter keeps its deadline.
                self.entries.insert(
                    key.to_string(),
                    Entry {
                        value: Arc::from(encode_counter(next)),
                        deadline: entry.deadline,
                    },
                );
                next
            }
            None => {
                let next = apply(initial);
                self.write_locked(key, &encode_counter(next), expire);
                next
            }
        };
        Ok(Some(next))
    }

    fn touch_now(&self, key: &str, expire: Expiry) -> bool {
        let _guard = self.write_lock.lock();
        match self.live_entry_locked(key, Instant::now()) {
            Some(entry) => self.store(key, entry.value, expire),
            None => false,
        }
    }

    fn flush_now(&self) {
        {
            let _guard = self.write_lock.lock();
            self.entries.invalidate_all();
        }
        let children: Vec<Arc<MemoryStore>> = self.collections.lock().values().cloned().collect();
        for child in children {
            child.flush_now();
        }
    }

    /// Returns the memoized sub-collection store for `name`.
    pub fn collection_store(&self, name: &str) -> Arc<MemoryStore> {
        self.collections
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::with_capacity(self.capacity)))
            .clone()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.entry_count())
            .field("capacity", &self.capacity)
            .field("collections", &self.collections.lock().len())
            .finish()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Item>> {
        Ok(self
            .live_entry(key, Instant::now())
            .map(|entry| Item::new(key, entry.value.to_vec())))
    }

    async fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, Vec<u8>>> {
        let now = Instant::now();
        Ok(keys
            .iter()
            .filter_map(|key| {
                self.live_entry(key, now)
                    .map(|entry| (key.clone(), entry.value.to_vec()))
            })
            .collect())
    }

    async fn set(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool> {
        Ok(self.set_now(key, value, expire))
    }

    async fn set_multi(
        &self,
        items: &HashMap<String, Vec<u8>>,
        expire: Expiry,
    ) -> StoreResult<HashMap<String, bool>> {
        let _guard = self.write_lock.lock();
        Ok(items
            .iter()
            .map(|(key, value)| (key.clone(), self.write_locked(key, value, expire)))
            .collect())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let _guard = self.write_lock.lock();
        Ok(self.remove_locked(key, Instant::now()))
    }

    async fn delete_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, bool>> {
        let _guard = self.write_lock.lock();
        let now = Instant::now();
        Ok(keys
            .iter()
            .map(|key| (key.clone(), self.remove_locked(key, now)))
            .collect())
    }

    async fn add(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool> {
        Ok(self.add_now(key, value, expire))
    }

    async fn replace(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool> {
        Ok(self.replace_now(key, value, expire))
    }

    async fn cas(
        &self,
        token: &CasToken,
        key: &str,
        value: &[u8],
        expire: Expiry,
    ) -> StoreResult<bool> {
        Ok(self.cas_now(token, key, value, expire))
    }

    async fn increment(
        &self,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>> {
        self.adjust_counter(key, initial, expire, |v| v.saturating_add(offset))
    }

    async fn decrement(
        &self,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>> {
        self.adjust_counter(key, initial, expire, |v| v.saturating_sub(offset))
    }

    async fn touch(&self, key: &str, expire: Expiry) -> StoreResult<bool> {
        Ok(self.touch_now(key, expire))
    }

    async fn flush(&self) -> StoreResult<bool> {
        self.flush_now();
        Ok(true)
    }

    async fn collection(&self, name: &str) -> StoreResult<Arc<dyn KeyValueStore>> {
        Ok(self.collection_store(name))
    }
}
