//! Failure-injecting store for tests.
//!
//! Wraps a [`MemoryStore`], records every operation into a log that can be
//! shared across several tiers (so tests can assert cross-tier ordering), and
//! can be told to fail reads, writes, or writes to specific keys.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::error::{StoreError, StoreResult};
use super::expiry::Expiry;
use super::memory::MemoryStore;
use super::{CasToken, Item, KeyValueStore};

/// One recorded call against a [`MockStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockOp {
    pub tier: String,
    pub op: &'static str,
    pub keys: Vec<String>,
}

/// Operation log shared between mock tiers.
pub type OpLog = Arc<Mutex<Vec<MockOp>>>;

pub struct MockStore {
    name: String,
    inner: Arc<MemoryStore>,
    log: OpLog,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_collections: AtomicBool,
    failing_keys: Mutex<HashSet<String>>,
    expiries: Mutex<HashMap<String, Expiry>>,
    children: Mutex<HashMap<String, Arc<MockStore>>>,
}

impl MockStore {
    /// Creates a mock tier with its own log.
    pub fn new(name: &str) -> Self {
        Self::with_log(name, OpLog::default())
    }

    /// Creates a mock tier that appends to a shared log.
    pub fn with_log(name: &str, log: OpLog) -> Self {
        Self::wrap(name, Arc::new(MemoryStore::new()), log)
    }

    fn wrap(name: &str, inner: Arc<MemoryStore>, log: OpLog) -> Self {
        Self {
            name: name.to_string(),
            inner,
            log,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            fail_collections: AtomicBool::new(false),
            failing_keys: Mutex::new(HashSet::new()),
            expiries: Mutex::new(HashMap::new()),
            children: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying memory store (bypasses logging and failure injection).
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn log(&self) -> OpLog {
        Arc::clone(&self.log)
    }

    /// Recorded operations (all tiers sharing this log).
    pub fn ops(&self) -> Vec<MockOp> {
        self.log.lock().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_collections(&self, fail: bool) {
        self.fail_collections.store(fail, Ordering::SeqCst);
    }

    /// Makes every write touching `key` fail with a backend error.
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().insert(key.to_string());
    }

    /// Last expiry this tier received for `key`.
    pub fn last_expiry(&self, key: &str) -> Option<Expiry> {
        self.expiries.lock().get(key).copied()
    }

    /// Reads straight from the underlying store.
    pub fn peek(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.peek(key)
    }

    fn record(&self, op: &'static str, keys: Vec<String>) {
        self.log.lock().push(MockOp {
            tier: self.name.clone(),
            op,
            keys,
        });
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::backend(format!("{}: read refused", self.name)));
        }
        Ok(())
    }

    fn check_write(&self, key: Option<&str>) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::backend(format!("{}: write refused", self.name)));
        }
        if let Some(key) = key
            && self.failing_keys.lock().contains(key)
        {
            return Err(StoreError::backend(format!(
                "{}: write to '{key}' refused",
                self.name
            )));
        }
        Ok(())
    }

    fn remember_expiry(&self, key: &str, expire: Expiry) {
        self.expiries.lock().insert(key.to_string(), expire);
    }
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("name", &self.name)
            .field("inner", &self.inner)
            .finish()
    }
}

fn sorted(mut keys: Vec<String>) -> Vec<String> {
    keys.sort();
    keys
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get(&self, key: &str) -> StoreResult<Option<Item>> {
        self.record("get", vec![key.to_string()]);
        self.check_read()?;
        self.inner.get(key).await
    }

    async fn get_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, Vec<u8>>> {
        self.record("get_multi", sorted(keys.to_vec()));
        self.check_read()?;
        self.inner.get_multi(keys).await
    }

    async fn set(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool> {
        self.record("set", vec![key.to_string()]);
        self.check_write(Some(key))?;
        self.remember_expiry(key, expire);
        self.inner.set(key, value, expire).await
    }

    async fn set_multi(
        &self,
        items: &HashMap<String, Vec<u8>>,
        expire: Expiry,
    ) -> StoreResult<HashMap<String, bool>> {
        self.record("set_multi", sorted(items.keys().cloned().collect()));
        self.check_write(None)?;

        let mut results = HashMap::with_capacity(items.len());
        for (key, value) in items {
            let ok = match self.check_write(Some(key)) {
                Ok(()) => {
                    self.remember_expiry(key, expire);
                    self.inner.set(key, value, expire).await?
                }
                Err(_) => false,
            };
            results.insert(key.clone(), ok);
        }
        Ok(results)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.record("delete", vec![key.to_string()]);
        self.check_write(Some(key))?;
        self.inner.delete(key).await
    }

    async fn delete_multi(&self, keys: &[String]) -> StoreResult<HashMap<String, bool>> {
        self.record("delete_multi", sorted(keys.to_vec()));
        self.check_write(None)?;

        let mut results = HashMap::with_capacity(keys.len());
        for key in keys {
            let ok = match self.check_write(Some(key)) {
                Ok(()) => self.inner.delete(key).await?,
                Err(_) => false,
            };
            results.insert(key.clone(), ok);
        }
        Ok(results)
    }

    async fn add(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool> {
        self.record("add", vec![key.to_string()]);
        self.check_write(Some(key))?;
        self.remember_expiry(key, expire);
        self.inner.add(key, value, expire).await
    }

    async fn replace(&self, key: &str, value: &[u8], expire: Expiry) -> StoreResult<bool> {
        self.record("replace", vec![key.to_string()]);
        self.check_write(Some(key))?;
        self.remember_expiry(key, expire);
        self.inner.replace(key, value, expire).await
    }

    async fn cas(
        &self,
        token: &CasToken,
        key: &str,
        value: &[u8],
        expire: Expiry,
    ) -> StoreResult<bool> {
        self.record("cas", vec![key.to_string()]);
        self.check_write(Some(key))?;
        self.remember_expiry(key, expire);
        self.inner.cas(token, key, value, expire).await
    }

    async fn increment(
        &self,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>> {
        self.record("increment", vec![key.to_string()]);
        self.check_write(Some(key))?;
        self.remember_expiry(key, expire);
        self.inner.increment(key, offset, initial, expire).await
    }

    async fn decrement(
        &self,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>> {
        self.record("decrement", vec![key.to_string()]);
        self.check_write(Some(key))?;
        self.remember_expiry(key, expire);
        self.inner.decrement(key, offset, initial, expire).await
    }

    async fn touch(&self, key: &str, expire: Expiry) -> StoreResult<bool> {
        self.record("touch", vec![key.to_string()]);
        self.check_write(Some(key))?;
        self.remember_expiry(key, expire);
        self.inner.touch(key, expire).await
    }

    async fn flush(&self) -> StoreResult<bool> {
        self.record("flush", Vec::new());
        self.check_write(None)?;
        self.inner.flush().await
    }

    async fn collection(&self, name: &str) -> StoreResult<Arc<dyn KeyValueStore>> {
        self.record("collection", vec![name.to_string()]);
        if self.fail_collections.load(Ordering::SeqCst) {
            return Err(StoreError::Collection {
                name: name.to_string(),
                reason: format!("{}: collections refused", self.name),
            });
        }

        let child = self
            .children
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(MockStore::wrap(
                    &format!("{}/{}", self.name, name),
                    self.inner.collection_store(name),
                    Arc::clone(&self.log),
                ))
            })
            .clone();
        Ok(child)
    }
}
