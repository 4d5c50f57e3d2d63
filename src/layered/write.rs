//! Write-through paths: authoritative tier first, nearest tier last.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, warn};

use super::LayeredStore;
use crate::store::{CasToken, Expiry, KeyValueStore, StoreError, StoreResult, encode_counter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WriteOp {
    Set,
    Add,
    Replace,
}

impl WriteOp {
    fn name(self) -> &'static str {
        match self {
            WriteOp::Set => "set",
            WriteOp::Add => "add",
            WriteOp::Replace => "replace",
        }
    }

    async fn apply(
        self,
        store: &dyn KeyValueStore,
        key: &str,
        value: &[u8],
        expire: Expiry,
    ) -> StoreResult<bool> {
        match self {
            WriteOp::Set => store.set(key, value, expire).await,
            WriteOp::Add => store.add(key, value, expire).await,
            WriteOp::Replace => store.replace(key, value, expire).await,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum CounterOp {
    Increment,
    Decrement,
}

impl CounterOp {
    fn name(self) -> &'static str {
        match self {
            CounterOp::Increment => "increment",
            CounterOp::Decrement => "decrement",
        }
    }

    async fn apply(
        self,
        store: &dyn KeyValueStore,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>> {
        match self {
            CounterOp::Increment => store.increment(key, offset, initial, expire).await,
            CounterOp::Decrement => store.decrement(key, offset, initial, expire).await,
        }
    }
}

/// Folds a tier result into success/failure, logging backend errors.
fn succeeded(result: StoreResult<bool>, index: usize, op: &'static str) -> bool {
    match result {
        Ok(ok) => ok,
        Err(e) => {
            warn!(tier = index, op, error = %e, "tier write failed");
            false
        }
    }
}

impl LayeredStore {
    /// Writes `key` to every tier, authoritative first, stopping at the first
    /// failure. On failure the key is deleted from the tiers already written.
    ///
    /// For `Replace` that rollback also evicts the key from tiers where it
    /// existed before the call.
    #[instrument(skip(self, value), fields(op = op.name(), tiers = self.chain.len()))]
    pub(super) async fn write_through(
        &self,
        op: WriteOp,
        key: &str,
        value: &[u8],
        expire: Expiry,
    ) -> bool {
        let mut written = Vec::with_capacity(self.chain.len());

        for (index, tier) in self.chain.tiers().iter().enumerate().rev() {
            let result = op
                .apply(tier.store(), key, value, tier.adapter_expire(expire))
                .await;
            if !succeeded(result, index, op.name()) {
                debug!(tier = index, "write refused, rolling back");
                self.rollback(key, &written).await;
                return false;
            }
            written.push(index);
        }

        true
    }

    /// Best-effort delete of `key` from `tiers`; failures are only logged.
    async fn rollback(&self, key: &str, tiers: &[usize]) {
        for &index in tiers {
            let Some(tier) = self.chain.tier(index) else {
                continue;
            };
            if let Err(e) = tier.store().delete(key).await {
                warn!(tier = index, error = %e, "rollback delete failed");
            }
        }
    }

    /// Per-key version of [`Self::write_through`] using one batched write per
    /// tier. A key refused by a tier is not sent to faster tiers and is rolled
    /// back from the tiers it already reached.
    #[instrument(skip(self, items), fields(tiers = self.chain.len(), keys = items.len()))]
    pub(super) async fn write_through_multi(
        &self,
        items: &HashMap<String, Vec<u8>>,
        expire: Expiry,
    ) -> HashMap<String, bool> {
        let mut pending = items.clone();
        let mut failed: HashSet<String> = HashSet::new();
        let mut written: Vec<(usize, Vec<String>)> = Vec::with_capacity(self.chain.len());

        for (index, tier) in self.chain.tiers().iter().enumerate().rev() {
            if pending.is_empty() {
                break;
            }

            let outcome = match tier
                .store()
                .set_multi(&pending, tier.adapter_expire(expire))
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(tier = index, error = %e, "tier batch write failed");
                    HashMap::new()
                }
            };

            let mut accepted = Vec::with_capacity(pending.len());
            for key in pending.keys() {
                if outcome.get(key).copied().unwrap_or(false) {
                    accepted.push(key.clone());
                } else {
                    failed.insert(key.clone());
                }
            }
            pending.retain(|key, _| !failed.contains(key));
            written.push((index, accepted));
        }

        if !failed.is_empty() {
            debug!(failed = failed.len(), "rolling back refused keys");
            for (index, keys) in &written {
                let undo: Vec<String> = keys
                    .iter()
                    .filter(|key| failed.contains(*key))
                    .cloned()
                    .collect();
                if undo.is_empty() {
                    continue;
                }
                let Some(tier) = self.chain.tier(*index) else {
                    continue;
                };
                if let Err(e) = tier.store().delete_multi(&undo).await {
                    warn!(tier = index, error = %e, "rollback batch delete failed");
                }
            }
        }

        items
            .keys()
            .map(|key| (key.clone(), !failed.contains(key)))
            .collect()
    }

    /// Deletes from every tier. Does not stop early so no stale cache copy
    /// survives a failed authoritative delete.
    #[instrument(skip(self), fields(tiers = self.chain.len()))]
    pub(super) async fn delete_through(&self, key: &str) -> bool {
        let mut all = true;
        for (index, tier) in self.chain.tiers().iter().enumerate().rev() {
            all &= succeeded(tier.store().delete(key).await, index, "delete");
        }
        all
    }

    #[instrument(skip(self, keys), fields(tiers = self.chain.len(), keys = keys.len()))]
    pub(super) async fn delete_through_multi(&self, keys: &[String]) -> HashMap<String, bool> {
        let mut results: HashMap<String, bool> =
            keys.iter().map(|key| (key.clone(), true)).collect();

        for (index, tier) in self.chain.tiers().iter().enumerate().rev() {
            match tier.store().delete_multi(keys).await {
                Ok(outcome) => {
                    for (key, ok) in results.iter_mut() {
                        *ok &= outcome.get(key).copied().unwrap_or(false);
                    }
                }
                Err(e) => {
                    warn!(tier = index, error = %e, "tier batch delete failed");
                    results.values_mut().for_each(|ok| *ok = false);
                }
            }
        }

        results
    }

    #[instrument(skip(self), fields(tiers = self.chain.len()))]
    pub(super) async fn touch_through(&self, key: &str, expire: Expiry) -> bool {
        let mut all = true;
        for (index, tier) in self.chain.tiers().iter().enumerate().rev() {
            let result = tier.store().touch(key, tier.adapter_expire(expire)).await;
            all &= succeeded(result, index, "touch");
        }
        all
    }

    /// Applies the counter on the authoritative tier only and copies the
    /// result into every faster tier as a plain value.
    ///
    /// Authoritative failures (errors or `None`) are returned unchanged. A
    /// faster tier that cannot take the new value has its copy evicted.
    #[instrument(skip(self), fields(op = op.name(), tiers = self.chain.len()))]
    pub(super) async fn adjust_counter(
        &self,
        op: CounterOp,
        key: &str,
        offset: u64,
        initial: u64,
        expire: Expiry,
    ) -> StoreResult<Option<u64>> {
        let Some((authoritative, tier)) = self.chain.authoritative() else {
            return Err(StoreError::Unsupported {
                operation: op.name(),
                reason: "layered store has no tiers".to_string(),
            });
        };

        let counter = op
            .apply(tier.store(), key, offset, initial, tier.adapter_expire(expire))
            .await?;
        let Some(counter) = counter else {
            debug!("authoritative tier refused counter update");
            return Ok(None);
        };

        let encoded = encode_counter(counter);
        for index in (0..authoritative).rev() {
            let Some(tier) = self.chain.tier(index) else {
                continue;
            };
            let result = tier
                .store()
                .set(key, &encoded, tier.adapter_expire(expire))
                .await;
            if !succeeded(result, index, "counter propagation") {
                // A stale counter in a faster tier would shadow the new one.
                if let Err(e) = tier.store().delete(key).await {
                    warn!(tier = index, error = %e, "failed to evict stale counter");
                }
            }
        }

        Ok(Some(counter))
    }

    /// Weak CAS: compare against a fresh read, then a full write-through.
    #[instrument(skip(self, token, value), fields(tiers = self.chain.len()))]
    pub(super) async fn compare_and_set(
        &self,
        token: &CasToken,
        key: &str,
        value: &[u8],
        expire: Expiry,
    ) -> bool {
        match self.read_through(key).await {
            Some(current) if current.token() == token => {
                self.write_through(WriteOp::Set, key, value, expire).await
            }
            Some(_) => {
                debug!("token is stale");
                false
            }
            None => {
                debug!("nothing to compare against");
                false
            }
        }
    }

    /// Flushes every derived collection, then every tier back to front.
    #[instrument(skip(self), fields(tiers = self.chain.len()))]
    pub(super) async fn flush_through(&self) -> bool {
        let mut all = true;

        for collection in self.collections.memoized() {
            all &= KeyValueStore::flush(collection.as_ref())
                .await
                .unwrap_or(false);
        }

        for (index, tier) in self.chain.tiers().iter().enumerate().rev() {
            all &= succeeded(tier.store().flush().await, index, "flush");
        }

        all
    }
}
