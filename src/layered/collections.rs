//! Named sub-collections, derived lazily and memoized per name.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, instrument, warn};

use super::LayeredStore;
use crate::store::StoreResult;

/// Memo of derived collections. The map lock is only held to look up or
/// insert a cell, never across tier I/O; the per-name cell makes concurrent
/// first requests for one name derive exactly once.
#[derive(Default)]
pub(super) struct Collections {
    named: Mutex<HashMap<String, Arc<OnceCell<Arc<LayeredStore>>>>>,
}

impl Collections {
    fn cell(&self, name: &str) -> Arc<OnceCell<Arc<LayeredStore>>> {
        self.named
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Collections derived so far.
    pub(super) fn memoized(&self) -> Vec<Arc<LayeredStore>> {
        self.named
            .lock()
            .values()
            .filter_map(|cell| cell.get().cloned())
            .collect()
    }

    /// Drops `cell` for `name` if it is still the registered, uninitialized one.
    fn forget_failed(&self, name: &str, cell: &Arc<OnceCell<Arc<LayeredStore>>>) {
        let mut named = self.named.lock();
        if named
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, cell) && !current.initialized())
        {
            named.remove(name);
        }
    }

    /// Registered names, including derivations still in flight.
    #[cfg(test)]
    pub(super) fn slots(&self) -> usize {
        self.named.lock().len()
    }

    pub(super) fn len(&self) -> usize {
        self.named
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }
}

impl LayeredStore {
    /// Returns the layered store scoped to collection `name`.
    ///
    /// The first call asks every tier for its own `name` sub-collection and
    /// chains them with this store's max lifetimes; later calls return the same
    /// instance. A failed derivation is not memoized and leaves no entry
    /// behind.
    #[instrument(skip(self), fields(tiers = self.chain.len()))]
    pub async fn collection_store(&self, name: &str) -> StoreResult<Arc<LayeredStore>> {
        let cell = self.collections.cell(name);
        match cell.get_or_try_init(|| self.derive_collection(name)).await {
            Ok(store) => Ok(Arc::clone(store)),
            Err(e) => {
                self.collections.forget_failed(name, &cell);
                Err(e)
            }
        }
    }

    async fn derive_collection(&self, name: &str) -> StoreResult<Arc<LayeredStore>> {
        let mut stores = Vec::with_capacity(self.chain.len());
        for (index, tier) in self.chain.tiers().iter().enumerate() {
            let store = tier.store().collection(name).await.inspect_err(|e| {
                warn!(tier = index, error = %e, "tier could not provide collection");
            })?;
            stores.push(store);
        }

        debug!(tiers = stores.len(), "derived collection");
        Ok(Arc::new(LayeredStore::with_chain(self.chain.derive(stores))))
    }
}
