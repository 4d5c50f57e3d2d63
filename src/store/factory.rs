use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use super::KeyValueStore;
use super::memory::MemoryStore;
use crate::config::{Config, TierKind};

/// Adapters supplied by the application, keyed by tier kind name
/// (`redis`, `memcached`, ...).
#[derive(Clone, Default)]
pub struct ExternalStores {
    stores: HashMap<String, Arc<dyn KeyValueStore>>,
}

impl ExternalStores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an adapter under `kind` (case-insensitive).
    pub fn register(mut self, kind: &str, store: Arc<dyn KeyValueStore>) -> Self {
        self.stores.insert(kind.to_lowercase(), store);
        self
    }

    /// Looks up the adapter for `kind` (case-insensitive).
    pub fn get(&self, kind: &str) -> Option<Arc<dyn KeyValueStore>> {
        self.stores.get(&kind.to_lowercase()).cloned()
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl std::fmt::Debug for ExternalStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&String> = self.stores.keys().collect();
        kinds.sort();
        f.debug_struct("ExternalStores")
            .field("kinds", &kinds)
            .finish()
    }
}

/// Builds the store for one configured tier.
///
/// Returns `None` when the kind cannot be satisfied (no adapter registered);
/// chain construction drops such candidates.
pub fn build_store(
    kind: &TierKind,
    config: &Config,
    external: &ExternalStores,
) -> Option<Arc<dyn KeyValueStore>> {
    match kind {
        TierKind::Memory => Some(Arc::new(MemoryStore::with_capacity(config.memory_capacity))),
        TierKind::External(name) => {
            let store = external.get(name);
            if store.is_none() {
                warn!(kind = %name, "no adapter registered for tier kind");
            }
            store
        }
    }
}
