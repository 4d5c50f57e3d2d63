//! Test fixtures for integration tests.

use std::sync::Arc;

use cascade::{KeyValueStore, LayeredStore, MemoryStore};

/// Front tier lifetime used by the default fixture chain.
pub const FRONT_MAX_LIFETIME: u64 = 10;

/// Middle tier lifetime used by the default fixture chain.
pub const MIDDLE_MAX_LIFETIME: u64 = 60;

/// Memory tiers plus the layered store chaining them.
pub struct MemoryChain {
    pub tiers: Vec<Arc<MemoryStore>>,
    pub store: LayeredStore,
}

#[derive(Default)]
pub struct MemoryChainBuilder {
    lifetimes: Vec<Option<u64>>,
}

impl MemoryChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a tier with a bounded max lifetime.
    pub fn tier(mut self, max_lifetime: u64) -> Self {
        self.lifetimes.push(Some(max_lifetime));
        self
    }

    /// Appends a tier without a max lifetime.
    pub fn unbounded(mut self) -> Self {
        self.lifetimes.push(None);
        self
    }

    pub fn build(self) -> MemoryChain {
        let tiers: Vec<Arc<MemoryStore>> = self
            .lifetimes
            .iter()
            .map(|_| Arc::new(MemoryStore::new()))
            .collect();
        let stores = tiers
            .iter()
            .map(|tier| Arc::clone(tier) as Arc<dyn KeyValueStore>)
            .collect();
        let store = LayeredStore::new(stores, self.lifetimes);
        MemoryChain { tiers, store }
    }
}

/// `memory:10 -> memory:60 -> memory` (authoritative, unbounded).
pub fn three_memory_tiers() -> MemoryChain {
    MemoryChainBuilder::new()
        .tier(FRONT_MAX_LIFETIME)
        .tier(MIDDLE_MAX_LIFETIME)
        .unbounded()
        .build()
}

pub fn keys(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
