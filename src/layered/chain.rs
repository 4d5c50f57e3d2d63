//! Ordered, immutable chain of tiers.

use std::sync::Arc;

use tracing::{info, warn};

use super::ttl::clamp_expiry;
use crate::store::{Expiry, KeyValueStore};

/// One position in the chain: a store plus its max lifetime.
#[derive(Clone)]
pub struct Tier {
    store: Arc<dyn KeyValueStore>,
    max_lifetime: Option<u64>,
}

impl Tier {
    /// A max lifetime of `0` means unbounded, as with raw memcached expiries.
    pub fn new(store: Arc<dyn KeyValueStore>, max_lifetime: Option<u64>) -> Self {
        Self {
            store,
            max_lifetime: max_lifetime.filter(|&max| max > 0),
        }
    }

    #[inline]
    pub fn store(&self) -> &dyn KeyValueStore {
        self.store.as_ref()
    }

    #[inline]
    pub fn max_lifetime(&self) -> Option<u64> {
        self.max_lifetime
    }

    /// Expiry this tier receives for a caller-requested expiry.
    #[inline]
    pub fn adapter_expire(&self, requested: Expiry) -> Expiry {
        clamp_expiry(self.max_lifetime, requested)
    }
}

impl std::fmt::Debug for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tier")
            .field("max_lifetime", &self.max_lifetime)
            .finish()
    }
}

/// Tiers ordered nearest first; the last tier is authoritative.
#[derive(Clone, Default)]
pub struct TierChain {
    tiers: Vec<Tier>,
}

impl TierChain {
    /// Builds a chain from candidates and a parallel list of max lifetimes.
    ///
    /// Lifetimes pair with candidates by input position; a missing lifetime is
    /// unbounded. `None` candidates (backends that could not be provided) are
    /// dropped together with their lifetime, and the survivors keep their order.
    pub fn from_candidates<I, L>(candidates: I, max_lifetimes: L) -> Self
    where
        I: IntoIterator<Item = Option<Arc<dyn KeyValueStore>>>,
        L: IntoIterator,
        L::Item: Into<Option<u64>>,
    {
        let mut lifetimes = max_lifetimes.into_iter().map(Into::into);
        let mut tiers = Vec::new();
        let mut dropped = 0usize;

        for (position, candidate) in candidates.into_iter().enumerate() {
            let max_lifetime = lifetimes.next().flatten();
            match candidate {
                Some(store) => tiers.push(Tier::new(store, max_lifetime)),
                None => {
                    warn!(position, "dropping tier candidate without a usable backend");
                    dropped += 1;
                }
            }
        }

        info!(tiers = tiers.len(), dropped, "built tier chain");
        Self { tiers }
    }

    /// Builds a chain from stores that are all known to be usable.
    pub fn new<L>(stores: Vec<Arc<dyn KeyValueStore>>, max_lifetimes: L) -> Self
    where
        L: IntoIterator,
        L::Item: Into<Option<u64>>,
    {
        Self::from_candidates(stores.into_iter().map(Some), max_lifetimes)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    #[inline]
    pub fn tier(&self, index: usize) -> Option<&Tier> {
        self.tiers.get(index)
    }

    #[inline]
    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    /// Index and tier of the last (authoritative) tier.
    pub fn authoritative(&self) -> Option<(usize, &Tier)> {
        self.tiers.last().map(|tier| (self.tiers.len() - 1, tier))
    }

    /// Max lifetimes in tier order (after filtering).
    pub fn max_lifetimes(&self) -> Vec<Option<u64>> {
        self.tiers.iter().map(Tier::max_lifetime).collect()
    }

    /// Expiry tier `index` receives for `requested`; out-of-range is unclamped.
    pub fn adapter_expire(&self, index: usize, requested: Expiry) -> Expiry {
        match self.tiers.get(index) {
            Some(tier) => tier.adapter_expire(requested),
            None => requested,
        }
    }

    /// New chain over `stores` reusing this chain's max lifetimes position by position.
    pub fn derive(&self, stores: Vec<Arc<dyn KeyValueStore>>) -> Self {
        let tiers = stores
            .into_iter()
            .zip(self.tiers.iter())
            .map(|(store, tier)| Tier::new(store, tier.max_lifetime))
            .collect();
        Self { tiers }
    }
}

impl std::fmt::Debug for TierChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TierChain")
            .field("tiers", &self.tiers.len())
            .field("max_lifetimes", &self.max_lifetimes())
            .finish()
    }
}
