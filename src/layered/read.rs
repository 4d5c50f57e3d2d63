//! Read-through with write-back promotion.

use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument, warn};

use super::LayeredStore;
use crate::store::{Expiry, Item};

impl LayeredStore {
    /// Returns the first hit scanning nearest to authoritative, after copying
    /// it into every faster tier.
    ///
    /// A tier error counts as a miss. The token is computed here from the value
    /// found, not taken from the tier that served it.
    #[instrument(skip(self), fields(tiers = self.chain.len()))]
    pub(super) async fn read_through(&self, key: &str) -> Option<Item> {
        for (index, tier) in self.chain.tiers().iter().enumerate() {
            match tier.store().get(key).await {
                Ok(Some(item)) => {
                    debug!(tier = index, "hit");
                    let value = item.into_value();
                    self.promote(key, &value, index).await;
                    return Some(Item::new(key, value));
                }
                Ok(None) => debug!(tier = index, "miss"),
                Err(e) => warn!(tier = index, error = %e, "tier read failed, falling through"),
            }
        }

        debug!("miss on every tier");
        None
    }

    /// Best-effort write-back of `value` into tiers `hit - 1 ..= 0`.
    ///
    /// The original write's TTL is unknown here, so no expiry is passed and
    /// each tier applies its own default.
    async fn promote(&self, key: &str, value: &[u8], hit: usize) {
        for index in (0..hit).rev() {
            let Some(tier) = self.chain.tier(index) else {
                continue;
            };
            match tier.store().set(key, value, Expiry::Never).await {
                Ok(true) => debug!(tier = index, from = hit, "promoted"),
                Ok(false) => warn!(tier = index, from = hit, "promotion rejected"),
                Err(e) => warn!(tier = index, from = hit, error = %e, "promotion failed"),
            }
        }
    }

    /// Resolves as many of `keys` as any tier holds, asking each tier only for
    /// the keys still missing, then promotes each tier's hits into every faster
    /// tier with one batched write per tier pair.
    #[instrument(skip(self, keys), fields(tiers = self.chain.len(), keys = keys.len()))]
    pub(super) async fn read_through_multi(&self, keys: &[String]) -> HashMap<String, Vec<u8>> {
        let mut seen = HashSet::with_capacity(keys.len());
        let mut missing: Vec<String> = keys
            .iter()
            .filter(|key| seen.insert(key.as_str()))
            .cloned()
            .collect();

        let mut found: HashMap<String, Vec<u8>> = HashMap::with_capacity(missing.len());
        // (origin tier, pairs it resolved)
        let mut resolved_by: Vec<(usize, HashMap<String, Vec<u8>>)> = Vec::new();

        for (index, tier) in self.chain.tiers().iter().enumerate() {
            if missing.is_empty() {
                break;
            }

            let mut hits = match tier.store().get_multi(&missing).await {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(tier = index, error = %e, "tier batch read failed, falling through");
                    continue;
                }
            };

            // Only keep keys we actually asked this tier for.
            hits.retain(|key, _| missing.contains(key));
            if hits.is_empty() {
                debug!(tier = index, "no hits");
                continue;
            }

            debug!(tier = index, hits = hits.len(), "resolved keys");
            missing.retain(|key| !hits.contains_key(key));
            found.extend(hits.iter().map(|(k, v)| (k.clone(), v.clone())));
            resolved_by.push((index, hits));
        }

        for (origin, pairs) in &resolved_by {
            self.promote_batch(pairs, *origin).await;
        }

        found
    }

    async fn promote_batch(&self, pairs: &HashMap<String, Vec<u8>>, origin: usize) {
        for index in (0..origin).rev() {
            let Some(tier) = self.chain.tier(index) else {
                continue;
            };
            match tier.store().set_multi(pairs, Expiry::Never).await {
                Ok(results) => {
                    let rejected = results.values().filter(|ok| !**ok).count();
                    if rejected > 0 {
                        warn!(tier = index, from = origin, rejected, "batch promotion partly rejected");
                    } else {
                        debug!(tier = index, from = origin, keys = pairs.len(), "promoted batch");
                    }
                }
                Err(e) => warn!(tier = index, from = origin, error = %e, "batch promotion failed"),
            }
        }
    }
}
