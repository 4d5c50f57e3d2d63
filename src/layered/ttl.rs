//! Per-tier expiry policy.

use crate::store::Expiry;

/// Translates a caller expiry into the expiry a tier with `max_lifetime` gets.
///
/// - absolute timestamps pass through unmodified;
/// - [`Expiry::Never`] passes through unmodified. It keeps its "no TTL"
///   meaning even on a bounded tier and is never clamped;
/// - relative TTLs are clamped to `max_lifetime` (unchanged on unbounded tiers).
#[inline]
pub fn clamp_expiry(max_lifetime: Option<u64>, requested: Expiry) -> Expiry {
    match (requested, max_lifetime) {
        (Expiry::After(secs), Some(max)) => Expiry::After(secs.min(max)),
        (requested, _) => requested,
    }
}
