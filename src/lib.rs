//! Cascade: a layered key-value store.
//!
//! Chains independent key-value backends (in-process cache first, durable
//! store last) behind one [`KeyValueStore`] interface:
//!
//! - reads fall through the chain and promote hits into the faster tiers;
//! - writes go authoritative tier first, with best-effort rollback when a
//!   tier refuses;
//! - each tier clamps relative TTLs to its own max lifetime;
//! - counters live on the authoritative tier only;
//! - compare-and-set is weak (read, compare fingerprint, write through).
//!
//! # Public API Surface
//!
//! ## Core Types
//! - [`LayeredStore`], [`TierChain`], [`Tier`] - Tier coordination
//! - [`KeyValueStore`], [`Item`], [`CasToken`], [`Expiry`] - Backend contract
//! - [`StoreError`], [`StoreResult`] - Errors
//!
//! ## Backends & Wiring
//! - [`MemoryStore`] - In-process reference backend
//! - [`Config`], [`TierSpec`], [`TierKind`] - Environment configuration
//! - [`ExternalStores`], [`build_store`] - Tier factory
//!
//! ## Test/Mock Support
//! [`MockStore`] is available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod config;
pub mod hashing;
pub mod layered;
pub mod store;

pub use config::{Config, ConfigError, TierKind, TierSpec};
pub use hashing::keyed_fingerprint;
pub use layered::{LayeredStore, Tier, TierChain, clamp_expiry};
#[cfg(any(test, feature = "mock"))]
pub use store::{MockOp, MockStore, OpLog};
pub use store::{
    ABSOLUTE_EXPIRY_THRESHOLD_SECS, CasToken, Expiry, ExternalStores, Item, KeyValueStore,
    MemoryStore, StoreError, StoreResult, build_store, decode_counter, encode_counter,
};
