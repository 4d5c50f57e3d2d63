//! Configuration error types.

use thiserror::Error;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A tier entry in `CASCADE_TIERS` has no backend kind.
    #[error("invalid tier spec '{value}': expected kind[:max_lifetime_secs]")]
    InvalidTierSpec { value: String },

    /// A tier max lifetime could not be parsed as seconds.
    #[error("failed to parse max lifetime '{value}': {source}")]
    LifetimeParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Memory capacity string could not be parsed as a number.
    #[error("failed to parse memory capacity '{value}': {source}")]
    CapacityParseError {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// Memory tiers need room for at least one entry.
    #[error("invalid memory capacity {value}: must be at least 1")]
    InvalidCapacity { value: u64 },
}
