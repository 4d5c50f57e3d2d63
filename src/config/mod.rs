//! Environment-backed configuration.
//!
//! Defaults describe a two-tier chain of memory stores. Override with
//! `CASCADE_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::fmt;
use std::str::FromStr;

/// Backend kind for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TierKind {
    /// In-process [`crate::store::MemoryStore`].
    Memory,
    /// Adapter supplied by the application, looked up by name
    /// (e.g. `redis`, `memcached`, `couchbase`, `sql`).
    External(String),
}

impl FromStr for TierKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" => Err(ConfigError::InvalidTierSpec {
                value: s.to_string(),
            }),
            "memory" | "mem" => Ok(Self::Memory),
            other => Ok(Self::External(other.to_string())),
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierKind::Memory => write!(f, "memory"),
            TierKind::External(name) => write!(f, "{}", name),
        }
    }
}

/// One configured tier: backend kind plus optional max lifetime (seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSpec {
    pub kind: TierKind,
    /// `None` means unbounded (no TTL clamping for this tier).
    pub max_lifetime: Option<u64>,
}

impl TierSpec {
    pub fn new(kind: TierKind, max_lifetime: Option<u64>) -> Self {
        Self { kind, max_lifetime }
    }
}

impl FromStr for TierSpec {
    type Err = ConfigError;

    /// Parses `kind` or `kind:max_lifetime_secs` (`kind:unbounded` is accepted too).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, lifetime) = match s.split_once(':') {
            Some((kind, lifetime)) => (kind, Some(lifetime.trim())),
            None => (s, None),
        };

        let kind = kind.parse::<TierKind>()?;
        let max_lifetime = match lifetime {
            None | Some("") | Some("unbounded") => None,
            Some(value) => Some(value.parse::<u64>().map_err(|e| {
                ConfigError::LifetimeParseError {
                    value: value.to_string(),
                    source: e,
                }
            })?),
        };

        Ok(Self { kind, max_lifetime })
    }
}

/// Layered store configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `CASCADE_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tiers, nearest first. Default: `memory:300,memory`.
    pub tiers: Vec<TierSpec>,

    /// Max entries per memory tier. Default: `10_000`.
    pub memory_capacity: u64,
}

/// Default max lifetime of the front memory tier.
pub const DEFAULT_FRONT_MAX_LIFETIME_SECS: u64 = 300;

/// Default max entries per memory tier.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

impl Default for Config {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierSpec::new(TierKind::Memory, Some(DEFAULT_FRONT_MAX_LIFETIME_SECS)),
                TierSpec::new(TierKind::Memory, None),
            ],
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl Config {
    const ENV_TIERS: &'static str = "CASCADE_TIERS";
    const ENV_MEMORY_CAPACITY: &'static str = "CASCADE_MEMORY_CAPACITY";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let tiers = Self::parse_tiers_from_env(defaults.tiers)?;
        let memory_capacity = Self::parse_capacity_from_env(defaults.memory_capacity)?;

        Ok(Self {
            tiers,
            memory_capacity,
        })
    }

    /// Validates basic invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let has_memory = self.tiers.iter().any(|t| t.kind == TierKind::Memory);
        if has_memory && self.memory_capacity == 0 {
            return Err(ConfigError::InvalidCapacity {
                value: self.memory_capacity,
            });
        }
        Ok(())
    }

    /// Max lifetimes in tier order, parallel to [`Config::tiers`].
    pub fn max_lifetimes(&self) -> Vec<Option<u64>> {
        self.tiers.iter().map(|t| t.max_lifetime).collect()
    }

    /// Parses a comma-separated tier list such as `memory:10,redis:3600,sql`.
    pub fn parse_tiers(value: &str) -> Result<Vec<TierSpec>, ConfigError> {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect()
    }

    fn parse_tiers_from_env(default: Vec<TierSpec>) -> Result<Vec<TierSpec>, ConfigError> {
        match env::var(Self::ENV_TIERS) {
            Ok(value) => Self::parse_tiers(&value),
            Err(_) => Ok(default),
        }
    }

    fn parse_capacity_from_env(default: u64) -> Result<u64, ConfigError> {
        match env::var(Self::ENV_MEMORY_CAPACITY) {
            Ok(value) => {
                let capacity: u64 =
                    value
                        .trim()
                        .parse()
                        .map_err(|e| ConfigError::CapacityParseError {
                            value: value.clone(),
                            source: e,
                        })?;

                if capacity == 0 {
                    return Err(ConfigError::InvalidCapacity { value: capacity });
                }

                Ok(capacity)
            }
            Err(_) => Ok(default),
        }
    }
}
