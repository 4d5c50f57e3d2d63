//! Expiry values in the memcached convention.
//!
//! Backends that speak raw integers (memcached, Couchbase) interpret an expiry
//! of `0` as "never", anything up to 30 days as a relative TTL in seconds, and
//! anything larger as an absolute Unix timestamp. [`Expiry`] keeps the three
//! cases apart so the layered store can clamp only the relative one.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Raw expiry values above this (30 days in seconds) are absolute timestamps.
pub const ABSOLUTE_EXPIRY_THRESHOLD_SECS: u64 = 30 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
/// When a stored value stops being visible.
pub enum Expiry {
    #[default]
    /// No expiry (or the backend's own default).
    Never,
    /// Relative TTL in seconds.
    After(u64),
    /// Absolute Unix timestamp in seconds.
    At(u64),
}

impl Expiry {
    /// Interprets a raw seconds value using the memcached convention.
    pub fn from_secs(raw: u64) -> Self {
        match raw {
            0 => Expiry::Never,
            secs if secs > ABSOLUTE_EXPIRY_THRESHOLD_SECS => Expiry::At(secs),
            secs => Expiry::After(secs),
        }
    }

    /// Relative TTL from a [`Duration`] (sub-second precision is dropped).
    ///
    /// Durations longer than 30 days cannot be expressed relatively; they are
    /// converted to an absolute timestamp so the raw encoding stays unambiguous.
    pub fn after(ttl: Duration) -> Self {
        let secs = ttl.as_secs();
        if secs > ABSOLUTE_EXPIRY_THRESHOLD_SECS {
            Expiry::At(unix_now().saturating_add(secs))
        } else if secs == 0 {
            // A zero relative TTL would read back as "never".
            Expiry::After(1)
        } else {
            Expiry::After(secs)
        }
    }

    /// Returns the raw seconds value (inverse of [`Expiry::from_secs`]).
    pub fn as_secs(&self) -> u64 {
        match self {
            Expiry::Never => 0,
            Expiry::After(secs) | Expiry::At(secs) => *secs,
        }
    }

    #[inline]
    pub fn is_never(&self) -> bool {
        matches!(self, Expiry::Never)
    }

    #[inline]
    pub fn is_absolute(&self) -> bool {
        matches!(self, Expiry::At(_))
    }

    /// Time left from now, `None` for [`Expiry::Never`].
    ///
    /// An absolute timestamp in the past yields [`Duration::ZERO`].
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Expiry::Never => None,
            Expiry::After(secs) => Some(Duration::from_secs(*secs)),
            Expiry::At(timestamp) => Some(Duration::from_secs(
                timestamp.saturating_sub(unix_now()),
            )),
        }
    }
}

impl From<u64> for Expiry {
    fn from(raw: u64) -> Self {
        Expiry::from_secs(raw)
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
