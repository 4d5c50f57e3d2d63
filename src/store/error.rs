use thiserror::Error;

#[derive(Debug, Error)]
/// Errors returned by a [`super::KeyValueStore`].
///
/// A missing key or a failed precondition (`add` on an existing key, `replace`
/// on an absent one) is never an error; those come back as `Ok(None)` or
/// `Ok(false)`.
pub enum StoreError {
    /// The backend could not serve the request (timeout, connectivity, capacity).
    #[error("backend failure: {reason}")]
    Backend {
        /// Error message.
        reason: String,
    },

    /// The operation has no meaningful result for this store configuration.
    #[error("unsupported operation '{operation}': {reason}")]
    Unsupported {
        /// Operation name.
        operation: &'static str,
        /// Why it cannot run.
        reason: String,
    },

    /// A counter operation hit a value that is not a decimal integer.
    #[error("value at '{key}' is not a counter")]
    NotACounter {
        /// Offending key.
        key: String,
    },

    /// A tier could not provide the named sub-collection.
    #[error("failed to derive collection '{name}': {reason}")]
    Collection {
        /// Collection name.
        name: String,
        /// Error message.
        reason: String,
    },
}

impl StoreError {
    /// Shorthand for [`StoreError::Backend`].
    pub fn backend(reason: impl Into<String>) -> Self {
        StoreError::Backend {
            reason: reason.into(),
        }
    }
}

/// Convenience result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
