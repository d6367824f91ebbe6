//! Error types for helm-controller.

/// Result type alias using [`ControllerError`].
pub type ControllerResult<T> = Result<T, ControllerError>;

/// Errors that can occur while reconciling deployment intents.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// A queue key could not be split into namespace and name.
    #[error("invalid resource key: {0}")]
    InvalidKey(String),

    /// The intent is missing a required field.
    #[error("{key}: {reason}")]
    Validation {
        /// Key of the offending intent.
        key: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The release subsystem rejected or failed an operation.
    #[error("release error: {0}")]
    Release(String),

    /// The coalesced release values do not have the expected shape.
    #[error("unable to decode release values: {0}")]
    ValuesDecode(String),

    /// The base chart could not be loaded.
    #[error("failed to load chart from {path}: {reason}")]
    ChartLoad {
        /// Chart directory.
        path: String,
        /// Underlying failure.
        reason: String,
    },

    /// Intent store failure.
    #[error("store error: {0}")]
    Store(String),

    /// Intent not found in the store.
    #[error("intent not found: {0}")]
    IntentNotFound(String),

    /// Optimistic concurrency check failed on a status write.
    #[error("conflict updating {key}: resource version {submitted} is stale (current {current})")]
    Conflict {
        /// Key of the intent.
        key: String,
        /// Version carried by the submitted copy.
        submitted: u64,
        /// Version currently held by the store.
        current: u64,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serialisation(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControllerError {
    /// Create a release error.
    #[must_use]
    pub fn release(msg: impl Into<String>) -> Self {
        Self::Release(msg.into())
    }

    /// Create a store error.
    #[must_use]
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether retrying the same key later could succeed.
    ///
    /// Malformed keys and validation failures need an external edit before
    /// anything changes, so they are dropped instead of requeued.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidKey(_) | Self::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_errors_are_not_retryable() {
        assert!(!ControllerError::InvalidKey("a/b/c".to_owned()).is_retryable());
        assert!(!ControllerError::Validation {
            key: "ns/foo".to_owned(),
            reason: "image name must be specified".to_owned(),
        }
        .is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ControllerError::release("timeout").is_retryable());
        assert!(ControllerError::store("unavailable").is_retryable());
        assert!(ControllerError::ValuesDecode("missing image".to_owned()).is_retryable());
    }

    #[test]
    fn validation_message_includes_key() {
        let err = ControllerError::Validation {
            key: "ns/foo".to_owned(),
            reason: "image name must be specified".to_owned(),
        };
        assert_eq!(err.to_string(), "ns/foo: image name must be specified");
    }
}
