//! Error types for release-inventory.

use helm_controller::ControllerError;

/// Result type alias using [`InventoryError`].
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Errors that can occur while building an inventory report.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    /// The release service failed.
    #[error(transparent)]
    Release(#[from] ControllerError),

    /// A release manifest could not be turned into objects.
    #[error("invalid manifest for release {release}: {reason}")]
    Manifest {
        /// `namespace/name` of the release.
        release: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The live object does not exist.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// Report serialisation failed.
    #[error("serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    /// Writing the report failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
