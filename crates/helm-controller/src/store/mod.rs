//! Intent storage and change notification.
//!
//! The controller reads intents through an [`IntentLister`], a read-only
//! cache owned by the notification source, and writes status through a
//! [`StatusWriter`]. Cached intents are shared `Arc` snapshots: the
//! controller never mutates them, it clones one and submits the copy.

mod directory;
mod memory;

pub use directory::{DirectoryIntentSource, SyncSummary};
pub use memory::MemoryIntentStore;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::ControllerResult;
use crate::types::{DeploymentIntent, ResourceKey};

/// A change notification for a tracked intent.
#[derive(Debug, Clone)]
pub enum IntentEvent {
    /// An intent was created.
    Added(Arc<DeploymentIntent>),
    /// An intent changed.
    Updated {
        /// State before the change.
        old: Arc<DeploymentIntent>,
        /// State after the change.
        new: Arc<DeploymentIntent>,
    },
    /// An intent was deleted.
    Deleted(DeletedObject),
}

/// Payload of a deletion notification.
#[derive(Debug, Clone)]
pub enum DeletedObject {
    /// The last known state of the deleted intent.
    Intent(Arc<DeploymentIntent>),
    /// Something that is not an intent.
    Unknown {
        /// What was received, for logging.
        description: String,
    },
}

/// Read-only view of the intent cache.
#[async_trait]
pub trait IntentLister: Send + Sync {
    /// Look up an intent by key.
    ///
    /// Returns `None` if the intent does not exist (for example because it
    /// was deleted after its key was queued).
    async fn get(&self, key: &ResourceKey) -> ControllerResult<Option<Arc<DeploymentIntent>>>;

    /// List every cached intent.
    async fn list(&self) -> ControllerResult<Vec<Arc<DeploymentIntent>>>;

    /// Whether the cache has completed its initial population.
    fn has_synced(&self) -> bool;
}

/// Write path for intent status.
#[async_trait]
pub trait StatusWriter: Send + Sync {
    /// Persist the status of `intent`.
    ///
    /// Only the status is taken from the submitted copy; its spec is
    /// ignored. The copy's resource version must match the stored one.
    async fn update_status(&self, intent: &DeploymentIntent) -> ControllerResult<()>;
}

/// Source of change notifications.
pub trait IntentEvents: Send + Sync {
    /// Subscribe to notifications emitted from now on.
    fn subscribe(&self) -> broadcast::Receiver<IntentEvent>;
}
