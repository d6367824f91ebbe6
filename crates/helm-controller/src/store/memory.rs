//! In-memory intent store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use super::{DeletedObject, IntentEvent, IntentEvents, IntentLister, StatusWriter};
use crate::error::{ControllerError, ControllerResult};
use crate::types::{DeploymentIntent, ResourceKey};

const EVENT_CAPACITY: usize = 1024;

/// In-memory intent store that emits change notifications.
///
/// Acts as cache, status store and notification source at once. Stored
/// intents are immutable snapshots that get replaced on every change, so
/// readers holding an `Arc` never observe a partial write.
#[derive(Debug)]
pub struct MemoryIntentStore {
    intents: RwLock<BTreeMap<ResourceKey, Arc<DeploymentIntent>>>,
    events: broadcast::Sender<IntentEvent>,
    synced: AtomicBool,
}

impl Default for MemoryIntentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIntentStore {
    /// Create an empty store that reports itself as synced.
    #[must_use]
    pub fn new() -> Self {
        let store = Self::unsynced();
        store.mark_synced();
        store
    }

    /// Create an empty store that is not synced until [`Self::mark_synced`].
    #[must_use]
    pub fn unsynced() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            intents: RwLock::new(BTreeMap::new()),
            events,
            synced: AtomicBool::new(false),
        }
    }

    /// Mark the initial population as complete.
    pub fn mark_synced(&self) {
        self.synced.store(true, Ordering::Release);
    }

    /// Create or update an intent's spec, as an external actor would.
    ///
    /// The stored status and resource version are kept; the version is
    /// bumped only if the spec actually changed.
    pub fn apply(&self, intent: DeploymentIntent) -> ControllerResult<Arc<DeploymentIntent>> {
        let key = intent.key();
        let mut intents = self
            .intents
            .write()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;

        let (stored, event) = match intents.get(&key).cloned() {
            Some(current) if current.spec == intent.spec => return Ok(current),
            Some(current) => {
                let mut next = (*current).clone();
                next.spec = intent.spec;
                next.metadata.resource_version = current.metadata.resource_version + 1;
                let next = Arc::new(next);
                let event = IntentEvent::Updated {
                    old: current,
                    new: Arc::clone(&next),
                };
                (next, event)
            }
            None => {
                let mut next = intent;
                next.metadata.resource_version = 1;
                let next = Arc::new(next);
                (Arc::clone(&next), IntentEvent::Added(next))
            }
        };
        intents.insert(key.clone(), Arc::clone(&stored));
        drop(intents);

        debug!(key = %key, version = stored.metadata.resource_version, "intent applied");
        self.emit(event);
        Ok(stored)
    }

    /// Delete an intent, emitting a deletion notification if it existed.
    pub fn remove(&self, key: &ResourceKey) -> ControllerResult<Option<Arc<DeploymentIntent>>> {
        let removed = self
            .intents
            .write()
            .map_err(|_| ControllerError::internal("lock poisoned"))?
            .remove(key);

        if let Some(intent) = &removed {
            debug!(key = %key, "intent removed");
            self.emit(IntentEvent::Deleted(DeletedObject::Intent(Arc::clone(intent))));
        }
        Ok(removed)
    }

    /// Current snapshot of an intent.
    pub fn intent(&self, key: &ResourceKey) -> ControllerResult<Option<Arc<DeploymentIntent>>> {
        let intents = self
            .intents
            .read()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;
        Ok(intents.get(key).cloned())
    }

    /// Keys of every stored intent.
    pub fn keys(&self) -> ControllerResult<Vec<ResourceKey>> {
        let intents = self
            .intents
            .read()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;
        Ok(intents.keys().cloned().collect())
    }

    fn emit(&self, event: IntentEvent) {
        // No subscribers is fine: the controller lists on start.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl IntentLister for MemoryIntentStore {
    async fn get(&self, key: &ResourceKey) -> ControllerResult<Option<Arc<DeploymentIntent>>> {
        self.intent(key)
    }

    async fn list(&self) -> ControllerResult<Vec<Arc<DeploymentIntent>>> {
        let intents = self
            .intents
            .read()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;
        Ok(intents.values().cloned().collect())
    }

    fn has_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }
}

#[async_trait]
impl StatusWriter for MemoryIntentStore {
    async fn update_status(&self, intent: &DeploymentIntent) -> ControllerResult<()> {
        let key = intent.key();
        let mut intents = self
            .intents
            .write()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;

        let current = intents
            .get(&key)
            .ok_or_else(|| ControllerError::IntentNotFound(key.to_string()))?;

        let current_version = current.metadata.resource_version;
        if intent.metadata.resource_version != current_version {
            return Err(ControllerError::Conflict {
                key: key.to_string(),
                submitted: intent.metadata.resource_version,
                current: current_version,
            });
        }

        if current.status == intent.status {
            return Ok(());
        }

        let mut next = (**current).clone();
        next.status = intent.status.clone();
        next.metadata.resource_version = current_version + 1;
        let next = Arc::new(next);
        let old = intents.insert(key, Arc::clone(&next));
        drop(intents);

        if let Some(old) = old {
            self.emit(IntentEvent::Updated { old, new: next });
        }
        Ok(())
    }
}

impl IntentEvents for MemoryIntentStore {
    fn subscribe(&self) -> broadcast::Receiver<IntentEvent> {
        self.events.subscribe()
    }
}
