//! Common test utilities for controller integration tests.

#![allow(dead_code, clippy::unwrap_used)]

pub mod fixtures;

use std::sync::Arc;
use std::time::Duration;

use helm_controller::queue::WorkQueue;
use helm_controller::store::{IntentLister, MemoryIntentStore};
use helm_controller::{Controller, DeploymentIntent, ResourceKey};

use fixtures::{test_chart, RecordingReleases, RecordingStatus};

/// A controller wired to recording fakes and an in-memory store.
pub struct TestController {
    pub store: Arc<MemoryIntentStore>,
    pub releases: Arc<RecordingReleases>,
    pub status: Arc<RecordingStatus>,
    pub controller: Arc<Controller>,
}

impl TestController {
    /// Creates a controller with the default queue.
    pub fn new() -> Self {
        Self::with_queue(WorkQueue::new())
    }

    /// Creates a controller that uses `queue`.
    pub fn with_queue(queue: WorkQueue<String>) -> Self {
        let store = Arc::new(MemoryIntentStore::new());
        let releases = Arc::new(RecordingReleases::new());
        let status = Arc::new(RecordingStatus::new(Arc::clone(&store)));

        let controller = Controller::new(
            Arc::clone(&store) as _,
            Arc::clone(&status) as _,
            Arc::clone(&releases) as _,
            Arc::new(test_chart()),
        )
        .with_queue(queue);

        Self {
            store,
            releases,
            status,
            controller: Arc::new(controller),
        }
    }

    /// Stores an intent as an external actor would.
    pub fn apply(&self, intent: DeploymentIntent) -> Arc<DeploymentIntent> {
        self.store.apply(intent).unwrap()
    }

    /// Reads the stored intent for `key`.
    pub async fn stored(&self, key: &str) -> Arc<DeploymentIntent> {
        let key: ResourceKey = key.parse().unwrap();
        self.store.get(&key).await.unwrap().unwrap()
    }
}

impl Default for TestController {
    fn default() -> Self {
        Self::new()
    }
}

/// Polls `condition` until it holds, panicking after `timeout`.
pub async fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}
