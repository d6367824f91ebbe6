//! Test fixtures for controller integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use helm_controller::release::{Chart, ChartMetadata, Release, ReleaseManager, ReleaseValues, Values};
use helm_controller::store::{MemoryIntentStore, StatusWriter};
use helm_controller::{ControllerError, ControllerResult, DeploymentIntent, MemoryReleaseManager};

/// The base chart used by every test: `nginx`, one replica.
pub fn test_chart() -> Chart {
    Chart {
        metadata: ChartMetadata {
            name: "base".to_owned(),
            version: "0.1.0".to_owned(),
            description: Some("test chart".to_owned()),
        },
        values: ReleaseValues::new("nginx", 1).to_values(),
    }
}

/// Builder for creating test DeploymentIntent instances.
pub struct IntentBuilder {
    namespace: String,
    name: String,
    image: String,
    replicas: Option<i32>,
}

impl IntentBuilder {
    /// Creates a builder for `namespace/name` running `app:v1`.
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            image: "app:v1".to_owned(),
            replicas: None,
        }
    }

    /// Sets the image.
    pub fn with_image(mut self, image: &str) -> Self {
        self.image = image.to_owned();
        self
    }

    /// Sets the replica count.
    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = Some(replicas);
        self
    }

    /// Builds the intent.
    pub fn build(self) -> DeploymentIntent {
        DeploymentIntent::new(self.namespace, self.name, self.image, self.replicas)
    }
}

/// A call made against the release manager.
#[derive(Debug, Clone, PartialEq)]
pub enum ReleaseCall {
    Get { namespace: String, name: String },
    Install { namespace: String, name: String, values: Values },
    Upgrade { namespace: String, name: String, values: Values },
    Uninstall { namespace: String, name: String },
}

/// Release manager that records every call and can be told to fail.
///
/// Successful calls are served by a [`MemoryReleaseManager`].
#[derive(Default)]
pub struct RecordingReleases {
    pub inner: MemoryReleaseManager,
    calls: Mutex<Vec<ReleaseCall>>,
    fail_get: Mutex<Option<String>>,
    fail_apply: Mutex<Option<String>>,
    get_delay: Mutex<Option<Duration>>,
    panic_get: Mutex<Option<(String, String)>>,
    panics: AtomicUsize,
    in_flight: Mutex<HashMap<(String, String), usize>>,
    max_in_flight: AtomicUsize,
}

impl RecordingReleases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a deployed release with the given managed values.
    pub async fn seed(&self, namespace: &str, name: &str, values: ReleaseValues) {
        self.inner
            .install(namespace, name, &test_chart(), values.to_values())
            .await
            .unwrap();
    }

    /// Makes every `get` fail with `message`.
    pub fn fail_get(&self, message: &str) {
        *self.fail_get.lock().unwrap() = Some(message.to_owned());
    }

    /// Makes every install and upgrade fail with `message`.
    pub fn fail_apply(&self, message: &str) {
        *self.fail_apply.lock().unwrap() = Some(message.to_owned());
    }

    /// Makes every `get` take `delay`.
    pub fn delay_get(&self, delay: Duration) {
        *self.get_delay.lock().unwrap() = Some(delay);
    }

    /// Makes the next `get` of `namespace/name` panic.
    pub fn panic_on_get(&self, namespace: &str, name: &str) {
        *self.panic_get.lock().unwrap() = Some((namespace.to_owned(), name.to_owned()));
    }

    /// Number of `get` calls that panicked.
    pub fn panics(&self) -> usize {
        self.panics.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<ReleaseCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Install and upgrade calls only.
    pub fn mutations(&self) -> Vec<ReleaseCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, ReleaseCall::Install { .. } | ReleaseCall::Upgrade { .. }))
            .collect()
    }

    pub fn uninstalls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, ReleaseCall::Uninstall { .. }))
            .count()
    }

    /// Highest number of concurrent `get` calls seen for any single release.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: ReleaseCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn apply_error(&self) -> Option<ControllerError> {
        self.fail_apply
            .lock()
            .unwrap()
            .as_ref()
            .map(|m| ControllerError::release(m.clone()))
    }
}

#[async_trait]
impl ReleaseManager for RecordingReleases {
    async fn get(&self, namespace: &str, name: &str) -> ControllerResult<Option<Release>> {
        self.record(ReleaseCall::Get {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        });

        let id = (namespace.to_owned(), name.to_owned());
        let crash = {
            let mut target = self.panic_get.lock().unwrap();
            if target.as_ref() == Some(&id) {
                target.take();
                true
            } else {
                false
            }
        };
        if crash {
            self.panics.fetch_add(1, Ordering::SeqCst);
            panic!("release backend crashed on {namespace}/{name}");
        }
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let count = in_flight.entry(id.clone()).or_insert(0);
            *count += 1;
            self.max_in_flight.fetch_max(*count, Ordering::SeqCst);
        }

        let delay = *self.get_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(count) = self.in_flight.lock().unwrap().get_mut(&id) {
            *count -= 1;
        }

        let failure = self.fail_get.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(ControllerError::release(message));
        }
        self.inner.get(namespace, name).await
    }

    async fn install(
        &self,
        namespace: &str,
        name: &str,
        chart: &Chart,
        values: Values,
    ) -> ControllerResult<Release> {
        self.record(ReleaseCall::Install {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            values: values.clone(),
        });
        if let Some(e) = self.apply_error() {
            return Err(e);
        }
        self.inner.install(namespace, name, chart, values).await
    }

    async fn upgrade(
        &self,
        namespace: &str,
        name: &str,
        chart: &Chart,
        values: Values,
    ) -> ControllerResult<Release> {
        self.record(ReleaseCall::Upgrade {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
            values: values.clone(),
        });
        if let Some(e) = self.apply_error() {
            return Err(e);
        }
        self.inner.upgrade(namespace, name, chart, values).await
    }

    async fn uninstall(&self, namespace: &str, name: &str) -> ControllerResult<()> {
        self.record(ReleaseCall::Uninstall {
            namespace: namespace.to_owned(),
            name: name.to_owned(),
        });
        self.inner.uninstall(namespace, name).await
    }

    async fn list_deployed(&self) -> ControllerResult<Vec<Release>> {
        self.inner.list_deployed().await
    }
}

/// Status writer that records submitted copies before passing them to the
/// store, or fails when told to.
pub struct RecordingStatus {
    store: Arc<MemoryIntentStore>,
    writes: Mutex<Vec<DeploymentIntent>>,
    fail: AtomicBool,
}

impl RecordingStatus {
    pub fn new(store: Arc<MemoryIntentStore>) -> Self {
        Self {
            store,
            writes: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    /// Makes every status write fail.
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<DeploymentIntent> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusWriter for RecordingStatus {
    async fn update_status(&self, intent: &DeploymentIntent) -> ControllerResult<()> {
        self.writes.lock().unwrap().push(intent.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(ControllerError::store("status store unavailable"));
        }
        self.store.update_status(intent).await
    }
}
