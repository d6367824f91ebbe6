//! The reconciliation controller.
//!
//! Notifications from the intent store are turned into keys on a
//! [`WorkQueue`]. A fixed number of workers drain the queue and converge
//! each key's release (see [`Controller::reconcile`]). Deletions skip the
//! queue and uninstall the release straight away.

mod reconcile;
mod status;

pub use reconcile::{plan, validate, Plan};
pub use status::outcome_status;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{ControllerError, ControllerResult};
use crate::queue::WorkQueue;
use crate::release::{Chart, ReleaseManager};
use crate::store::{DeletedObject, IntentEvent, IntentEvents, IntentLister, StatusWriter};
use crate::types::DeploymentIntent;

/// How often [`Controller::run`] checks whether the cache has synced.
const SYNC_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Pause before a worker that panicked is started again.
const WORKER_RESTART_DELAY: Duration = Duration::from_secs(1);

/// Reconciles deployment intents against releases.
pub struct Controller {
    queue: WorkQueue<String>,
    lister: Arc<dyn IntentLister>,
    status: Arc<dyn StatusWriter>,
    releases: Arc<dyn ReleaseManager>,
    chart: Arc<Chart>,
}

impl Controller {
    /// Create a controller with a default work queue.
    pub fn new(
        lister: Arc<dyn IntentLister>,
        status: Arc<dyn StatusWriter>,
        releases: Arc<dyn ReleaseManager>,
        chart: Arc<Chart>,
    ) -> Self {
        Self {
            queue: WorkQueue::new(),
            lister,
            status,
            releases,
            chart,
        }
    }

    /// Use `queue` instead of the default one.
    #[must_use]
    pub fn with_queue(mut self, queue: WorkQueue<String>) -> Self {
        self.queue = queue;
        self
    }

    /// The controller's work queue.
    #[must_use]
    pub const fn queue(&self) -> &WorkQueue<String> {
        &self.queue
    }

    /// Handle a newly created intent.
    pub fn on_add(&self, intent: &DeploymentIntent) {
        self.enqueue(intent);
    }

    /// Handle a changed intent.
    pub fn on_update(&self, _old: &DeploymentIntent, new: &DeploymentIntent) {
        self.enqueue(new);
    }

    /// Handle a deleted intent by uninstalling its release.
    ///
    /// Best effort: failures are logged and never retried.
    pub async fn on_delete(&self, deleted: DeletedObject) {
        let intent = match deleted {
            DeletedObject::Intent(intent) => intent,
            DeletedObject::Unknown { description } => {
                warn!(object = %description, "ignoring deletion of unexpected object");
                return;
            }
        };

        let key = intent.key();
        info!(key = %key, "intent deleted, uninstalling release");
        match self.releases.uninstall(key.namespace(), key.name()).await {
            Ok(()) => info!(key = %key, "release uninstalled"),
            Err(e) => error!(key = %key, error = %e, "failed to uninstall release"),
        }
    }

    fn enqueue(&self, intent: &DeploymentIntent) {
        let key = intent.key().to_string();
        debug!(key = %key, "enqueueing intent");
        self.queue.add(key);
    }

    async fn enqueue_all(&self) -> ControllerResult<()> {
        let intents = self.lister.list().await?;
        debug!(count = intents.len(), "enqueueing all intents");
        for intent in intents {
            self.enqueue(&intent);
        }
        Ok(())
    }

    /// Take one key off the queue and reconcile it.
    ///
    /// Returns `false` once the queue has shut down.
    pub async fn process_next_work_item(&self) -> bool {
        let Some(item) = self.queue.get().await else {
            return false;
        };
        let key = item.key().clone();

        match self.reconcile(&key).await {
            Ok(()) => {
                self.queue.forget(&key);
                info!(key = %key, "successfully synced");
            }
            Err(e) if !e.is_retryable() => {
                self.queue.forget(&key);
                warn!(key = %key, error = %e, "dropping key after permanent error");
            }
            Err(e) => {
                self.queue.add_rate_limited(key.clone());
                error!(
                    key = %key,
                    error = %e,
                    retries = self.queue.num_requeues(&key),
                    "error syncing, requeuing"
                );
            }
        }

        drop(item);
        true
    }

    async fn run_worker(self: Arc<Self>, id: usize) {
        debug!(worker_id = id, "worker started");
        while self.process_next_work_item().await {}
        debug!(worker_id = id, "worker stopped");
    }

    /// Keep worker `id` running until the queue shuts down.
    ///
    /// A panicking reconcile takes its task down with it; the key's queue
    /// item is released on unwind and the worker is started again after
    /// [`WORKER_RESTART_DELAY`], so the pool keeps its size.
    async fn supervise_worker(self: Arc<Self>, id: usize, cancel: CancellationToken) {
        loop {
            match tokio::spawn(Arc::clone(&self).run_worker(id)).await {
                Ok(()) => return,
                Err(e) => error!(worker_id = id, error = %e, "worker task failed"),
            }

            tokio::select! {
                () = cancel.cancelled() => return,
                () = tokio::time::sleep(WORKER_RESTART_DELAY) => {
                    info!(worker_id = id, "restarting worker");
                }
            }
        }
    }

    async fn handle_event(&self, event: IntentEvent) {
        match event {
            IntentEvent::Added(intent) => self.on_add(&intent),
            IntentEvent::Updated { old, new } => self.on_update(&old, &new),
            IntentEvent::Deleted(deleted) => self.on_delete(deleted).await,
        }
    }

    async fn pump_events(
        self: Arc<Self>,
        mut events: broadcast::Receiver<IntentEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                event = events.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed intent notifications, relisting");
                        if let Err(e) = self.enqueue_all().await {
                            error!(error = %e, "failed to relist intents");
                        }
                    }
                    Err(RecvError::Closed) => {
                        debug!("intent notifications closed");
                        return;
                    }
                },
            }
        }
    }

    async fn wait_for_sync(&self, cancel: &CancellationToken) -> ControllerResult<()> {
        info!("waiting for intent cache to sync");
        let mut ticker = tokio::time::interval(SYNC_POLL_INTERVAL);
        while !self.lister.has_synced() {
            tokio::select! {
                () = cancel.cancelled() => {
                    return Err(ControllerError::internal(
                        "cancelled before intent cache synced",
                    ));
                }
                _ = ticker.tick() => {}
            }
        }
        Ok(())
    }

    /// Run the controller until `cancel` fires.
    ///
    /// Waits for the intent cache to sync, queues every known intent, then
    /// processes notifications with `workers` workers. On cancellation the
    /// queue is shut down and this returns once every worker has exited.
    /// Pending keys are not drained.
    pub async fn run(
        self: Arc<Self>,
        events: &dyn IntentEvents,
        workers: usize,
        cancel: CancellationToken,
    ) -> ControllerResult<()> {
        info!("starting helm controller");
        self.wait_for_sync(&cancel).await?;

        let notifications = events.subscribe();
        self.enqueue_all().await?;
        let pump = tokio::spawn(Arc::clone(&self).pump_events(notifications, cancel.clone()));

        let handles: Vec<_> = (0..workers)
            .map(|id| tokio::spawn(Arc::clone(&self).supervise_worker(id, cancel.clone())))
            .collect();
        info!(workers, "started workers");

        cancel.cancelled().await;
        info!("shutting down workers");
        self.queue.shut_down();

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker supervisor failed");
            }
        }
        if let Err(e) = pump.await {
            error!(error = %e, "notification task failed");
        }

        info!("helm controller stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("queue", &self.queue)
            .field("chart", &self.chart.metadata.name)
            .finish_non_exhaustive()
    }
}
