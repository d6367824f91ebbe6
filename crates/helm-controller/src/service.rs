//! Service lifecycle management.
//!
//! Wires configuration to the concrete intent source, release backend and
//! controller, and handles process signals.

use std::sync::Arc;

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::ControllerResult;
use crate::queue::{ItemExponentialBackoff, WorkQueue};
use crate::release::{create_release_manager, Chart};
use crate::store::{DirectoryIntentSource, MemoryIntentStore};

/// The controller service.
///
/// Manages the lifecycle of the controller, including:
/// - Loading the base chart
/// - The intent directory source
/// - The release backend
/// - Signal handling and graceful shutdown
pub struct ControllerService {
    config: ControllerConfig,
    cancel: CancellationToken,
}

impl ControllerService {
    /// Create a new controller service with the given configuration.
    #[must_use]
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Run the controller service until shutdown.
    pub async fn run(&self) -> ControllerResult<()> {
        let chart = Arc::new(Chart::load(&self.config.chart.path).await?);
        info!(
            chart = %chart.metadata.name,
            version = %chart.metadata.version,
            "base chart loaded"
        );

        let releases = create_release_manager(&self.config.release)?;
        info!(backend = ?self.config.release.backend, "release backend configured");

        let store = Arc::new(MemoryIntentStore::unsynced());
        let source = DirectoryIntentSource::new(
            &self.config.source.intents_dir,
            self.config.source.resync_interval(),
            Arc::clone(&store),
        );

        let queue = WorkQueue::with_rate_limiter(ItemExponentialBackoff::new(
            self.config.queue.base_delay(),
            self.config.queue.max_delay(),
        ));
        let controller = Arc::new(
            Controller::new(Arc::clone(&store) as _, Arc::clone(&store) as _, releases, chart)
                .with_queue(queue),
        );

        let signals = tokio::spawn(shutdown_signal(self.cancel.clone()));
        let source = tokio::spawn(source.run(self.cancel.clone()));

        let result = controller
            .run(store.as_ref(), self.config.workers, self.cancel.clone())
            .await;

        // The controller can fail before cancellation; stop the source too.
        self.cancel.cancel();
        if let Err(e) = source.await {
            error!(error = %e, "intent source task failed");
        }
        signals.abort();

        info!("controller service shutdown complete");
        result
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Resolves when the process receives Ctrl+C or SIGTERM.
async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => "Ctrl+C",
        () = terminate => "SIGTERM",
    }
}

/// First signal cancels `cancel`; a second one exits immediately.
async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        signal = wait_for_signal() => {
            info!(signal, "received signal, initiating shutdown");
            cancel.cancel();
        }
        () = cancel.cancelled() => {
            info!("shutdown requested");
        }
    }

    let signal = wait_for_signal().await;
    warn!(signal, "received second signal, exiting");
    std::process::exit(1);
}
