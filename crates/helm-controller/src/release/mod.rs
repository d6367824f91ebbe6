//! Release subsystem seam.
//!
//! The controller never renders or applies manifests itself. It asks a
//! [`ReleaseManager`] for the current state of a named release and tells it
//! to install, upgrade or uninstall. Two implementations are provided: an
//! in-process [`MemoryReleaseManager`] and an [`HttpReleaseClient`] for a
//! remote release service.

mod chart;
mod http;
mod memory;
mod values;

pub use chart::{Chart, ChartMetadata};
pub use http::HttpReleaseClient;
pub use memory::MemoryReleaseManager;
pub use values::{coalesce, ImageValues, ReleaseValues, Values};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ReleaseBackend, ReleaseConfig};
use crate::error::ControllerResult;
use crate::types::ReleaseStatus;

/// Recorded state of a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Release name.
    pub name: String,
    /// Namespace the release is installed into.
    pub namespace: String,
    /// Revision number, starting at 1.
    pub revision: u32,
    /// Current status.
    pub status: ReleaseStatus,
    /// Metadata of the chart the release was installed from.
    pub chart: ChartMetadata,
    /// Default values of that chart.
    #[serde(default)]
    pub chart_values: Values,
    /// Values supplied at install or upgrade time.
    #[serde(default)]
    pub config: Values,
    /// Rendered manifest (multi-document YAML).
    #[serde(default)]
    pub manifest: String,
}

impl Release {
    /// Chart defaults with the release's own values merged on top.
    #[must_use]
    pub fn coalesced_values(&self) -> Values {
        coalesce(&self.chart_values, &self.config)
    }
}

/// Operations the controller needs from the release subsystem.
///
/// Every operation is scoped to the namespace passed with the call.
#[async_trait]
pub trait ReleaseManager: Send + Sync {
    /// Fetch a release.
    ///
    /// Returns `None` if no release with that name exists.
    async fn get(&self, namespace: &str, name: &str) -> ControllerResult<Option<Release>>;

    /// Install a new release of `chart` with `values` as overrides.
    async fn install(
        &self,
        namespace: &str,
        name: &str,
        chart: &Chart,
        values: Values,
    ) -> ControllerResult<Release>;

    /// Upgrade an existing release to `chart` with `values` as overrides.
    async fn upgrade(
        &self,
        namespace: &str,
        name: &str,
        chart: &Chart,
        values: Values,
    ) -> ControllerResult<Release>;

    /// Remove a release.
    async fn uninstall(&self, namespace: &str, name: &str) -> ControllerResult<()>;

    /// List releases in the `deployed` state across all namespaces.
    async fn list_deployed(&self) -> ControllerResult<Vec<Release>>;
}

/// Create a release manager from configuration.
pub fn create_release_manager(config: &ReleaseConfig) -> ControllerResult<Arc<dyn ReleaseManager>> {
    match config.backend {
        ReleaseBackend::Http => Ok(Arc::new(HttpReleaseClient::new(config)?)),
        ReleaseBackend::Memory => Ok(Arc::new(MemoryReleaseManager::new())),
    }
}
