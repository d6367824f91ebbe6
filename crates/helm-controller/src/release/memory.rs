//! In-process release manager.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{Chart, Release, ReleaseManager, Values};
use crate::error::{ControllerError, ControllerResult};
use crate::types::ReleaseStatus;

type ReleaseKey = (String, String);

/// Release manager that keeps releases in memory.
///
/// Useful for tests and for running the controller without a release
/// service. Data is lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryReleaseManager {
    releases: RwLock<BTreeMap<ReleaseKey, Release>>,
}

impl MemoryReleaseManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a release directly, bypassing install/upgrade.
    pub fn seed(&self, release: Release) -> ControllerResult<()> {
        let mut releases = self
            .releases
            .write()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;
        releases.insert((release.namespace.clone(), release.name.clone()), release);
        Ok(())
    }

    /// Snapshot of every release, ordered by namespace then name.
    pub fn releases(&self) -> ControllerResult<Vec<Release>> {
        let releases = self
            .releases
            .read()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;
        Ok(releases.values().cloned().collect())
    }
}

fn release_key(namespace: &str, name: &str) -> ReleaseKey {
    (namespace.to_owned(), name.to_owned())
}

#[async_trait]
impl ReleaseManager for MemoryReleaseManager {
    async fn get(&self, namespace: &str, name: &str) -> ControllerResult<Option<Release>> {
        let releases = self
            .releases
            .read()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;
        Ok(releases.get(&release_key(namespace, name)).cloned())
    }

    async fn install(
        &self,
        namespace: &str,
        name: &str,
        chart: &Chart,
        values: Values,
    ) -> ControllerResult<Release> {
        let mut releases = self
            .releases
            .write()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;

        let key = release_key(namespace, name);
        if releases.contains_key(&key) {
            return Err(ControllerError::release(format!(
                "cannot re-use a name that is still in use: {namespace}/{name}"
            )));
        }

        let release = Release {
            name: name.to_owned(),
            namespace: namespace.to_owned(),
            revision: 1,
            status: ReleaseStatus::Deployed,
            chart: chart.metadata.clone(),
            chart_values: chart.values.clone(),
            config: values,
            manifest: String::new(),
        };
        releases.insert(key, release.clone());
        Ok(release)
    }

    async fn upgrade(
        &self,
        namespace: &str,
        name: &str,
        chart: &Chart,
        values: Values,
    ) -> ControllerResult<Release> {
        let mut releases = self
            .releases
            .write()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;

        let current = releases
            .get_mut(&release_key(namespace, name))
            .ok_or_else(|| {
                ControllerError::release(format!("{namespace}/{name} has no deployed releases"))
            })?;

        current.revision = current.revision.saturating_add(1);
        current.status = ReleaseStatus::Deployed;
        current.chart = chart.metadata.clone();
        current.chart_values = chart.values.clone();
        current.config = values;
        Ok(current.clone())
    }

    async fn uninstall(&self, namespace: &str, name: &str) -> ControllerResult<()> {
        let mut releases = self
            .releases
            .write()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;

        if releases.remove(&release_key(namespace, name)).is_none() {
            return Err(ControllerError::release(format!(
                "uninstall: release not loaded: {namespace}/{name}"
            )));
        }
        Ok(())
    }

    async fn list_deployed(&self) -> ControllerResult<Vec<Release>> {
        let releases = self
            .releases
            .read()
            .map_err(|_| ControllerError::internal("lock poisoned"))?;
        Ok(releases
            .values()
            .filter(|r| r.status == ReleaseStatus::Deployed)
            .cloned()
            .collect())
    }
}
