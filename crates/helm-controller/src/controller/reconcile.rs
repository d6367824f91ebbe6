//! Converge engine.

use tracing::{debug, info, warn};

use super::Controller;
use crate::error::{ControllerError, ControllerResult};
use crate::release::{Release, ReleaseValues};
use crate::types::{DeploymentIntent, ResourceKey};

/// What a converge pass has to do to a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// No release exists yet.
    Install,
    /// The release exists but its values differ from the intent.
    Upgrade,
    /// The release already runs the desired values.
    UpToDate,
}

/// Decide the action for `desired` given the current release.
///
/// Only the image name and replica count are compared; any other values
/// the release carries are ignored. A release whose values do not decode
/// into [`ReleaseValues`] is an error, not a reason to upgrade.
pub fn plan(desired: &ReleaseValues, current: Option<&Release>) -> ControllerResult<Plan> {
    let Some(release) = current else {
        return Ok(Plan::Install);
    };

    let actual = ReleaseValues::decode(&release.coalesced_values())?;
    if actual == *desired {
        Ok(Plan::UpToDate)
    } else {
        Ok(Plan::Upgrade)
    }
}

/// Check that an intent carries enough to build a release from.
pub fn validate(intent: &DeploymentIntent) -> ControllerResult<()> {
    if intent.spec.image_name.is_empty() {
        return Err(ControllerError::Validation {
            key: intent.key().to_string(),
            reason: "spec.imageName must be set".to_owned(),
        });
    }
    Ok(())
}

impl Controller {
    /// Converge the release for `key` towards its intent.
    ///
    /// Returns `Ok` when nothing more can be done for now: the intent is
    /// gone, invalid, or converged. Errors from the release subsystem and
    /// from the status write are returned for retry; status failures win.
    pub async fn reconcile(&self, key: &str) -> ControllerResult<()> {
        let key: ResourceKey = key.parse()?;

        let Some(intent) = self.lister.get(&key).await? else {
            info!(key = %key, "intent no longer exists");
            return Ok(());
        };

        if let Err(e) = validate(&intent) {
            warn!(key = %key, error = %e, "skipping invalid intent");
            return Ok(());
        }

        let desired = ReleaseValues::new(&intent.spec.image_name, intent.desired_replicas());

        let current = match self.releases.get(key.namespace(), key.name()).await {
            Ok(current) => current,
            Err(e) => {
                self.update_status(&intent, None, Some(&e)).await?;
                return Err(e);
            }
        };

        // Deletion uninstalls out of band; a release must not come back for
        // an intent that was deleted while the fetch was in flight.
        if self.lister.get(&key).await?.is_none() {
            info!(key = %key, "intent deleted during reconcile");
            return Ok(());
        }

        let (release, result) = match plan(&desired, current.as_ref()) {
            Ok(Plan::UpToDate) => {
                debug!(key = %key, "release is up to date");
                (current, Ok(()))
            }
            Ok(Plan::Install) => {
                info!(key = %key, image = %desired.image.name, replicas = desired.replica_count, "installing release");
                match self
                    .releases
                    .install(key.namespace(), key.name(), &self.chart, desired.to_values())
                    .await
                {
                    Ok(release) => (Some(release), Ok(())),
                    Err(e) => (current, Err(e)),
                }
            }
            Ok(Plan::Upgrade) => {
                info!(key = %key, image = %desired.image.name, replicas = desired.replica_count, "upgrading release");
                match self
                    .releases
                    .upgrade(key.namespace(), key.name(), &self.chart, desired.to_values())
                    .await
                {
                    Ok(release) => (Some(release), Ok(())),
                    Err(e) => (current, Err(e)),
                }
            }
            Err(e) => (current, Err(e)),
        };

        self.update_status(&intent, release.as_ref(), result.as_ref().err())
            .await?;
        result
    }
}
