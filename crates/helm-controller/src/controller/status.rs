//! Status reporting.

use chrono::{DateTime, Utc};
use tracing::debug;

use super::Controller;
use crate::error::{ControllerError, ControllerResult};
use crate::release::Release;
use crate::types::{DeploymentIntent, IntentStatus, ReleaseStatus, SUCCESS_MESSAGE};

/// Compute the status that records one converge attempt.
///
/// `last_updated` moves only when the status or message changes, so
/// writing the same outcome twice leaves the stored status untouched.
#[must_use]
pub fn outcome_status(
    previous: &IntentStatus,
    release: Option<&Release>,
    err: Option<&ControllerError>,
    now: DateTime<Utc>,
) -> IntentStatus {
    let release_status = release.map_or(ReleaseStatus::Unknown, |r| r.status);
    let message = err.map_or_else(|| SUCCESS_MESSAGE.to_owned(), ToString::to_string);

    let changed = previous.release_status != release_status || previous.message != message;
    IntentStatus {
        release_status,
        message,
        last_updated: if changed {
            Some(now)
        } else {
            previous.last_updated
        },
    }
}

impl Controller {
    /// Persist the outcome of a converge attempt onto the intent.
    ///
    /// The cached intent is shared with every other reader, so the status is
    /// set on a private copy and the copy is submitted to the status writer.
    pub(crate) async fn update_status(
        &self,
        intent: &DeploymentIntent,
        release: Option<&Release>,
        err: Option<&ControllerError>,
    ) -> ControllerResult<()> {
        let mut copy = intent.clone();
        copy.status = outcome_status(&intent.status, release, err, Utc::now());

        debug!(
            key = %copy.key(),
            status = %copy.status.release_status,
            message = %copy.status.message,
            "updating intent status"
        );
        self.status.update_status(&copy).await
    }
}
