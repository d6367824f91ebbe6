//! Directory-backed intent source.
//!
//! Intents are declared as YAML files in a directory. The directory is
//! re-listed on a fixed interval and every difference is applied to a
//! [`MemoryIntentStore`], which turns it into notifications.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::MemoryIntentStore;
use crate::error::{ControllerError, ControllerResult};
use crate::types::DeploymentIntent;

/// Counts from a single pass over the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Intents parsed from files.
    pub seen: usize,
    /// Intents removed because their file disappeared.
    pub removed: usize,
    /// Files that could not be read or parsed.
    pub invalid: usize,
}

/// Feeds a [`MemoryIntentStore`] from a directory of intent manifests.
#[derive(Debug)]
pub struct DirectoryIntentSource {
    dir: PathBuf,
    resync: Duration,
    store: Arc<MemoryIntentStore>,
}

impl DirectoryIntentSource {
    /// Create a source for `dir` that re-lists every `resync`.
    pub fn new(dir: impl Into<PathBuf>, resync: Duration, store: Arc<MemoryIntentStore>) -> Self {
        Self {
            dir: dir.into(),
            resync,
            store,
        }
    }

    /// Apply the directory's current contents to the store once.
    ///
    /// If any file fails to parse, removals are skipped for this pass: the
    /// broken file may be the only declaration of an intent that still
    /// exists.
    pub async fn sync_once(&self) -> ControllerResult<SyncSummary> {
        let mut summary = SyncSummary::default();
        let mut seen = BTreeSet::new();

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            ControllerError::store(format!("reading {}: {e}", self.dir.display()))
        })?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_manifest(&path) {
                continue;
            }

            match read_intent(&path).await {
                Ok(intent) => {
                    let key = intent.key();
                    if !seen.insert(key.clone()) {
                        warn!(key = %key, path = %path.display(), "duplicate intent, later file wins");
                    }
                    self.store.apply(intent)?;
                    summary.seen += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping invalid intent manifest");
                    summary.invalid += 1;
                }
            }
        }

        if summary.invalid == 0 {
            for key in self.store.keys()? {
                if !seen.contains(&key) && self.store.remove(&key)?.is_some() {
                    summary.removed += 1;
                }
            }
        }

        self.store.mark_synced();
        debug!(
            seen = summary.seen,
            removed = summary.removed,
            invalid = summary.invalid,
            "intent directory synced"
        );
        Ok(summary)
    }

    /// Re-list the directory until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(dir = %self.dir.display(), resync = ?self.resync, "watching intent directory");
        let mut ticker = tokio::time::interval(self.resync);

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("intent source stopping");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.sync_once().await {
                        error!(error = %e, "failed to sync intent directory");
                    }
                }
            }
        }
    }
}

fn is_manifest(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

async fn read_intent(path: &Path) -> ControllerResult<DeploymentIntent> {
    let raw = tokio::fs::read_to_string(path).await?;
    let intent: DeploymentIntent =
        serde_yaml::from_str(&raw).map_err(|e| ControllerError::Serialisation(e.to_string()))?;

    if intent.metadata.name.is_empty() {
        return Err(ControllerError::Serialisation(
            "metadata.name must not be empty".to_owned(),
        ));
    }
    // Keys are `namespace/name`; a slash in either part would not parse back.
    if intent.metadata.name.contains('/') || intent.metadata.namespace.contains('/') {
        return Err(ControllerError::InvalidKey(intent.key().to_string()));
    }
    Ok(intent)
}
