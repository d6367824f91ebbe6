//! Core types for helm-controller.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ControllerError;

/// Replica count used when an intent does not set one.
pub const DEFAULT_REPLICAS: i32 = 1;

/// Status message recorded after a successful converge.
pub const SUCCESS_MESSAGE: &str = "Release deployed";

/// The `namespace/name` key placed on the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    namespace: String,
    name: String,
}

impl ResourceKey {
    /// Create a key from its parts.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Namespace part (empty for cluster-scoped keys).
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Name part.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}/{}", self.namespace, self.name)
        }
    }
}

impl FromStr for ResourceKey {
    type Err = ControllerError;

    /// Accepts `name` or `namespace/name`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let key = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), None, None) => Self::new("", name),
            (Some(namespace), Some(name), None) => Self::new(namespace, name),
            _ => return Err(ControllerError::InvalidKey(s.to_owned())),
        };

        if key.name.is_empty() {
            return Err(ControllerError::InvalidKey(s.to_owned()));
        }
        Ok(key)
    }
}

/// Identity and concurrency metadata for an intent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Namespace the intent lives in.
    #[serde(default)]
    pub namespace: String,
    /// Name of the intent, also used as the release name.
    pub name: String,
    /// Opaque version used for optimistic concurrency with the store.
    #[serde(default)]
    pub resource_version: u64,
}

/// Desired state declared by an intent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentSpec {
    /// Image the release should run.
    #[serde(default)]
    pub image_name: String,
    /// Desired replica count; [`DEFAULT_REPLICAS`] when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
}

/// Observed state written back by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentStatus {
    /// Status of the backing release.
    #[serde(default)]
    pub release_status: ReleaseStatus,
    /// Outcome of the last converge attempt.
    #[serde(default)]
    pub message: String,
    /// When the controller last wrote this status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// A deployment intent: the desired-state record the controller converges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentIntent {
    /// Identity metadata.
    pub metadata: ObjectMeta,
    /// Desired state, read-only to the controller.
    pub spec: IntentSpec,
    /// Observed state, written only by the controller.
    #[serde(default)]
    pub status: IntentStatus,
}

impl DeploymentIntent {
    /// Create an intent with an empty status.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        image_name: impl Into<String>,
        replicas: Option<i32>,
    ) -> Self {
        Self {
            metadata: ObjectMeta {
                namespace: namespace.into(),
                name: name.into(),
                resource_version: 0,
            },
            spec: IntentSpec {
                image_name: image_name.into(),
                replicas,
            },
            status: IntentStatus::default(),
        }
    }

    /// The queue key for this intent.
    #[must_use]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Desired replicas with the default applied.
    #[must_use]
    pub fn desired_replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(DEFAULT_REPLICAS)
    }
}

/// Status of a release as reported by the release subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStatus {
    /// State is not known.
    #[default]
    Unknown,
    /// Release is deployed.
    Deployed,
    /// Release was uninstalled.
    Uninstalled,
    /// Release was replaced by a later revision.
    Superseded,
    /// Last operation on the release failed.
    Failed,
    /// Uninstall in progress.
    Uninstalling,
    /// Install in progress.
    PendingInstall,
    /// Upgrade in progress.
    PendingUpgrade,
    /// Rollback in progress.
    PendingRollback,
}

impl ReleaseStatus {
    /// Get the status name as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Deployed => "deployed",
            Self::Uninstalled => "uninstalled",
            Self::Superseded => "superseded",
            Self::Failed => "failed",
            Self::Uninstalling => "uninstalling",
            Self::PendingInstall => "pending-install",
            Self::PendingUpgrade => "pending-upgrade",
            Self::PendingRollback => "pending-rollback",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parse_namespaced_key() {
        let key: ResourceKey = "ns/foo".parse().unwrap();
        assert_eq!(key.namespace(), "ns");
        assert_eq!(key.name(), "foo");
        assert_eq!(key.to_string(), "ns/foo");
    }

    #[test]
    fn parse_cluster_scoped_key() {
        let key: ResourceKey = "foo".parse().unwrap();
        assert_eq!(key.namespace(), "");
        assert_eq!(key.to_string(), "foo");
    }

    #[test]
    fn reject_malformed_keys() {
        for raw in ["a/b/c", "ns/", ""] {
            let err = raw.parse::<ResourceKey>().unwrap_err();
            assert!(matches!(err, ControllerError::InvalidKey(_)), "{raw}");
        }
    }

    #[test]
    fn replicas_default_to_one() {
        let intent = DeploymentIntent::new("ns", "foo", "app:v1", None);
        assert_eq!(intent.desired_replicas(), 1);

        let intent = DeploymentIntent::new("ns", "foo", "app:v1", Some(3));
        assert_eq!(intent.desired_replicas(), 3);
    }

    #[test]
    fn release_status_serialises_kebab_case() {
        let json = serde_json::to_string(&ReleaseStatus::PendingInstall).unwrap();
        assert_eq!(json, r#""pending-install""#);
        assert_eq!(ReleaseStatus::PendingInstall.to_string(), "pending-install");
    }

    #[test]
    fn intent_from_yaml() {
        let yaml = r"
metadata:
  namespace: web
  name: frontend
spec:
  imageName: nginx:1.27
  replicas: 2
";
        let intent: DeploymentIntent = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(intent.key().to_string(), "web/frontend");
        assert_eq!(intent.spec.image_name, "nginx:1.27");
        assert_eq!(intent.desired_replicas(), 2);
        assert_eq!(intent.status.release_status, ReleaseStatus::Unknown);
    }
}
