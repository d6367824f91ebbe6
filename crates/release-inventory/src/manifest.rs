//! Objects declared by a release manifest.

use serde::Deserialize;
use serde_json::Value;

use crate::error::{InventoryError, InventoryResult};

/// One object from a rendered release manifest, or its live state.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestObject {
    /// `group/version`, or just `version` for the core group.
    pub api_version: String,
    /// Object kind, e.g. `Deployment`.
    pub kind: String,
    /// Object name.
    pub name: String,
    /// Namespace the object lives in.
    pub namespace: String,
    /// The full object.
    pub body: Value,
}

impl ManifestObject {
    /// API group; empty for the core group.
    #[must_use]
    pub fn group(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or("", |(group, _)| group)
    }

    /// API version without the group.
    #[must_use]
    pub fn version(&self) -> &str {
        self.api_version
            .split_once('/')
            .map_or(self.api_version.as_str(), |(_, version)| version)
    }

    /// `group/version/Kind`, the key objects are counted under.
    #[must_use]
    pub fn kind_key(&self) -> String {
        format!("{}/{}/{}", self.group(), self.version(), self.kind)
    }

    /// The same object with a different body.
    #[must_use]
    pub fn with_body(&self, body: Value) -> Self {
        Self {
            body,
            ..self.clone()
        }
    }
}

/// Split a multi-document YAML manifest into objects.
///
/// Empty documents are skipped. Objects without a namespace are placed in
/// `release_namespace`.
pub fn parse_manifest(
    release: &str,
    manifest: &str,
    release_namespace: &str,
) -> InventoryResult<Vec<ManifestObject>> {
    let invalid = |reason: String| InventoryError::Manifest {
        release: release.to_owned(),
        reason,
    };

    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(manifest) {
        let body = Value::deserialize(document).map_err(|e| invalid(e.to_string()))?;
        if body.is_null() {
            continue;
        }

        let field = |pointer: &str| {
            body.pointer(pointer)
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        let api_version = field("/apiVersion").ok_or_else(|| invalid("object without apiVersion".to_owned()))?;
        let kind = field("/kind").ok_or_else(|| invalid("object without kind".to_owned()))?;
        let name = field("/metadata/name")
            .ok_or_else(|| invalid(format!("{kind} without metadata.name")))?;
        let namespace = field("/metadata/namespace")
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| release_namespace.to_owned());

        objects.push(ManifestObject {
            api_version,
            kind,
            name,
            namespace,
            body,
        });
    }
    Ok(objects)
}
