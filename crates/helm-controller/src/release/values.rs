//! Release values: coalescing and the typed view the converge engine compares.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{ControllerError, ControllerResult};

/// A tree of chart values.
pub type Values = Map<String, Value>;

/// Merges `overrides` on top of `defaults`.
///
/// Nested maps merge key by key, any other override value replaces the
/// default, and a `null` override removes the key.
#[must_use]
pub fn coalesce(defaults: &Values, overrides: &Values) -> Values {
    let mut merged = defaults.clone();
    for (key, value) in overrides {
        if value.is_null() {
            merged.remove(key);
            continue;
        }
        if let (Some(Value::Object(base)), Value::Object(over)) = (merged.get_mut(key), value) {
            *base = coalesce(base, over);
            continue;
        }
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Image section of the release values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageValues {
    /// Image reference.
    pub name: String,
}

/// The fields of a release's values that the controller manages.
///
/// Everything else in the values tree is ignored so that charts can carry
/// settings the controller never sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseValues {
    /// Number of replicas.
    pub replica_count: i32,
    /// Image settings.
    pub image: ImageValues,
}

impl ReleaseValues {
    /// Creates the managed values for an image and replica count.
    #[must_use]
    pub fn new(image_name: impl Into<String>, replica_count: i32) -> Self {
        Self {
            replica_count,
            image: ImageValues {
                name: image_name.into(),
            },
        }
    }

    /// Decodes the managed fields from coalesced release values.
    ///
    /// Fails if either field is missing or has the wrong type; a fractional
    /// or out-of-range replica count is an error rather than a truncation.
    pub fn decode(values: &Values) -> ControllerResult<Self> {
        Self::deserialize(Value::Object(values.clone()))
            .map_err(|e| ControllerError::ValuesDecode(e.to_string()))
    }

    /// Renders the override map passed to install and upgrade.
    #[must_use]
    pub fn to_values(&self) -> Values {
        let mut values = Values::new();
        values.insert("replicaCount".to_owned(), json!(self.replica_count));
        values.insert("image".to_owned(), json!({ "name": self.image.name }));
        values
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn values(v: Value) -> Values {
        match v {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn coalesce_merges_nested_maps() {
        let defaults = values(json!({
            "replicaCount": 1,
            "image": { "name": "nginx", "pullPolicy": "IfNotPresent" },
            "service": { "port": 80 }
        }));
        let overrides = values(json!({
            "replicaCount": 3,
            "image": { "name": "app:v1" }
        }));

        let merged = coalesce(&defaults, &overrides);
        assert_eq!(
            Value::Object(merged),
            json!({
                "replicaCount": 3,
                "image": { "name": "app:v1", "pullPolicy": "IfNotPresent" },
                "service": { "port": 80 }
            })
        );
    }

    #[test]
    fn coalesce_null_removes_default() {
        let defaults = values(json!({ "service": { "port": 80 }, "debug": true }));
        let overrides = values(json!({ "debug": null }));

        let merged = coalesce(&defaults, &overrides);
        assert!(!merged.contains_key("debug"));
        assert!(merged.contains_key("service"));
    }

    #[test]
    fn decode_ignores_unmanaged_fields() {
        let decoded = ReleaseValues::decode(&values(json!({
            "replicaCount": 3,
            "image": { "name": "app:v1", "tag": "ignored" },
            "ingress": { "enabled": false }
        })))
        .unwrap();
        assert_eq!(decoded, ReleaseValues::new("app:v1", 3));
    }

    #[test]
    fn decode_rejects_missing_image() {
        let err = ReleaseValues::decode(&values(json!({ "replicaCount": 3 }))).unwrap_err();
        assert!(matches!(err, ControllerError::ValuesDecode(_)));
    }

    #[test]
    fn decode_rejects_wrong_types() {
        for bad in [
            json!({ "replicaCount": 2.5, "image": { "name": "app:v1" } }),
            json!({ "replicaCount": "3", "image": { "name": "app:v1" } }),
            json!({ "replicaCount": 3, "image": "app:v1" }),
            json!({ "replicaCount": 4_294_967_296_u64, "image": { "name": "app:v1" } }),
        ] {
            let err = ReleaseValues::decode(&values(bad.clone())).unwrap_err();
            assert!(matches!(err, ControllerError::ValuesDecode(_)), "{bad}");
        }
    }

    #[test]
    fn to_values_shape() {
        let rendered = ReleaseValues::new("app:v1", 3).to_values();
        assert_eq!(
            Value::Object(rendered),
            json!({ "replicaCount": 3, "image": { "name": "app:v1" } })
        );
    }
}
