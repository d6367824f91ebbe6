//! The base chart installed for every intent.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::values::Values;
use crate::error::{ControllerError, ControllerResult};

/// Chart metadata, as found in `Chart.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartMetadata {
    /// Chart name.
    pub name: String,
    /// Chart version.
    pub version: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A deployable chart: metadata plus default values.
///
/// Loaded once at startup and shared read-only between all workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    /// Chart metadata.
    pub metadata: ChartMetadata,
    /// Default values, overridden per release.
    #[serde(default)]
    pub values: Values,
}

impl Chart {
    /// Loads a chart from a directory containing `Chart.yaml` and an
    /// optional `values.yaml`.
    pub async fn load(dir: impl AsRef<Path>) -> ControllerResult<Self> {
        let dir = dir.as_ref();
        let load_err = |reason: String| ControllerError::ChartLoad {
            path: dir.display().to_string(),
            reason,
        };

        let metadata_raw = tokio::fs::read_to_string(dir.join("Chart.yaml"))
            .await
            .map_err(|e| load_err(format!("reading Chart.yaml: {e}")))?;
        let metadata: ChartMetadata = serde_yaml::from_str(&metadata_raw)
            .map_err(|e| load_err(format!("parsing Chart.yaml: {e}")))?;

        let values_path = dir.join("values.yaml");
        let values = match tokio::fs::read_to_string(&values_path).await {
            Ok(raw) => {
                parse_values(&raw).map_err(|e| load_err(format!("parsing values.yaml: {e}")))?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Values::new(),
            Err(e) => return Err(load_err(format!("reading values.yaml: {e}"))),
        };

        debug!(
            chart = %metadata.name,
            version = %metadata.version,
            "loaded chart"
        );

        Ok(Self { metadata, values })
    }
}

fn parse_values(raw: &str) -> Result<Values, String> {
    let value: Option<serde_json::Value> = serde_yaml::from_str(raw).map_err(|e| e.to_string())?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(Values::new()),
        Some(serde_json::Value::Object(map)) => Ok(map),
        Some(other) => Err(format!("expected a mapping at the top level, found {other}")),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write_chart(dir: &Path, values: Option<&str>) {
        std::fs::write(
            dir.join("Chart.yaml"),
            "name: base\nversion: 0.1.0\ndescription: Base workload chart\n",
        )
        .unwrap();
        if let Some(values) = values {
            std::fs::write(dir.join("values.yaml"), values).unwrap();
        }
    }

    #[tokio::test]
    async fn load_with_values() {
        let dir = tempfile::tempdir().unwrap();
        write_chart(
            dir.path(),
            Some("replicaCount: 1\nimage:\n  name: nginx\n  pullPolicy: IfNotPresent\n"),
        );

        let chart = Chart::load(dir.path()).await.unwrap();
        assert_eq!(chart.metadata.name, "base");
        assert_eq!(chart.metadata.version, "0.1.0");
        assert_eq!(chart.values["replicaCount"], 1);
        assert_eq!(chart.values["image"]["pullPolicy"], "IfNotPresent");
    }

    #[tokio::test]
    async fn load_without_values() {
        let dir = tempfile::tempdir().unwrap();
        write_chart(dir.path(), None);

        let chart = Chart::load(dir.path()).await.unwrap();
        assert!(chart.values.is_empty());
    }

    #[tokio::test]
    async fn empty_values_file_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        write_chart(dir.path(), Some(""));

        let chart = Chart::load(dir.path()).await.unwrap();
        assert!(chart.values.is_empty());
    }

    #[tokio::test]
    async fn missing_chart_yaml_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Chart::load(dir.path()).await.unwrap_err();
        assert!(matches!(err, ControllerError::ChartLoad { .. }));
    }

    #[tokio::test]
    async fn unreadable_values_fail() {
        let dir = tempfile::tempdir().unwrap();
        write_chart(dir.path(), None);
        std::fs::create_dir(dir.path().join("values.yaml")).unwrap();

        let err = Chart::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("reading values.yaml"));
    }

    #[tokio::test]
    async fn non_mapping_values_fail() {
        let dir = tempfile::tempdir().unwrap();
        write_chart(dir.path(), Some("- a\n- b\n"));

        let err = Chart::load(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("expected a mapping"));
    }
}
