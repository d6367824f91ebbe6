//! Readiness aggregation.

use std::collections::BTreeMap;
use std::io::Write;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::InventoryResult;
use crate::manifest::{parse_manifest, ManifestObject};
use crate::reader::ClusterReader;

/// Summary of every deployed release's objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryReport {
    /// Number of objects per `group/version/Kind`.
    pub kind_count: BTreeMap<String, u64>,
    /// Number of deployed releases.
    pub total_releases: u64,
    /// Objects of a recognised kind that are ready.
    pub num_ready: u64,
    /// Objects of a recognised kind that are not ready.
    pub num_not_ready: u64,
}

impl InventoryReport {
    /// Count one object.
    pub fn record(&mut self, object: &ManifestObject) {
        *self.kind_count.entry(object.kind_key()).or_default() += 1;
        match readiness(object) {
            Readiness::Ready => self.num_ready += 1,
            Readiness::NotReady => self.num_not_ready += 1,
            Readiness::Unsupported => {}
        }
    }

    /// Write the report as JSON indented by four spaces, with a trailing newline.
    pub fn write_json<W: Write>(&self, mut writer: W) -> InventoryResult<()> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut writer, formatter);
        self.serialize(&mut serializer)?;
        writeln!(writer)?;
        Ok(())
    }
}

/// Readiness of a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The object is ready.
    Ready,
    /// The object is of a known kind but not ready.
    NotReady,
    /// Readiness is not tracked for this kind.
    Unsupported,
}

impl From<bool> for Readiness {
    fn from(ready: bool) -> Self {
        if ready {
            Self::Ready
        } else {
            Self::NotReady
        }
    }
}

/// Classify an object from its body.
///
/// A `PersistentVolumeClaim` is ready once bound. A `Deployment` or
/// `StatefulSet` is ready when its ready replicas equal its desired
/// replicas, which default to 1.
#[must_use]
pub fn readiness(object: &ManifestObject) -> Readiness {
    match (object.group(), object.kind.as_str()) {
        ("", "PersistentVolumeClaim") => {
            let phase = object.body.pointer("/status/phase").and_then(Value::as_str);
            (phase == Some("Bound")).into()
        }
        ("apps", "Deployment" | "StatefulSet") => {
            let desired = object
                .body
                .pointer("/spec/replicas")
                .and_then(Value::as_i64)
                .unwrap_or(1);
            let ready = object
                .body
                .pointer("/status/readyReplicas")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            (ready == desired).into()
        }
        _ => Readiness::Unsupported,
    }
}

/// Build the report for every deployed release.
///
/// Live objects are fetched concurrently. An object whose live state cannot
/// be fetched is logged and classified from its manifest instead.
pub async fn build_report(reader: &dyn ClusterReader) -> InventoryResult<InventoryReport> {
    let releases = reader.list_deployed().await?;
    info!(count = releases.len(), "listed deployed releases");

    let mut objects = Vec::new();
    for release in &releases {
        let id = format!("{}/{}", release.namespace, release.name);
        let parsed = parse_manifest(&id, &release.manifest, &release.namespace)?;
        debug!(release = %id, objects = parsed.len(), "parsed release manifest");
        objects.extend(parsed);
    }

    let live = join_all(objects.iter().map(|object| async move {
        match reader.fetch(object).await {
            Ok(live) => live,
            Err(e) => {
                error!(
                    kind = %object.kind_key(),
                    namespace = %object.namespace,
                    name = %object.name,
                    error = %e,
                    "unable to fetch object"
                );
                object.clone()
            }
        }
    }))
    .await;

    let mut report = InventoryReport {
        total_releases: releases.len() as u64,
        ..InventoryReport::default()
    };
    for object in &live {
        report.record(object);
    }
    Ok(report)
}
