//! Integration tests for building an inventory report.

#![allow(clippy::unwrap_used)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use helm_controller::{ChartMetadata, Release, ReleaseStatus, Values};
use release_inventory::{
    build_report, ClusterReader, InventoryError, InventoryResult, ManifestObject,
};
use serde_json::{json, Value};

/// Cluster with fixed releases and live objects keyed by `namespace/name`.
#[derive(Default)]
struct FakeCluster {
    releases: Vec<Release>,
    live: HashMap<String, Value>,
    fetches: AtomicUsize,
}

impl FakeCluster {
    fn with_release(mut self, namespace: &str, name: &str, manifest: &str) -> Self {
        self.releases.push(Release {
            name: name.to_owned(),
            namespace: namespace.to_owned(),
            revision: 1,
            status: ReleaseStatus::Deployed,
            chart: ChartMetadata {
                name: "base".to_owned(),
                version: "0.1.0".to_owned(),
                description: None,
            },
            chart_values: Values::new(),
            config: Values::new(),
            manifest: manifest.to_owned(),
        });
        self
    }

    fn with_live(mut self, namespace: &str, name: &str, body: Value) -> Self {
        self.live.insert(format!("{namespace}/{name}"), body);
        self
    }
}

#[async_trait]
impl ClusterReader for FakeCluster {
    async fn list_deployed(&self) -> InventoryResult<Vec<Release>> {
        Ok(self.releases.clone())
    }

    async fn fetch(&self, object: &ManifestObject) -> InventoryResult<ManifestObject> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let id = format!("{}/{}", object.namespace, object.name);
        self.live
            .get(&id)
            .map(|body| object.with_body(body.clone()))
            .ok_or(InventoryError::ObjectNotFound(id))
    }
}

const WEB: &str = "
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
spec:
  replicas: 2
---
apiVersion: v1
kind: PersistentVolumeClaim
metadata:
  name: web-data
---
apiVersion: v1
kind: Service
metadata:
  name: web
";

const DB: &str = "
apiVersion: apps/v1
kind: StatefulSet
metadata:
  name: db
";

#[tokio::test]
async fn aggregates_live_state_across_releases() {
    let cluster = FakeCluster::default()
        .with_release("shop", "web", WEB)
        .with_release("data", "db", DB)
        .with_live(
            "shop",
            "web",
            json!({ "spec": { "replicas": 2 }, "status": { "readyReplicas": 2 } }),
        )
        .with_live("shop", "web-data", json!({ "status": { "phase": "Bound" } }))
        .with_live("data", "db", json!({ "status": { "readyReplicas": 0 } }));

    let report = build_report(&cluster).await.unwrap();

    assert_eq!(report.total_releases, 2);
    assert_eq!(report.kind_count["apps/v1/Deployment"], 1);
    assert_eq!(report.kind_count["apps/v1/StatefulSet"], 1);
    assert_eq!(report.kind_count["/v1/PersistentVolumeClaim"], 1);
    assert_eq!(report.kind_count["/v1/Service"], 1);
    assert_eq!(report.num_ready, 2);
    assert_eq!(report.num_not_ready, 1);
    assert_eq!(cluster.fetches.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn failed_fetch_falls_back_to_manifest() {
    // Nothing is live: the claim has no status and the deployment's
    // manifest declares two replicas with none ready.
    let cluster = FakeCluster::default().with_release("shop", "web", WEB);

    let report = build_report(&cluster).await.unwrap();

    assert_eq!(report.kind_count.values().sum::<u64>(), 3);
    assert_eq!(report.num_ready, 0);
    assert_eq!(report.num_not_ready, 2);
}

#[tokio::test]
async fn no_releases_is_an_empty_report() {
    let report = build_report(&FakeCluster::default()).await.unwrap();

    assert_eq!(report.total_releases, 0);
    assert!(report.kind_count.is_empty());
}

#[tokio::test]
async fn broken_manifest_aborts() {
    let cluster = FakeCluster::default().with_release("shop", "web", "kind: [");

    let err = build_report(&cluster).await.unwrap_err();
    assert!(matches!(err, InventoryError::Manifest { .. }));
}
