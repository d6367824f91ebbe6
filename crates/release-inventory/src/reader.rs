//! Read access to releases and the live objects they manage.

use async_trait::async_trait;
use helm_controller::{HttpReleaseClient, Release, ReleaseManager};

use crate::error::{InventoryError, InventoryResult};
use crate::manifest::ManifestObject;

/// What the inventory needs from the cluster.
#[async_trait]
pub trait ClusterReader: Send + Sync {
    /// Releases in the `deployed` state, across all namespaces.
    async fn list_deployed(&self) -> InventoryResult<Vec<Release>>;

    /// Fetch the live state of an object declared by a manifest.
    async fn fetch(&self, object: &ManifestObject) -> InventoryResult<ManifestObject>;
}

/// [`ClusterReader`] backed by the release service HTTP API.
#[derive(Debug, Clone)]
pub struct HttpClusterReader {
    client: HttpReleaseClient,
}

impl HttpClusterReader {
    /// Create a reader for the release service at `url`.
    pub fn new(url: impl Into<String>) -> InventoryResult<Self> {
        Ok(Self {
            client: HttpReleaseClient::with_url(url)?,
        })
    }
}

#[async_trait]
impl ClusterReader for HttpClusterReader {
    async fn list_deployed(&self) -> InventoryResult<Vec<Release>> {
        Ok(self.client.list_deployed().await?)
    }

    async fn fetch(&self, object: &ManifestObject) -> InventoryResult<ManifestObject> {
        let body = self
            .client
            .get_object(
                &object.namespace,
                &object.api_version,
                &object.kind,
                &object.name,
            )
            .await?
            .ok_or_else(|| {
                InventoryError::ObjectNotFound(format!(
                    "{} {}/{}",
                    object.kind_key(),
                    object.namespace,
                    object.name
                ))
            })?;
        Ok(object.with_body(body))
    }
}
