//! HTTP client for a remote release service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::debug;

use super::{Chart, Release, ReleaseManager, Values};
use crate::config::ReleaseConfig;
use crate::error::{ControllerError, ControllerResult};

/// Body of an install or upgrade request.
#[derive(Serialize)]
struct ApplyRequest<'a> {
    action: ApplyAction,
    chart: &'a Chart,
    values: Values,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
enum ApplyAction {
    Install,
    Upgrade,
}

/// HTTP client for the release service API.
#[derive(Debug, Clone)]
pub struct HttpReleaseClient {
    client: Client,
    base_url: String,
}

impl HttpReleaseClient {
    /// Create a new client from configuration.
    pub fn new(config: &ReleaseConfig) -> ControllerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(ControllerError::Http)?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
        })
    }

    /// Create a new client with a custom base URL.
    pub fn with_url(url: impl Into<String>) -> ControllerResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ControllerError::Http)?;

        Ok(Self {
            client,
            base_url: url.into().trim_end_matches('/').to_owned(),
        })
    }

    fn release_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/namespaces/{namespace}/releases/{name}", self.base_url)
    }

    /// Fetch the live state of an object managed by a release.
    ///
    /// `api_version` is `group/version`, or just `version` for the core
    /// group. Returns `None` if the object does not exist.
    pub async fn get_object(
        &self,
        namespace: &str,
        api_version: &str,
        kind: &str,
        name: &str,
    ) -> ControllerResult<Option<serde_json::Value>> {
        let url = format!(
            "{}/namespaces/{namespace}/objects/{api_version}/{kind}/{name}",
            self.base_url
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(ControllerError::Http)?;

        match response.status() {
            StatusCode::OK => response.json().await.map(Some).map_err(ControllerError::Http),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(ControllerError::release(format!(
                "failed to get object {kind} {namespace}/{name}: {status}"
            ))),
        }
    }

    async fn apply(
        &self,
        action: ApplyAction,
        namespace: &str,
        name: &str,
        chart: &Chart,
        values: Values,
    ) -> ControllerResult<Release> {
        let url = self.release_url(namespace, name);
        debug!(url = %url, action = ?action, "applying release");

        let response = self
            .client
            .put(&url)
            .json(&ApplyRequest {
                action,
                chart,
                values,
            })
            .send()
            .await
            .map_err(ControllerError::Http)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ControllerError::release(format!(
                "{action:?} of {namespace}/{name} failed: {status}: {body}"
            )));
        }

        response.json().await.map_err(ControllerError::Http)
    }
}

#[async_trait]
impl ReleaseManager for HttpReleaseClient {
    async fn get(&self, namespace: &str, name: &str) -> ControllerResult<Option<Release>> {
        let response = self
            .client
            .get(self.release_url(namespace, name))
            .send()
            .await
            .map_err(ControllerError::Http)?;

        match response.status() {
            StatusCode::OK => response.json().await.map(Some).map_err(ControllerError::Http),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(ControllerError::release(format!(
                "failed to get release {namespace}/{name}: {status}"
            ))),
        }
    }

    async fn install(
        &self,
        namespace: &str,
        name: &str,
        chart: &Chart,
        values: Values,
    ) -> ControllerResult<Release> {
        self.apply(ApplyAction::Install, namespace, name, chart, values)
            .await
    }

    async fn upgrade(
        &self,
        namespace: &str,
        name: &str,
        chart: &Chart,
        values: Values,
    ) -> ControllerResult<Release> {
        self.apply(ApplyAction::Upgrade, namespace, name, chart, values)
            .await
    }

    async fn uninstall(&self, namespace: &str, name: &str) -> ControllerResult<()> {
        let response = self
            .client
            .delete(self.release_url(namespace, name))
            .send()
            .await
            .map_err(ControllerError::Http)?;

        match response.status() {
            StatusCode::OK | StatusCode::NO_CONTENT => Ok(()),
            StatusCode::NOT_FOUND => Err(ControllerError::release(format!(
                "uninstall: release not loaded: {namespace}/{name}"
            ))),
            status => Err(ControllerError::release(format!(
                "failed to uninstall {namespace}/{name}: {status}"
            ))),
        }
    }

    async fn list_deployed(&self) -> ControllerResult<Vec<Release>> {
        let url = format!("{}/releases", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("status", "deployed")])
            .send()
            .await
            .map_err(ControllerError::Http)?;

        if !response.status().is_success() {
            return Err(ControllerError::release(format!(
                "failed to list releases: {}",
                response.status()
            )));
        }

        response.json().await.map_err(ControllerError::Http)
    }
}
