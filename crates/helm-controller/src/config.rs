//! Configuration for helm-controller.

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{ControllerError, ControllerResult};

/// Top-level configuration for the controller service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Number of worker loops draining the queue.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Base chart configuration.
    #[serde(default)]
    pub chart: ChartConfig,

    /// Work queue retry configuration.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Release subsystem configuration.
    #[serde(default)]
    pub release: ReleaseConfig,

    /// Intent source configuration.
    #[serde(default)]
    pub source: SourceConfig,
}

const fn default_workers() -> usize {
    1
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            chart: ChartConfig::default(),
            queue: QueueConfig::default(),
            release: ReleaseConfig::default(),
            source: SourceConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a TOML file.
    ///
    /// Sources are layered in this order (later sources override earlier):
    /// 1. Default values
    /// 2. The file at `path` (if present)
    /// 3. Environment variables with `HELM_CONTROLLER_` prefix
    pub fn from_file(path: impl AsRef<std::path::Path>) -> ControllerResult<Self> {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("HELM_CONTROLLER_").split("__"))
            .extract()
            .map_err(|e| ControllerError::Config(e.to_string()))
    }

    /// Check values that deserialise fine but cannot be run.
    pub fn validate(&self) -> ControllerResult<()> {
        if self.workers == 0 {
            return Err(ControllerError::Config(
                "workers must be at least 1".to_owned(),
            ));
        }
        if self.queue.base_delay() > self.queue.max_delay() {
            return Err(ControllerError::Config(
                "queue.base_delay_ms must not exceed queue.max_delay_secs".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Base chart configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Directory holding `Chart.yaml` and `values.yaml`.
    #[serde(default = "default_chart_path")]
    pub path: PathBuf,
}

fn default_chart_path() -> PathBuf {
    PathBuf::from("/charts/base")
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            path: default_chart_path(),
        }
    }
}

/// Work queue retry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Delay before the first retry of a failing key, in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Ceiling for the retry delay, in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
}

const fn default_base_delay_ms() -> u64 {
    5
}

const fn default_max_delay_secs() -> u64 {
    1000
}

impl QueueConfig {
    /// First retry delay.
    #[must_use]
    pub const fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Maximum retry delay.
    #[must_use]
    pub const fn max_delay(&self) -> Duration {
        Duration::from_secs(self.max_delay_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

/// Release subsystem configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// Which release backend to use.
    #[serde(default)]
    pub backend: ReleaseBackend,

    /// Base URL of the release service (HTTP backend only).
    #[serde(default = "default_release_url")]
    pub url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_release_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_release_url() -> String {
    "http://localhost:8090".to_owned()
}

const fn default_release_timeout_secs() -> u64 {
    300
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            backend: ReleaseBackend::default(),
            url: default_release_url(),
            timeout_secs: default_release_timeout_secs(),
        }
    }
}

/// Release backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseBackend {
    /// Remote release service over HTTP.
    #[default]
    Http,

    /// In-process releases, for local runs and tests.
    Memory,
}

/// Intent source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory of `*.yaml` intent manifests.
    #[serde(default = "default_intents_dir")]
    pub intents_dir: PathBuf,

    /// How often the directory is re-listed, in seconds.
    #[serde(default = "default_resync_secs")]
    pub resync_secs: u64,
}

fn default_intents_dir() -> PathBuf {
    PathBuf::from("/etc/helm-controller/intents")
}

const fn default_resync_secs() -> u64 {
    30
}

impl SourceConfig {
    /// Resync period.
    #[must_use]
    pub const fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            intents_dir: default_intents_dir(),
            resync_secs: default_resync_secs(),
        }
    }
}
