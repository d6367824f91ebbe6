//! Helm Controller
//!
//! A level-triggered reconciliation controller. It watches deployment
//! intents and drives a release for each one towards the image and replica
//! count the intent declares, retrying failures with per-key backoff and
//! writing the outcome back onto the intent's status.
//!
//! # Architecture
//!
//! ```text
//! intent store ──events──▶ WorkQueue ──▶ workers ──▶ Controller::reconcile
//!      ▲                                                   │
//!      └──────────────── StatusWriter ◀────────────────────┤
//!                                                          ▼
//!                                                   ReleaseManager
//! ```
//!
//! - **Work queue**: deduplicates keys and never hands the same key to two
//!   workers at once. Failed keys come back after an exponential backoff.
//! - **Converge**: installs a missing release, upgrades one whose image or
//!   replica count differs, and otherwise leaves it alone.
//! - **Status**: every attempt is recorded on a copy of the intent; the
//!   cached intent is never modified in place.
//! - **Deletion**: deleting an intent uninstalls its release, best effort.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use helm_controller::{Chart, Controller, MemoryIntentStore, MemoryReleaseManager};
//!
//! let store = Arc::new(MemoryIntentStore::new());
//! let chart = Arc::new(Chart::load("/charts/base").await?);
//! let controller = Arc::new(Controller::new(
//!     store.clone(),
//!     store.clone(),
//!     Arc::new(MemoryReleaseManager::new()),
//!     chart,
//! ));
//! controller.run(store.as_ref(), 2, cancel).await?;
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod controller;
pub mod error;
pub mod queue;
pub mod release;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types at the crate root
pub use config::ControllerConfig;
pub use controller::{Controller, Plan};
pub use error::{ControllerError, ControllerResult};
pub use queue::{ItemExponentialBackoff, QueueItem, RateLimiter, WorkQueue};
pub use release::{
    Chart, ChartMetadata, HttpReleaseClient, MemoryReleaseManager, Release, ReleaseManager,
    ReleaseValues, Values,
};
pub use service::ControllerService;
pub use store::{
    DeletedObject, DirectoryIntentSource, IntentEvent, IntentEvents, IntentLister,
    MemoryIntentStore, StatusWriter,
};
pub use types::{DeploymentIntent, IntentSpec, IntentStatus, ReleaseStatus, ResourceKey};
