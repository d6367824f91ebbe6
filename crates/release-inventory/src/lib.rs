//! Release Inventory
//!
//! A one-shot, read-only scan of every deployed release. Each release's
//! manifest is split into objects, the live state of every object is
//! fetched concurrently, and the results are aggregated into counts per
//! kind plus ready/not-ready totals for the kinds whose readiness is known.
//!
//! There is no queue, no retry and no write path.

#![forbid(unsafe_code)]

pub mod error;
pub mod manifest;
pub mod reader;
pub mod report;

pub use error::{InventoryError, InventoryResult};
pub use manifest::{parse_manifest, ManifestObject};
pub use reader::{ClusterReader, HttpClusterReader};
pub use report::{build_report, readiness, InventoryReport, Readiness};
