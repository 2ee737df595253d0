//! Collector Layer
//!
//! Pluggable collection units, one per snapshot record key. All collectors
//! in a cycle run concurrently against the same read-only cluster reader;
//! the orchestrator in [`crate::telemetry`] fans them out and joins them.
//!
//! # Architecture
//!
//! - [`Collector`]: core trait for implementing collectors
//! - [`CollectorRegistry`]: explicit startup-time registry with duplicate
//!   record-key validation
//! - [`cluster`], [`extension`], [`platform`]: the built-in collectors

pub mod cluster;
pub mod extension;
pub mod platform;
mod registry;
mod traits;

pub use registry::{CollectorRegistry, RegistryError};
pub use traits::{CollectError, Collector};
