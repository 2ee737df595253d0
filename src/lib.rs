//! Beacon - Cluster Telemetry Reporter
//!
//! This crate collects a consolidated snapshot of operational facts about a
//! cluster deployment (cluster identity, node inventory, installed
//! extensions, tenancy counts) and delivers it exactly once per invocation
//! to either a local artifact or a remote telemetry service.
//!
//! # Architecture
//!
//! - **Collectors**: independent units, each producing one named record of
//!   the snapshot, fanned out concurrently per cycle
//! - **Telemetry**: the orchestrator joining collectors into one canonical
//!   snapshot with all-or-nothing semantics
//! - **Report**: the delivery sink, either a local file or the durable
//!   persist/expire/sync pipeline against a record store
//! - **Store**: named, timestamped snapshot history records that survive
//!   process restarts and deduplicate remote delivery
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use beacon::{CollectorRegistry, HttpClusterReader, LocalReport, Telemetry};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = CollectorRegistry::with_defaults();
//! let reader = Arc::new(HttpClusterReader::new("http://127.0.0.1:9090", None)?);
//! let report = Arc::new(LocalReport::new("."));
//!
//! Telemetry::new(registry, reader, report)
//!     .run(&CancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod collector;
pub mod report;
pub mod store;
pub mod telemetry;

pub use client::{ClientError, ClusterReader, HttpClusterReader};
pub use collector::{CollectError, Collector, CollectorRegistry, RegistryError};
pub use report::{CloudReport, DeliveryClient, LocalReport, Report, ReportError};
pub use store::{ClusterInfoRecord, ClusterInfoStatus, FsRecordStore, RecordStore, StoreError};
pub use telemetry::{Snapshot, Telemetry, TelemetryError};
