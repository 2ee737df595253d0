//! Cluster-State Client Layer
//!
//! Read-only typed access to the cluster-scoped resources the collectors
//! draw from (cluster registrations, node inventories, extension installs,
//! tenancy records).
//!
//! # Architecture
//!
//! - [`ClusterReader`]: the access seam collectors depend on
//! - [`HttpClusterReader`]: `reqwest`-backed implementation over the
//!   platform REST API

mod http;
mod traits;
pub mod types;

pub use http::HttpClusterReader;
pub use traits::{ClientError, ClusterReader};
