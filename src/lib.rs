//! Registry Operator Library
//!
//! Reconciliation core of a controller that manages `DockerRegistry`
//! resources: the deletion state machine, served-instance resolution and
//! status condition bookkeeping, plus the chart and store collaborators
//! they run against.

pub mod chart;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod server;
pub mod state;
pub mod store;

pub use crd::{DockerRegistry, DockerRegistrySpec, DockerRegistryStatus};
