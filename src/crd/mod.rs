//! # Custom Resource Definitions
//!
//! CRD types for the Registry Operator.
//!
//! This module contains the `DockerRegistry` custom resource and the status
//! types the reconciliation steps mutate.
//!
//! ## Module Structure
//!
//! - `spec.rs` - desired state (`DockerRegistrySpec`)
//! - `status.rs` - Status, phase, served flag and condition bookkeeping

mod spec;
mod status;

// Re-export all public types
pub use spec::{DockerRegistry, DockerRegistrySpec, ExternalAccess, Storage};
pub use status::{
    Condition, ConditionReason, ConditionStatus, ConditionType, DockerRegistryStatus, Served,
    State,
};

/// Finalizer the controller places on every served `DockerRegistry`
pub const FINALIZER: &str = "operator.registry.io/deletion-hook";
