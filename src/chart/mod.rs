//! # Chart
//!
//! The chart is the bundle of cluster objects that make up an installed
//! registry. Every cluster mutation of that bundle goes through the
//! [`ChartController`] trait so reconciliation steps stay testable.
//!
//! - `manifest`: parsing of pre-rendered multi-document YAML
//! - `dynamic`: [`ManifestChart`], a `ChartController` backed by the dynamic API

mod dynamic;
mod manifest;

pub use dynamic::ManifestChart;
pub use manifest::{parse_manifest, ManifestObject};

use async_trait::async_trait;
use kube::core::DynamicObject;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Errors reported by a chart collaborator
#[derive(Debug, Error)]
pub enum ChartError {
    /// Custom resources of a chart-owned CRD still exist
    #[error("found {count} orphan {kind} resource(s)")]
    OrphanResources { kind: String, count: usize },

    #[error("failed to parse chart manifest: {0}")]
    Manifest(String),

    #[error("failed to {action} {kind} {name}: {source}")]
    Kube {
        action: &'static str,
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("{0}")]
    Other(String),
}

/// Exclusion predicate over chart objects.
///
/// Returns `true` for objects that must be left in place.
#[derive(Clone)]
pub struct ChartFilter {
    name: &'static str,
    predicate: Arc<dyn Fn(&DynamicObject) -> bool + Send + Sync>,
}

impl ChartFilter {
    pub fn new<F>(name: &'static str, predicate: F) -> Self
    where
        F: Fn(&DynamicObject) -> bool + Send + Sync + 'static,
    {
        Self {
            name,
            predicate: Arc::new(predicate),
        }
    }

    /// Skips every object of the given kind
    pub fn kind(kind: &'static str) -> Self {
        Self::new(kind, move |obj| {
            obj.types.as_ref().is_some_and(|t| t.kind == kind)
        })
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn excludes(&self, obj: &DynamicObject) -> bool {
        (self.predicate)(obj)
    }
}

impl fmt::Debug for ChartFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ChartFilter").field(&self.name).finish()
    }
}

/// True if any filter excludes `obj`
pub fn is_excluded(filters: &[ChartFilter], obj: &DynamicObject) -> bool {
    filters.iter().any(|f| f.excludes(obj))
}

/// Cluster-side operations on the registry bundle.
///
/// Implementations must be idempotent: uninstalling objects that are already
/// gone is a success.
#[async_trait]
pub trait ChartController: Send + Sync {
    /// Fails with [`ChartError::OrphanResources`] when user-created objects
    /// still depend on the bundle
    async fn check_orphan_resources(&self) -> Result<(), ChartError>;

    /// Deletes the bundle's secrets.
    /// Returns `false` while some of them are still present.
    async fn uninstall_secrets(&self, filters: &[ChartFilter]) -> Result<bool, ChartError>;

    /// Deletes every remaining bundle object
    async fn uninstall(&self, filters: &[ChartFilter]) -> Result<(), ChartError>;
}
