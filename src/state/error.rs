//! # State Machine Errors

use crate::chart::ChartError;
use crate::store::StoreError;
use thiserror::Error;

/// Terminal errors of a reconciliation step.
///
/// Chart errors are transparent so the caller sees exactly what the chart
/// collaborator reported.
#[derive(Debug, Error)]
pub enum StateError {
    /// Objects created from the chart's CRDs still exist
    #[error(transparent)]
    OrphanResources(ChartError),

    #[error(transparent)]
    SecretsUninstall(ChartError),

    #[error(transparent)]
    ResourceUninstall(ChartError),

    /// Another `DockerRegistry` is already served
    #[error(
        "Only one instance of DockerRegistry is allowed (current served instance: {served}). \
         This DockerRegistry CR is redundant. Remove it to fix the problem."
    )]
    ServedConflict { served: String },

    #[error("{context}: {source}")]
    Store {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl StateError {
    pub(crate) fn store(context: &'static str, source: StoreError) -> Self {
        StateError::Store { context, source }
    }

    /// Warnings need an operator to act; retrying on a tight schedule does
    /// not help them.
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            StateError::OrphanResources(_) | StateError::ServedConflict { .. }
        )
    }

    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            StateError::OrphanResources(_) => "orphan-resources",
            StateError::SecretsUninstall(_) => "secrets-uninstall",
            StateError::ResourceUninstall(_) => "resource-uninstall",
            StateError::ServedConflict { .. } => "served-conflict",
            StateError::Store { .. } => "store",
        }
    }
}
