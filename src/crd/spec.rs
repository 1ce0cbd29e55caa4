//! # DockerRegistry Spec
//!
//! `DockerRegistry` desired state and its nested settings.

use serde::{Deserialize, Serialize};

/// DockerRegistry Custom Resource Definition
///
/// Describes a container-image registry deployment. The controller never
/// creates these objects; it installs the registry bundle for the served
/// instance and tears it down when the object is deleted.
///
/// # Example
///
/// ```yaml
/// apiVersion: operator.registry.io/v1alpha1
/// kind: DockerRegistry
/// metadata:
///   name: default
///   namespace: kyma-system
/// spec:
///   storage:
///     deleteEnabled: true
///   externalAccess:
///     enabled: true
///     host: registry.example.com
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "DockerRegistry",
    group = "operator.registry.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::DockerRegistryStatus",
    shortname = "dr",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".status.state"}, {"name":"Served", "type":"string", "jsonPath":".status.served"}, {"name":"Deleted", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Deleted\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DockerRegistrySpec {
    /// Registry storage backend settings
    #[serde(default)]
    pub storage: Option<Storage>,
    /// Exposes the registry outside the cluster
    #[serde(default)]
    pub external_access: Option<ExternalAccess>,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Storage {
    /// Allow image deletion through the registry API
    #[serde(default)]
    pub delete_enabled: bool,
    /// Name of an existing PersistentVolumeClaim to store images in
    #[serde(default)]
    pub pvc: Option<String>,
}

/// External access configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExternalAccess {
    #[serde(default)]
    pub enabled: bool,
    /// Gateway in `namespace/name` form
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
}
