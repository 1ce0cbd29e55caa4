//! # Registry Store
//!
//! Access to `DockerRegistry` objects in the cluster. Reconciliation steps
//! only talk to the API server through [`RegistryStore`], which keeps them
//! runnable against in-memory fakes.

use crate::crd::DockerRegistry;
use async_trait::async_trait;
use kube::{
    api::{Api, ListParams, Patch, PatchParams},
    Client,
};
use std::fmt;
use thiserror::Error;

/// Field manager used for status and metadata patches
pub const FIELD_MANAGER: &str = "registry-operator";

/// Namespace and name of a `DockerRegistry`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn from_object(obj: &DockerRegistry) -> Self {
        Self::new(
            obj.metadata.namespace.as_deref().unwrap_or("default"),
            obj.metadata.name.as_deref().unwrap_or("unknown"),
        )
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Kube(#[from] kube::Error),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// `Ok(None)` when no object has this identity
    async fn get(&self, key: &ObjectKey) -> Result<Option<DockerRegistry>, StoreError>;

    /// Every `DockerRegistry` in the cluster, in no particular order
    async fn list(&self) -> Result<Vec<DockerRegistry>, StoreError>;

    /// Persists `obj.status`. An object that no longer exists is not an error.
    async fn update_status(&self, obj: &DockerRegistry) -> Result<(), StoreError>;

    /// Replaces the finalizer list of `obj`
    async fn update_finalizers(
        &self,
        obj: &DockerRegistry,
        finalizers: &[String],
    ) -> Result<(), StoreError>;
}

/// [`RegistryStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeRegistryStore {
    client: Client,
}

impl fmt::Debug for KubeRegistryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubeRegistryStore").finish_non_exhaustive()
    }
}

impl KubeRegistryStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced(&self, namespace: &str) -> Api<DockerRegistry> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl RegistryStore for KubeRegistryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DockerRegistry>, StoreError> {
        Ok(self.namespaced(&key.namespace).get_opt(&key.name).await?)
    }

    async fn list(&self) -> Result<Vec<DockerRegistry>, StoreError> {
        let api: Api<DockerRegistry> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn update_status(&self, obj: &DockerRegistry) -> Result<(), StoreError> {
        let key = ObjectKey::from_object(obj);
        let patch = serde_json::json!({
            "status": serde_json::to_value(&obj.status)?
        });

        match self
            .namespaced(&key.namespace)
            .patch_status(&key.name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_finalizers(
        &self,
        obj: &DockerRegistry,
        finalizers: &[String],
    ) -> Result<(), StoreError> {
        let key = ObjectKey::from_object(obj);
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });

        match self
            .namespaced(&key.namespace)
            .patch(&key.name, &PatchParams::default(), &Patch::Merge(patch))
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
