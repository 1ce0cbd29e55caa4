//! # Manifest Chart
//!
//! [`ChartController`] implementation that tears down a pre-rendered bundle
//! through the Kubernetes dynamic API.

use super::{is_excluded, parse_manifest, ChartController, ChartError, ChartFilter, ManifestObject};
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{Api, ApiResource, DeleteParams, ListParams},
    core::DynamicObject,
    discovery::{self, Scope},
    error::DiscoveryError,
    Client,
};
use tracing::{debug, info};

/// Registry bundle read from a rendered manifest
#[derive(Clone)]
pub struct ManifestChart {
    client: Client,
    namespace: String,
    objects: Vec<ManifestObject>,
}

impl std::fmt::Debug for ManifestChart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestChart")
            .field("namespace", &self.namespace)
            .field("objects", &self.objects.len())
            .finish_non_exhaustive()
    }
}

impl ManifestChart {
    /// Namespaced objects without an explicit namespace land in `namespace`
    pub fn new(client: Client, namespace: impl Into<String>, manifest: &str) -> Result<Self, ChartError> {
        let objects = parse_manifest(manifest)?;
        Ok(Self {
            client,
            namespace: namespace.into(),
            objects,
        })
    }

    /// `None` when the API server no longer serves the object's kind, which
    /// happens once a bundled CRD has been removed
    async fn api_for(&self, obj: &ManifestObject) -> Result<Option<Api<DynamicObject>>, ChartError> {
        let (ar, caps) = match discovery::pinned_kind(&self.client, &obj.gvk).await {
            Ok(found) => found,
            Err(source) if is_kind_gone(&source) => {
                debug!(kind = obj.kind(), name = obj.name(), "kind no longer served");
                return Ok(None);
            }
            Err(source) => return Err(kube_error("discover", obj, source)),
        };

        let api = if caps.scope == Scope::Namespaced {
            let namespace = obj.namespace().unwrap_or(&self.namespace);
            Api::namespaced_with(self.client.clone(), namespace, &ar)
        } else {
            Api::all_with(self.client.clone(), &ar)
        };
        Ok(Some(api))
    }

    /// Deletes `obj`, treating an already missing object as deleted
    async fn delete(&self, obj: &ManifestObject) -> Result<(), ChartError> {
        let Some(api) = self.api_for(obj).await? else {
            return Ok(());
        };
        match api.delete(obj.name(), &DeleteParams::background()).await {
            Ok(_) => {
                debug!(kind = obj.kind(), name = obj.name(), "deleted chart object");
                Ok(())
            }
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => Ok(()),
            Err(source) => Err(kube_error("delete", obj, source)),
        }
    }

    async fn exists(&self, obj: &ManifestObject) -> Result<bool, ChartError> {
        let Some(api) = self.api_for(obj).await? else {
            return Ok(false);
        };
        api.get_opt(obj.name())
            .await
            .map(|found| found.is_some())
            .map_err(|source| kube_error("get", obj, source))
    }
}

/// Bundle objects still to delete: secrets or everything else, minus the
/// ones a filter keeps in place. Manifest order is preserved.
pub(crate) fn remaining<'a>(
    objects: &'a [ManifestObject],
    filters: &'a [ChartFilter],
    secrets: bool,
) -> impl DoubleEndedIterator<Item = &'a ManifestObject> + 'a {
    objects
        .iter()
        .filter(move |o| o.is_secret() == secrets)
        .filter(move |o| !is_excluded(filters, &o.object))
}

/// True for discovery failures meaning the kind is not served anymore
fn is_kind_gone(err: &kube::Error) -> bool {
    match err {
        kube::Error::Api(api_err) => api_err.code == 404,
        kube::Error::Discovery(
            DiscoveryError::MissingKind(_)
            | DiscoveryError::MissingApiGroup(_)
            | DiscoveryError::MissingResource(_),
        ) => true,
        _ => false,
    }
}

#[async_trait]
impl ChartController for ManifestChart {
    async fn check_orphan_resources(&self) -> Result<(), ChartError> {
        for obj in self.objects.iter().filter(|o| o.is_crd()) {
            let crd: CustomResourceDefinition = serde_json::to_value(&obj.object)
                .and_then(serde_json::from_value)
                .map_err(|e| ChartError::Manifest(format!("{}: {e}", obj.name())))?;

            let Some(version) = crd
                .spec
                .versions
                .iter()
                .find(|v| v.storage)
                .or_else(|| crd.spec.versions.first())
            else {
                continue;
            };

            let ar = ApiResource {
                group: crd.spec.group.clone(),
                version: version.name.clone(),
                api_version: format!("{}/{}", crd.spec.group, version.name),
                kind: crd.spec.names.kind.clone(),
                plural: crd.spec.names.plural.clone(),
            };
            let api: Api<DynamicObject> = Api::all_with(self.client.clone(), &ar);

            let instances = match api.list(&ListParams::default()).await {
                Ok(list) => list.items.len(),
                // CRD already gone, nothing can depend on it
                Err(kube::Error::Api(api_err)) if api_err.code == 404 => 0,
                Err(source) => return Err(kube_error("list", obj, source)),
            };

            if instances > 0 {
                return Err(ChartError::OrphanResources {
                    kind: ar.kind,
                    count: instances,
                });
            }
        }
        Ok(())
    }

    async fn uninstall_secrets(&self, filters: &[ChartFilter]) -> Result<bool, ChartError> {
        for obj in remaining(&self.objects, filters, true) {
            self.delete(obj).await?;
        }

        // Secrets with finalizers linger until their owners release them
        for obj in remaining(&self.objects, filters, true) {
            if self.exists(obj).await? {
                info!(name = obj.name(), "waiting for secret removal");
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn uninstall(&self, filters: &[ChartFilter]) -> Result<(), ChartError> {
        for obj in remaining(&self.objects, filters, false).rev() {
            self.delete(obj).await?;
        }
        Ok(())
    }
}

fn kube_error(action: &'static str, obj: &ManifestObject, source: kube::Error) -> ChartError {
    ChartError::Kube {
        action,
        kind: obj.kind().to_string(),
        name: obj.name().to_string(),
        source,
    }
}
