//! # Manifest Parsing
//!
//! Reads an already rendered registry bundle from multi-document YAML.

use super::ChartError;
use kube::core::{DynamicObject, GroupVersionKind};
use serde::Deserialize;

/// One object of the rendered bundle together with its resolved kind
#[derive(Debug, Clone)]
pub struct ManifestObject {
    pub gvk: GroupVersionKind,
    pub object: DynamicObject,
}

impl ManifestObject {
    pub fn kind(&self) -> &str {
        &self.gvk.kind
    }

    pub fn name(&self) -> &str {
        self.object.metadata.name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.object.metadata.namespace.as_deref()
    }

    pub fn is_secret(&self) -> bool {
        self.gvk.group.is_empty() && self.gvk.kind == "Secret"
    }

    pub fn is_crd(&self) -> bool {
        self.gvk.group == "apiextensions.k8s.io" && self.gvk.kind == "CustomResourceDefinition"
    }
}

/// Parses every non-empty YAML document of `manifest`.
///
/// Each document must carry `apiVersion`, `kind` and `metadata.name`.
pub fn parse_manifest(manifest: &str) -> Result<Vec<ManifestObject>, ChartError> {
    let mut objects = Vec::new();

    for document in serde_yaml::Deserializer::from_str(manifest) {
        let value = serde_yaml::Value::deserialize(document)
            .map_err(|e| ChartError::Manifest(e.to_string()))?;
        if value.is_null() {
            continue;
        }

        let object: DynamicObject =
            serde_yaml::from_value(value).map_err(|e| ChartError::Manifest(e.to_string()))?;
        let types = object
            .types
            .as_ref()
            .ok_or_else(|| ChartError::Manifest("object without apiVersion/kind".to_string()))?;
        if object.metadata.name.is_none() {
            return Err(ChartError::Manifest(format!(
                "{} without metadata.name",
                types.kind
            )));
        }

        let (group, version) = match types.api_version.split_once('/') {
            Some((group, version)) => (group, version),
            None => ("", types.api_version.as_str()),
        };
        let gvk = GroupVersionKind::gvk(group, version, &types.kind);

        objects.push(ManifestObject { gvk, object });
    }

    Ok(objects)
}
