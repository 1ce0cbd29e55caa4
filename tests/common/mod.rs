//! In-memory collaborators for driving the state machine without a cluster.

#![allow(dead_code, reason = "each test binary uses a different subset of these helpers")]

use async_trait::async_trait;
use registry_operator::chart::{ChartController, ChartError, ChartFilter};
use registry_operator::crd::{DockerRegistry, DockerRegistrySpec, Served, FINALIZER};
use registry_operator::state::StateReconciler;
use registry_operator::store::{ObjectKey, RegistryStore, StoreError};
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "kyma-system";

/// Result of one `uninstall_secrets` call
#[derive(Debug, Clone)]
pub enum SecretsOutcome {
    Removed,
    Pending,
    Fail(String),
}

#[derive(Debug)]
pub struct FakeChart {
    orphan_error: Option<String>,
    secrets: SecretsOutcome,
    uninstall_error: Option<String>,
    calls: Mutex<Vec<&'static str>>,
    filters_seen: Mutex<Vec<Vec<String>>>,
}

impl Default for FakeChart {
    fn default() -> Self {
        Self {
            orphan_error: None,
            secrets: SecretsOutcome::Removed,
            uninstall_error: None,
            calls: Mutex::new(Vec::new()),
            filters_seen: Mutex::new(Vec::new()),
        }
    }
}

impl FakeChart {
    pub fn with_orphans(mut self, message: &str) -> Self {
        self.orphan_error = Some(message.to_string());
        self
    }

    pub fn with_secrets(mut self, outcome: SecretsOutcome) -> Self {
        self.secrets = outcome;
        self
    }

    pub fn with_uninstall_error(mut self, message: &str) -> Self {
        self.uninstall_error = Some(message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    /// Filter names passed to each uninstall call, in call order
    pub fn filters_seen(&self) -> Vec<Vec<String>> {
        self.filters_seen.lock().unwrap().clone()
    }

    fn record_filters(&self, filters: &[ChartFilter]) {
        self.filters_seen
            .lock()
            .unwrap()
            .push(filters.iter().map(|f| f.name().to_string()).collect());
    }

    fn record(&self, call: &'static str) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChartController for FakeChart {
    async fn check_orphan_resources(&self) -> Result<(), ChartError> {
        self.record("check_orphan_resources");
        match &self.orphan_error {
            Some(message) => Err(ChartError::Other(message.clone())),
            None => Ok(()),
        }
    }

    async fn uninstall_secrets(&self, filters: &[ChartFilter]) -> Result<bool, ChartError> {
        self.record("uninstall_secrets");
        self.record_filters(filters);
        match &self.secrets {
            SecretsOutcome::Removed => Ok(true),
            SecretsOutcome::Pending => Ok(false),
            SecretsOutcome::Fail(message) => Err(ChartError::Other(message.clone())),
        }
    }

    async fn uninstall(&self, filters: &[ChartFilter]) -> Result<(), ChartError> {
        self.record("uninstall");
        self.record_filters(filters);
        match &self.uninstall_error {
            Some(message) => Err(ChartError::Other(message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeStore {
    objects: Mutex<Vec<DockerRegistry>>,
    status_writes: Mutex<Vec<DockerRegistry>>,
    finalizer_updates: Mutex<Vec<Vec<String>>>,
    fail_get: bool,
    fail_list: bool,
    fail_status: bool,
    fail_finalizers: bool,
}

impl FakeStore {
    pub fn with_objects(objects: Vec<DockerRegistry>) -> Self {
        Self {
            objects: Mutex::new(objects),
            ..Self::default()
        }
    }

    pub fn failing_get(mut self) -> Self {
        self.fail_get = true;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn failing_status(mut self) -> Self {
        self.fail_status = true;
        self
    }

    pub fn failing_finalizers(mut self) -> Self {
        self.fail_finalizers = true;
        self
    }

    pub fn status_writes(&self) -> Vec<DockerRegistry> {
        self.status_writes.lock().unwrap().clone()
    }

    pub fn finalizer_updates(&self) -> Vec<Vec<String>> {
        self.finalizer_updates.lock().unwrap().clone()
    }

    pub fn object(&self, name: &str) -> Option<DockerRegistry> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.metadata.name.as_deref() == Some(name))
            .cloned()
    }
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl RegistryStore for FakeStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DockerRegistry>, StoreError> {
        if self.fail_get {
            return Err(unavailable());
        }
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .find(|o| ObjectKey::from_object(o) == *key)
            .cloned())
    }

    async fn list(&self) -> Result<Vec<DockerRegistry>, StoreError> {
        if self.fail_list {
            return Err(unavailable());
        }
        Ok(self.objects.lock().unwrap().clone())
    }

    async fn update_status(&self, obj: &DockerRegistry) -> Result<(), StoreError> {
        if self.fail_status {
            return Err(unavailable());
        }
        self.status_writes.lock().unwrap().push(obj.clone());
        let key = ObjectKey::from_object(obj);
        if let Some(stored) = self
            .objects
            .lock()
            .unwrap()
            .iter_mut()
            .find(|o| ObjectKey::from_object(o) == key)
        {
            stored.status = obj.status.clone();
        }
        Ok(())
    }

    async fn update_finalizers(
        &self,
        obj: &DockerRegistry,
        finalizers: &[String],
    ) -> Result<(), StoreError> {
        if self.fail_finalizers {
            return Err(unavailable());
        }
        self.finalizer_updates.lock().unwrap().push(finalizers.to_vec());
        let key = ObjectKey::from_object(obj);
        if let Some(stored) = self
            .objects
            .lock()
            .unwrap()
            .iter_mut()
            .find(|o| ObjectKey::from_object(o) == key)
        {
            stored.metadata.finalizers = Some(finalizers.to_vec());
        }
        Ok(())
    }
}

pub fn registry(name: &str) -> DockerRegistry {
    let mut dr = DockerRegistry::new(name, DockerRegistrySpec::default());
    dr.metadata.namespace = Some(NAMESPACE.to_string());
    dr
}

pub fn served_registry(name: &str, served: Served) -> DockerRegistry {
    let mut dr = registry(name);
    dr.set_served(served);
    dr
}

/// Served instance marked for deletion that still carries the finalizer
pub fn deleted_registry(name: &str) -> DockerRegistry {
    let mut dr: DockerRegistry = serde_json::from_value(serde_json::json!({
        "apiVersion": "operator.registry.io/v1alpha1",
        "kind": "DockerRegistry",
        "metadata": {
            "name": name,
            "namespace": NAMESPACE,
            "deletionTimestamp": "2024-01-01T00:00:00Z",
            "finalizers": [FINALIZER]
        },
        "spec": {}
    }))
    .unwrap();
    dr.set_served(Served::True);
    dr
}

pub fn reconciler(chart: &Arc<FakeChart>, store: &Arc<FakeStore>) -> StateReconciler {
    StateReconciler::new(
        Arc::clone(chart) as Arc<dyn ChartController>,
        Arc::clone(store) as Arc<dyn RegistryStore>,
    )
}
