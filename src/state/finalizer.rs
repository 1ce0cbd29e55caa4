//! # Finalizer Steps

use super::{StateError, StateReconciler, Step, StepResult, SystemState};
use crate::crd::FINALIZER;
use tracing::{debug, info};

fn has_finalizer(s: &SystemState) -> bool {
    s.instance
        .metadata
        .finalizers
        .as_ref()
        .is_some_and(|f| f.iter().any(|name| name == FINALIZER))
}

/// Makes sure a served instance cannot disappear before its bundle is removed
pub async fn add_finalizer(r: &StateReconciler, s: &mut SystemState) -> StepResult {
    if has_finalizer(s) {
        return StepResult::next_state(Step::Initialize);
    }

    if s.is_being_deleted() {
        // Nothing was ever installed for this object
        debug!(instance = %s.key(), "instance deleted before finalizer was added");
        return StepResult::stop();
    }

    let mut finalizers = s.instance.metadata.finalizers.clone().unwrap_or_default();
    finalizers.push(FINALIZER.to_string());

    if let Err(e) = r.store.update_finalizers(&s.instance, &finalizers).await {
        return StepResult::stop_with_eventual_error(StateError::store(
            "while adding dockerregistry finalizer",
            e,
        ));
    }

    info!(instance = %s.key(), "finalizer added");
    s.instance.metadata.finalizers = Some(finalizers);
    StepResult::next_state(Step::Initialize)
}

/// Lets the API server garbage-collect the object
pub async fn remove_finalizer(r: &StateReconciler, s: &mut SystemState) -> StepResult {
    if !has_finalizer(s) {
        return StepResult::stop();
    }

    let finalizers: Vec<String> = s
        .instance
        .metadata
        .finalizers
        .iter()
        .flatten()
        .filter(|name| *name != FINALIZER)
        .cloned()
        .collect();

    if let Err(e) = r.store.update_finalizers(&s.instance, &finalizers).await {
        return StepResult::stop_with_eventual_error(StateError::store(
            "while removing dockerregistry finalizer",
            e,
        ));
    }

    info!(instance = %s.key(), "finalizer removed");
    s.instance.metadata.finalizers = Some(finalizers);
    StepResult::stop()
}
