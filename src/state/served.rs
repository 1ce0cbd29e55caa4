//! # Served Instance
//!
//! Several `DockerRegistry` objects may be declared, but only one of them is
//! served: the one whose `status.served` is `True`. This module resolves that
//! instance and decides the served flag for objects seen for the first time.
//!
//! When more than one object claims `served=True` (possible under concurrent
//! updates) the first one in listing order wins. Listing order is not stable.

use super::{StateError, StateReconciler, Step, StepResult, SystemState};
use crate::crd::{ConditionReason, ConditionType, DockerRegistry, Served, State};
use crate::store::{ObjectKey, RegistryStore};
use tracing::{debug, info, warn};

/// Returns the object named by `key`, or else the served instance.
///
/// `Ok(None)` means neither exists; callers decide whether that is expected.
pub async fn resolve_registry_or_served(
    store: &dyn RegistryStore,
    key: &ObjectKey,
) -> Result<Option<DockerRegistry>, StateError> {
    if let Some(instance) = store
        .get(key)
        .await
        .map_err(|e| StateError::store("while fetching dockerregistry instance", e))?
    {
        return Ok(Some(instance));
    }

    debug!(key = %key, "instance not found, looking up served instance");
    find_served_registry(store)
        .await
        .map_err(|e| match e {
            StateError::Store { source, .. } => {
                StateError::store("while fetching served dockerregistry instance", source)
            }
            other => other,
        })
}

/// First listed object with `served` explicitly `True`
pub async fn find_served_registry(
    store: &dyn RegistryStore,
) -> Result<Option<DockerRegistry>, StateError> {
    let items = store
        .list()
        .await
        .map_err(|e| StateError::store("while listing dockerregistry instances", e))?;

    Ok(items
        .into_iter()
        .find(|item| !item.is_served_empty() && item.is_served()))
}

/// Decides whether this object is the served one.
///
/// Objects already marked not served are left alone. The first object seen
/// while no other is served becomes the served one.
pub async fn served_filter(r: &StateReconciler, s: &mut SystemState) -> StepResult {
    match s.instance.served() {
        Some(Served::True) => return StepResult::next_state(Step::AddFinalizer),
        Some(Served::False) => {
            debug!(instance = %s.key(), "instance is not served, skipping");
            return StepResult::stop();
        }
        None => {}
    }

    let served = match find_served_registry(r.store.as_ref()).await {
        Ok(served) => served,
        Err(err) => {
            warn!(instance = %s.key(), "failed to look up served instance: {}", err);
            s.set_state(State::Error);
            s.instance.update_condition_false(
                ConditionType::Configured,
                ConditionReason::ServedError,
                &err,
            );
            return StepResult::stop_with_eventual_error(err);
        }
    };

    match served {
        None => {
            info!(instance = %s.key(), "marking instance as served");
            s.instance.set_served(Served::True);
            StepResult::next_state(Step::AddFinalizer)
        }
        Some(other) => {
            let err = StateError::ServedConflict {
                served: ObjectKey::from_object(&other).to_string(),
            };
            warn!(instance = %s.key(), "{}", err);
            s.instance.set_served(Served::False);
            s.set_state(State::Warning);
            s.instance.update_condition_false(
                ConditionType::Configured,
                ConditionReason::ServedError,
                &err,
            );
            StepResult::stop_with_eventual_error(err)
        }
    }
}
