//! # Deletion Steps
//!
//! Teardown of the registry bundle once a served `DockerRegistry` is
//! deleted. Secrets always go first; the remaining objects are only
//! uninstalled after every secret is gone, so no workload is left running
//! against missing credentials.
//!
//! Every step can be re-run from scratch after a restart: the chart
//! treats objects that are already gone as uninstalled.

use super::{StateError, StateReconciler, Step, StepResult, SystemState};
use crate::chart::{ChartError, ChartFilter};
use crate::crd::{ConditionReason, ConditionType, State};
use std::time::Duration;
use tracing::{info, warn};

/// Poll interval while secrets wait for their own finalizers
pub const SECRETS_REMOVAL_REQUEUE: Duration = Duration::from_secs(1);

/// Entry step of the teardown. No cluster side effects.
pub fn delete_resources(s: &mut SystemState) -> StepResult {
    s.set_state(State::Deleting);
    s.instance.update_condition_unknown(
        ConditionType::Deleted,
        ConditionReason::Deletion,
        "Uninstalling",
    );

    StepResult::next_state(Step::SafeDeletion)
}

/// Refuses to tear down while user objects still depend on the chart's CRDs.
///
/// That is a Warning, not an Error: someone has to remove the orphans, and
/// retrying quickly will not change the outcome.
pub async fn safe_deletion(r: &StateReconciler, s: &mut SystemState) -> StepResult {
    if let Err(err) = r.chart.check_orphan_resources().await {
        warn!(instance = %s.key(), "deletion blocked by orphan resources: {}", err);
        s.set_state(State::Warning);
        s.instance.update_condition_false(
            ConditionType::Deleted,
            ConditionReason::DeletionErr,
            &err,
        );
        return StepResult::stop_with_eventual_error(StateError::OrphanResources(err));
    }

    StepResult::next_state(Step::DeleteResourcesWithFilter(Vec::new()))
}

/// Uninstalls secrets, waits for them to disappear, then uninstalls the rest
pub async fn delete_resources_with_filter(
    r: &StateReconciler,
    s: &mut SystemState,
    filters: &[ChartFilter],
) -> StepResult {
    match r.chart.uninstall_secrets(filters).await {
        Err(err) => return uninstall_secrets_error(s, err),
        Ok(false) => return awaiting_secrets_removal(s),
        Ok(true) => {}
    }

    if let Err(err) = r.chart.uninstall(filters).await {
        return uninstall_resources_error(s, err);
    }

    info!(instance = %s.key(), "registry bundle uninstalled");
    s.set_state(State::Deleting);
    s.instance.update_condition_true(
        ConditionType::Deleted,
        ConditionReason::Deleted,
        "module deleted",
    );

    StepResult::next_state(Step::RemoveFinalizer)
}

fn awaiting_secrets_removal(s: &mut SystemState) -> StepResult {
    s.set_state(State::Deleting);
    s.instance.update_condition_true(
        ConditionType::Deleted,
        ConditionReason::Deletion,
        "Deleting secrets",
    );

    StepResult::requeue_after(SECRETS_REMOVAL_REQUEUE)
}

fn uninstall_secrets_error(s: &mut SystemState, err: ChartError) -> StepResult {
    warn!(instance = %s.key(), "error while uninstalling secrets: {}", err);
    s.set_state(State::Error);
    s.instance.update_condition_false(
        ConditionType::Deleted,
        ConditionReason::DeletionErr,
        &err,
    );
    StepResult::stop_with_eventual_error(StateError::SecretsUninstall(err))
}

fn uninstall_resources_error(s: &mut SystemState, err: ChartError) -> StepResult {
    warn!(instance = %s.key(), "error while uninstalling resources: {}", err);
    s.set_state(State::Error);
    s.instance.update_condition_false(
        ConditionType::Deleted,
        ConditionReason::DeletionErr,
        &err,
    );
    StepResult::stop_with_eventual_error(StateError::ResourceUninstall(err))
}
