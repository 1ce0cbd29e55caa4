//! # Controller
//!
//! Glue between kube-runtime's `Controller` and the reconciliation state
//! machine.
//!
//! - `backoff`: Fibonacci backoff for failed reconciliations
//!
//! Every pass resolves the triggering object (or the served instance when the
//! trigger is gone) and runs the state machine from the served filter.
//! Deleted objects flow into the teardown steps from there.

pub mod backoff;

use crate::config::ControllerConfig;
use crate::crd::DockerRegistry;
use crate::observability::metrics;
use crate::state::{resolve_registry_or_served, StateError, StateMachine, StateReconciler, Step};
use crate::store::{ObjectKey, RegistryStore};
use backoff::BackoffTable;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn, Instrument};

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("Reconciliation failed: {0}")]
    ReconciliationFailed(#[from] StateError),
}

impl ReconcilerError {
    pub fn is_warning(&self) -> bool {
        match self {
            ReconcilerError::ReconciliationFailed(e) => e.is_warning(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ReconcilerError::ReconciliationFailed(e) => e.kind(),
        }
    }
}

/// Shared state of all reconciliations
pub struct Context {
    pub machine: StateMachine,
    pub store: Arc<dyn RegistryStore>,
    pub backoff: BackoffTable,
    pub warning_resync: Duration,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("backoff", &self.backoff)
            .field("warning_resync", &self.warning_resync)
            .finish_non_exhaustive()
    }
}

impl Context {
    pub fn new(reconciler: StateReconciler, config: &ControllerConfig) -> Self {
        Self {
            store: Arc::clone(&reconciler.store),
            machine: StateMachine::new(reconciler),
            backoff: BackoffTable::new(config.backoff_min_minutes, config.backoff_max_minutes),
            warning_resync: config.warning_resync_duration(),
        }
    }
}

/// Reconcile entry point handed to `Controller::run`
pub async fn reconcile(
    obj: Arc<DockerRegistry>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::from_object(&obj);
    let span = tracing::info_span!(
        "reconcile",
        resource.name = %key.name,
        resource.namespace = %key.namespace,
        resource.kind = "DockerRegistry"
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations();

        let Some(instance) = resolve_registry_or_served(ctx.store.as_ref(), &key).await? else {
            debug!("no instance and no served instance found, nothing to do");
            return Ok(Action::await_change());
        };

        let instance_key = ObjectKey::from_object(&instance);
        let action = ctx.machine.run(instance, Step::ServedFilter).await?;

        // Failures are recorded under the triggering key; a fallback pass
        // also clears the served instance's own entry.
        ctx.backoff.reset(&key.to_string());
        if instance_key != key {
            ctx.backoff.reset(&instance_key.to_string());
        }
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());
        info!(elapsed_ms = start.elapsed().as_millis(), "reconciliation finished");
        Ok(action)
    }
    .instrument(span)
    .await
}

/// Requeue policy for failed passes.
///
/// Warnings wait for the slow resync.
/// Everything else backs off per object on a Fibonacci sequence.
pub fn error_policy(obj: Arc<DockerRegistry>, error: &ReconcilerError, ctx: Arc<Context>) -> Action {
    let key = ObjectKey::from_object(&obj).to_string();
    metrics::increment_reconciliation_errors(error.kind());

    if error.is_warning() {
        warn!(resource = %key, "Reconciliation needs attention: {}", error);
        metrics::increment_requeues_total("warning-resync");
        return Action::requeue(ctx.warning_resync);
    }

    let (delay, error_count) = ctx.backoff.next_delay(&key);
    error!(resource = %key, "Reconciliation error: {}", error);
    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {})",
        delay.as_secs(),
        error_count
    );
    metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}
