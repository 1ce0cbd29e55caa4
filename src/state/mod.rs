//! # Reconciliation State Machine
//!
//! A reconciliation pass is a chain of steps. Each step mutates the
//! in-memory [`SystemState`], may call the chart or the store, and returns a
//! [`StepResult`]: either the next step to run, or a terminal outcome made of
//! an optional [`Requeue`] directive and an optional error.
//!
//! Steps never block or sleep. Waiting is expressed by returning
//! [`Requeue::After`], which the controller runtime turns into a timed
//! re-invocation.
//!
//! ## Flow
//!
//! ```text
//! ServedFilter -> AddFinalizer -> Initialize -+-> (install, external)
//!                                             |
//!                                             +-> DeleteResources -> SafeDeletion
//!                                                   -> DeleteResourcesWithFilter -> RemoveFinalizer
//! ```

pub mod delete;
mod error;
mod finalizer;
pub mod served;

pub use error::StateError;
pub use served::{find_served_registry, resolve_registry_or_served};

use crate::chart::{ChartController, ChartFilter};
use crate::crd::{DockerRegistry, State};
use crate::observability::metrics;
use crate::store::{ObjectKey, RegistryStore};
use kube_runtime::controller::Action;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Collaborators available to every step
#[derive(Clone)]
pub struct StateReconciler {
    pub chart: Arc<dyn ChartController>,
    pub store: Arc<dyn RegistryStore>,
}

impl fmt::Debug for StateReconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateReconciler").finish_non_exhaustive()
    }
}

impl StateReconciler {
    pub fn new(chart: Arc<dyn ChartController>, store: Arc<dyn RegistryStore>) -> Self {
        Self { chart, store }
    }
}

/// Object under reconciliation, mutated in place by the steps
#[derive(Debug, Clone)]
pub struct SystemState {
    pub instance: DockerRegistry,
}

impl SystemState {
    pub fn new(instance: DockerRegistry) -> Self {
        Self { instance }
    }

    pub fn set_state(&mut self, state: State) {
        self.instance.set_state(state);
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::from_object(&self.instance)
    }

    pub fn is_being_deleted(&self) -> bool {
        self.instance.metadata.deletion_timestamp.is_some()
    }
}

/// Reconciliation steps
#[derive(Debug, Clone)]
pub enum Step {
    ServedFilter,
    AddFinalizer,
    Initialize,
    DeleteResources,
    SafeDeletion,
    DeleteResourcesWithFilter(Vec<ChartFilter>),
    RemoveFinalizer,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::ServedFilter => "ServedFilter",
            Step::AddFinalizer => "AddFinalizer",
            Step::Initialize => "Initialize",
            Step::DeleteResources => "DeleteResources",
            Step::SafeDeletion => "SafeDeletion",
            Step::DeleteResourcesWithFilter(_) => "DeleteResourcesWithFilter",
            Step::RemoveFinalizer => "RemoveFinalizer",
        }
    }

    pub async fn run(self, r: &StateReconciler, s: &mut SystemState) -> StepResult {
        match self {
            Step::ServedFilter => served::served_filter(r, s).await,
            Step::AddFinalizer => finalizer::add_finalizer(r, s).await,
            Step::Initialize => initialize(s),
            Step::DeleteResources => delete::delete_resources(s),
            Step::SafeDeletion => delete::safe_deletion(r, s).await,
            Step::DeleteResourcesWithFilter(filters) => {
                delete::delete_resources_with_filter(r, s, &filters).await
            }
            Step::RemoveFinalizer => finalizer::remove_finalizer(r, s).await,
        }
    }
}

/// Instruction to the scheduler once a pass ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    Immediately,
    After(Duration),
    /// No automatic re-invocation until the next external trigger
    Stop,
}

impl Requeue {
    pub fn to_action(self) -> Action {
        match self {
            Requeue::Immediately => Action::requeue(Duration::ZERO),
            Requeue::After(delay) => Action::requeue(delay),
            Requeue::Stop => Action::await_change(),
        }
    }
}

/// Outcome of one step. `next` is exclusive with the terminal fields.
#[derive(Debug)]
pub struct StepResult {
    pub next: Option<Step>,
    pub requeue: Option<Requeue>,
    pub error: Option<StateError>,
}

impl StepResult {
    pub fn next_state(step: Step) -> Self {
        Self {
            next: Some(step),
            requeue: None,
            error: None,
        }
    }

    pub fn stop() -> Self {
        Self {
            next: None,
            requeue: Some(Requeue::Stop),
            error: None,
        }
    }

    /// Terminal error left to the runtime's retry policy
    pub fn stop_with_eventual_error(err: StateError) -> Self {
        Self {
            next: None,
            requeue: None,
            error: Some(err),
        }
    }

    pub fn requeue_after(delay: Duration) -> Self {
        Self {
            next: None,
            requeue: Some(Requeue::After(delay)),
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next.is_none()
    }
}

/// Hands a live object over to the install pipeline, or routes a deleted
/// one into teardown
fn initialize(s: &mut SystemState) -> StepResult {
    if s.is_being_deleted() {
        return StepResult::next_state(Step::DeleteResources);
    }

    debug!(instance = %s.key(), "finalizer present, install is handled by the install pipeline");
    StepResult::stop()
}

/// Drives the steps of one reconciliation pass
#[derive(Debug, Clone)]
pub struct StateMachine {
    reconciler: StateReconciler,
}

impl StateMachine {
    pub fn new(reconciler: StateReconciler) -> Self {
        Self { reconciler }
    }

    /// Runs from `start` until a step is terminal, then persists the status
    /// once if any step changed it.
    pub async fn run(&self, instance: DockerRegistry, start: Step) -> Result<Action, StateError> {
        let original_status = instance.status.clone();
        let mut state = SystemState::new(instance);
        let mut step = start;

        let result = loop {
            debug!(instance = %state.key(), step = step.name(), "running step");
            metrics::increment_steps_total(step.name());

            let mut result = step.run(&self.reconciler, &mut state).await;
            match result.next.take() {
                Some(next) => step = next,
                None => break result,
            }
        };

        if let (Some(status), Some(original)) = (state.instance.status.as_mut(), &original_status) {
            status.keep_transition_times(original);
        }

        if state.instance.status != original_status {
            if let Err(e) = self.reconciler.store.update_status(&state.instance).await {
                match result.error {
                    Some(_) => warn!(instance = %state.key(), "failed to update status: {}", e),
                    None => return Err(StateError::store("while updating dockerregistry status", e)),
                }
            }
        }

        match result.error {
            Some(err) => Err(err),
            None => Ok(result.requeue.unwrap_or(Requeue::Stop).to_action()),
        }
    }
}
