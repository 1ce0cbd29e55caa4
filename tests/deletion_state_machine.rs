//! Teardown of a served `DockerRegistry` driven step by step and end to end.

mod common;

use common::{deleted_registry, reconciler, FakeChart, FakeStore, SecretsOutcome};
use kube_runtime::controller::Action;
use registry_operator::chart::ChartFilter;
use registry_operator::crd::{ConditionStatus, ConditionType, DockerRegistry, State, FINALIZER};
use registry_operator::state::{
    delete::SECRETS_REMOVAL_REQUEUE, Requeue, StateError, StateMachine, Step, SystemState,
};
use std::sync::Arc;
use std::time::Duration;

fn setup(chart: FakeChart) -> (Arc<FakeChart>, Arc<FakeStore>, StateMachine) {
    let chart = Arc::new(chart);
    let store = Arc::new(FakeStore::with_objects(vec![deleted_registry("default")]));
    let machine = StateMachine::new(reconciler(&chart, &store));
    (chart, store, machine)
}

fn deleted_condition(dr: &DockerRegistry) -> (ConditionStatus, String, String) {
    let c = dr
        .condition(ConditionType::Deleted)
        .expect("Deleted condition should be set");
    (c.status, c.reason.clone(), c.message.clone())
}

#[tokio::test]
async fn delete_resources_marks_deleting_and_unknown() {
    let chart = Arc::new(FakeChart::default());
    let store = Arc::new(FakeStore::default());
    let r = reconciler(&chart, &store);

    for existing in [State::Ready, State::Error, State::Warning] {
        let mut dr = deleted_registry("default");
        dr.set_state(existing);
        let mut s = SystemState::new(dr);

        let result = Step::DeleteResources.run(&r, &mut s).await;

        assert!(matches!(result.next, Some(Step::SafeDeletion)));
        assert_eq!(s.instance.state(), State::Deleting);
        let (status, reason, message) = deleted_condition(&s.instance);
        assert_eq!(status, ConditionStatus::Unknown);
        assert_eq!(reason, "Deletion in progress");
        assert_eq!(message, "Uninstalling");
    }
    assert!(chart.calls().is_empty());
}

#[tokio::test]
async fn dangling_ingress_blocks_deletion_with_warning() {
    let (chart, store, machine) = setup(FakeChart::default().with_orphans("dangling ingress"));

    let err = machine
        .run(deleted_registry("default"), Step::DeleteResources)
        .await
        .unwrap_err();

    assert!(matches!(err, StateError::OrphanResources(_)));
    assert_eq!(err.to_string(), "dangling ingress");
    assert!(err.is_warning());

    let written = store.status_writes();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].state(), State::Warning);
    let (status, reason, message) = deleted_condition(&written[0]);
    assert_eq!(status, ConditionStatus::False);
    assert_eq!(reason, "DeletionError");
    assert!(message.contains("dangling ingress"));

    // Nothing is uninstalled while orphans exist
    assert_eq!(chart.calls(), vec!["check_orphan_resources"]);
    assert!(store.finalizer_updates().is_empty());
}

#[tokio::test]
async fn pending_secrets_requeue_after_one_second() {
    let (chart, store, machine) = setup(FakeChart::default().with_secrets(SecretsOutcome::Pending));

    let action = machine
        .run(deleted_registry("default"), Step::DeleteResources)
        .await
        .unwrap();

    assert_eq!(SECRETS_REMOVAL_REQUEUE, Duration::from_secs(1));
    assert_eq!(action, Action::requeue(Duration::from_secs(1)));

    let written = store.status_writes();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].state(), State::Deleting);
    let (status, reason, message) = deleted_condition(&written[0]);
    assert_eq!(status, ConditionStatus::True);
    assert_eq!(reason, "Deletion in progress");
    assert_eq!(message, "Deleting secrets");

    // Other objects wait for the secrets to be gone
    assert!(!chart.calls().contains(&"uninstall"));
    assert!(store.finalizer_updates().is_empty());
}

#[tokio::test]
async fn pending_secrets_step_result_is_exact_requeue() {
    let chart = Arc::new(FakeChart::default().with_secrets(SecretsOutcome::Pending));
    let store = Arc::new(FakeStore::default());
    let r = reconciler(&chart, &store);
    let mut s = SystemState::new(deleted_registry("default"));

    let result = Step::DeleteResourcesWithFilter(Vec::new()).run(&r, &mut s).await;

    assert!(result.next.is_none());
    assert!(result.error.is_none());
    assert_eq!(result.requeue, Some(Requeue::After(Duration::from_secs(1))));
}

#[tokio::test]
async fn successful_uninstall_removes_finalizer() {
    let (chart, store, machine) = setup(FakeChart::default());

    let action = machine
        .run(deleted_registry("default"), Step::DeleteResources)
        .await
        .unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(
        chart.calls(),
        vec!["check_orphan_resources", "uninstall_secrets", "uninstall"]
    );

    let written = store.status_writes();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].state(), State::Deleting);
    let (status, reason, message) = deleted_condition(&written[0]);
    assert_eq!(status, ConditionStatus::True);
    assert_eq!(reason, "Deleted");
    assert_eq!(message, "module deleted");

    assert_eq!(store.finalizer_updates(), vec![Vec::<String>::new()]);
    let stored = store.object("default").unwrap();
    assert!(!stored
        .metadata
        .finalizers
        .unwrap_or_default()
        .iter()
        .any(|f| f == FINALIZER));
}

#[tokio::test]
async fn successful_uninstall_advances_to_finalizer_removal() {
    let chart = Arc::new(FakeChart::default());
    let store = Arc::new(FakeStore::default());
    let r = reconciler(&chart, &store);
    let mut s = SystemState::new(deleted_registry("default"));

    let result = Step::DeleteResourcesWithFilter(Vec::new()).run(&r, &mut s).await;

    assert!(matches!(result.next, Some(Step::RemoveFinalizer)));
    let (status, reason, _) = deleted_condition(&s.instance);
    assert_eq!(status, ConditionStatus::True);
    assert_eq!(reason, "Deleted");
}

#[tokio::test]
async fn safe_deletion_is_idempotent() {
    let (chart, store, machine) = setup(FakeChart::default());

    let first = machine
        .run(deleted_registry("default"), Step::SafeDeletion)
        .await
        .unwrap();
    let second = machine
        .run(deleted_registry("default"), Step::SafeDeletion)
        .await
        .unwrap();

    assert_eq!(first, second);

    let written = store.status_writes();
    assert_eq!(written.len(), 2);
    assert_eq!(written[0].state(), written[1].state());
    assert_eq!(deleted_condition(&written[0]), deleted_condition(&written[1]));

    assert_eq!(chart.calls().iter().filter(|c| **c == "uninstall").count(), 2);
}

#[tokio::test]
async fn secrets_failure_sets_error_phase() {
    let (chart, store, machine) = setup(
        FakeChart::default().with_secrets(SecretsOutcome::Fail("secret is immutable".into())),
    );

    let err = machine
        .run(deleted_registry("default"), Step::DeleteResources)
        .await
        .unwrap_err();

    assert!(matches!(err, StateError::SecretsUninstall(_)));
    assert!(!err.is_warning());

    let written = store.status_writes();
    assert_eq!(written[0].state(), State::Error);
    let (status, reason, message) = deleted_condition(&written[0]);
    assert_eq!(status, ConditionStatus::False);
    assert_eq!(reason, "DeletionError");
    assert_eq!(message, "secret is immutable");
    assert!(!chart.calls().contains(&"uninstall"));
}

#[tokio::test]
async fn uninstall_failure_keeps_finalizer() {
    let (_chart, store, machine) =
        setup(FakeChart::default().with_uninstall_error("deployment delete forbidden"));

    let err = machine
        .run(deleted_registry("default"), Step::DeleteResources)
        .await
        .unwrap_err();

    assert!(matches!(err, StateError::ResourceUninstall(_)));
    assert_eq!(err.to_string(), "deployment delete forbidden");

    let written = store.status_writes();
    assert_eq!(written[0].state(), State::Error);
    assert_eq!(deleted_condition(&written[0]).0, ConditionStatus::False);
    assert!(store.finalizer_updates().is_empty());
}

#[tokio::test]
async fn status_write_failure_surfaces_when_steps_succeed() {
    let chart = Arc::new(FakeChart::default().with_secrets(SecretsOutcome::Pending));
    let store = Arc::new(FakeStore::default().failing_status());
    let machine = StateMachine::new(reconciler(&chart, &store));

    let err = machine
        .run(deleted_registry("default"), Step::DeleteResources)
        .await
        .unwrap_err();

    assert!(matches!(err, StateError::Store { .. }));
    assert!(err
        .to_string()
        .starts_with("while updating dockerregistry status"));
}

#[tokio::test]
async fn step_error_wins_over_status_write_failure() {
    let chart = Arc::new(FakeChart::default().with_orphans("dangling ingress"));
    let store = Arc::new(FakeStore::default().failing_status());
    let machine = StateMachine::new(reconciler(&chart, &store));

    let err = machine
        .run(deleted_registry("default"), Step::DeleteResources)
        .await
        .unwrap_err();

    assert!(matches!(err, StateError::OrphanResources(_)));
}

#[tokio::test]
async fn deleted_object_flows_from_served_filter_into_teardown() {
    let (chart, store, machine) = setup(FakeChart::default());

    let action = machine
        .run(deleted_registry("default"), Step::ServedFilter)
        .await
        .unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(chart.calls().len(), 3);
    assert_eq!(store.finalizer_updates().len(), 1);
}

#[tokio::test]
async fn repeated_pending_passes_write_status_once() {
    let (_chart, store, machine) =
        setup(FakeChart::default().with_secrets(SecretsOutcome::Pending));

    machine
        .run(deleted_registry("default"), Step::DeleteResources)
        .await
        .unwrap();
    let first = store.object("default").unwrap();

    let action = machine
        .run(first.clone(), Step::DeleteResources)
        .await
        .unwrap();

    assert_eq!(action, Action::requeue(Duration::from_secs(1)));
    assert_eq!(store.status_writes().len(), 1);
    assert_eq!(
        store.object("default").unwrap().condition(ConditionType::Deleted),
        first.condition(ConditionType::Deleted)
    );
}

#[tokio::test]
async fn filters_reach_both_uninstall_calls() {
    let chart = Arc::new(FakeChart::default());
    let store = Arc::new(FakeStore::default());
    let r = reconciler(&chart, &store);
    let mut s = SystemState::new(deleted_registry("default"));
    let filters = vec![
        ChartFilter::kind("PersistentVolumeClaim"),
        ChartFilter::new("keep-tls", |obj| {
            obj.metadata.name.as_deref() == Some("registry-tls")
        }),
    ];

    let result = Step::DeleteResourcesWithFilter(filters).run(&r, &mut s).await;

    assert!(matches!(result.next, Some(Step::RemoveFinalizer)));
    let expected = vec!["PersistentVolumeClaim".to_string(), "keep-tls".to_string()];
    assert_eq!(chart.filters_seen(), vec![expected.clone(), expected]);
}
