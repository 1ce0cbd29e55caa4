//! # DockerRegistry Status
//!
//! Status types for tracking reconciliation state and conditions, and the
//! in-memory mutation API the state machine steps use. Persisting the status
//! is left to the caller.

use crate::crd::DockerRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the DockerRegistry resource
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DockerRegistryStatus {
    /// Coarse lifecycle phase
    #[serde(default)]
    pub state: State,
    /// Whether this object is the one actively reconciled
    /// Unset until the controller has looked at the object for the first time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub served: Option<Served>,
    /// Conditions represent the latest available observations, one per type
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl DockerRegistryStatus {
    /// Restores the transition time of every condition whose status ends up
    /// where `previous` had it, undoing intermediate flips made during a
    /// single pass
    pub fn keep_transition_times(&mut self, previous: &DockerRegistryStatus) {
        for condition in &mut self.conditions {
            if let Some(before) = previous
                .conditions
                .iter()
                .find(|c| c.r#type == condition.r#type && c.status == condition.status)
            {
                condition.last_transition_time = before.last_transition_time.clone();
            }
        }
    }
}

/// Lifecycle phase of a DockerRegistry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum State {
    #[default]
    #[serde(rename = "")]
    None,
    Processing,
    Deleting,
    Warning,
    Error,
    Ready,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::None => "",
            State::Processing => "Processing",
            State::Deleting => "Deleting",
            State::Warning => "Warning",
            State::Error => "Error",
            State::Ready => "Ready",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Served flag values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum Served {
    True,
    False,
}

impl fmt::Display for Served {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Served::True => write!(f, "True"),
            Served::False => write!(f, "False"),
        }
    }
}

/// Condition type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionType {
    /// The registry bundle is installed
    Installed,
    /// The registry bundle has been removed
    Deleted,
    /// The object passed configuration checks
    Configured,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::Installed => "Installed",
            ConditionType::Deleted => "Deleted",
            ConditionType::Configured => "Configured",
        }
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Condition reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionReason {
    Deletion,
    DeletionErr,
    Deleted,
    ServedError,
}

impl ConditionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionReason::Deletion => "Deletion in progress",
            ConditionReason::DeletionErr => "DeletionError",
            ConditionReason::Deleted => "Deleted",
            ConditionReason::ServedError => "ServedError",
        }
    }
}

impl fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-valued condition status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,
    /// Machine-readable reason for the last update
    #[serde(default)]
    pub reason: String,
    /// Human-readable details
    #[serde(default)]
    pub message: String,
    /// Last time the status value changed (RFC3339)
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Generation of the object the condition was computed for
    #[serde(default)]
    pub observed_generation: Option<i64>,
}

impl DockerRegistry {
    /// Current phase, `State::None` when no status was recorded yet
    pub fn state(&self) -> State {
        self.status.as_ref().map(|s| s.state).unwrap_or_default()
    }

    pub fn set_state(&mut self, state: State) {
        self.status.get_or_insert_with(Default::default).state = state;
    }

    pub fn served(&self) -> Option<Served> {
        self.status.as_ref().and_then(|s| s.served)
    }

    /// True when the served flag has never been decided for this object
    pub fn is_served_empty(&self) -> bool {
        self.served().is_none()
    }

    /// True only when the served flag is explicitly `True`
    pub fn is_served(&self) -> bool {
        self.served() == Some(Served::True)
    }

    pub fn set_served(&mut self, served: Served) {
        self.status.get_or_insert_with(Default::default).served = Some(served);
    }

    pub fn condition(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.status.as_ref().and_then(|s| {
            s.conditions
                .iter()
                .find(|c| c.r#type == condition_type.as_str())
        })
    }

    pub fn update_condition_unknown(
        &mut self,
        condition_type: ConditionType,
        reason: ConditionReason,
        message: impl Into<String>,
    ) {
        self.update_condition(condition_type, ConditionStatus::Unknown, reason, message.into());
    }

    pub fn update_condition_true(
        &mut self,
        condition_type: ConditionType,
        reason: ConditionReason,
        message: impl Into<String>,
    ) {
        self.update_condition(condition_type, ConditionStatus::True, reason, message.into());
    }

    /// Marks the condition False with the error text as message
    pub fn update_condition_false(
        &mut self,
        condition_type: ConditionType,
        reason: ConditionReason,
        err: &impl fmt::Display,
    ) {
        self.update_condition(condition_type, ConditionStatus::False, reason, err.to_string());
    }

    /// Overwrites the entry for `condition_type` in place.
    ///
    /// `lastTransitionTime` only moves when the status value changes, so
    /// repeated passes over an unchanged object do not produce status churn.
    fn update_condition(
        &mut self,
        condition_type: ConditionType,
        status: ConditionStatus,
        reason: ConditionReason,
        message: String,
    ) {
        let generation = self.metadata.generation;
        let conditions = &mut self.status.get_or_insert_with(Default::default).conditions;

        match conditions
            .iter_mut()
            .find(|c| c.r#type == condition_type.as_str())
        {
            Some(existing) => {
                if existing.status != status {
                    existing.status = status;
                    existing.last_transition_time = Some(chrono::Utc::now().to_rfc3339());
                }
                existing.reason = reason.as_str().to_string();
                existing.message = message;
                existing.observed_generation = generation;
            }
            None => conditions.push(Condition {
                r#type: condition_type.as_str().to_string(),
                status,
                reason: reason.as_str().to_string(),
                message,
                last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
                observed_generation: generation,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::DockerRegistrySpec;

    fn registry() -> DockerRegistry {
        DockerRegistry::new("default", DockerRegistrySpec::default())
    }

    #[test]
    fn test_state_defaults_to_none() {
        let dr = registry();
        assert_eq!(dr.state(), State::None);
        assert!(dr.is_served_empty());
        assert!(!dr.is_served());
    }

    #[test]
    fn test_state_serializes_none_as_empty_string() {
        let json = serde_json::to_string(&State::None).unwrap();
        assert_eq!(json, "\"\"");
        let state: State = serde_json::from_str("\"Deleting\"").unwrap();
        assert_eq!(state, State::Deleting);
    }

    #[test]
    fn test_update_condition_keeps_one_entry_per_type() {
        let mut dr = registry();
        dr.update_condition_unknown(ConditionType::Deleted, ConditionReason::Deletion, "Uninstalling");
        dr.update_condition_true(ConditionType::Deleted, ConditionReason::Deleted, "module deleted");
        dr.update_condition_false(
            ConditionType::Configured,
            ConditionReason::ServedError,
            &"another instance is served",
        );

        let conditions = &dr.status.as_ref().unwrap().conditions;
        assert_eq!(conditions.len(), 2);

        let deleted = dr.condition(ConditionType::Deleted).unwrap();
        assert_eq!(deleted.status, ConditionStatus::True);
        assert_eq!(deleted.reason, "Deleted");
        assert_eq!(deleted.message, "module deleted");
    }

    #[test]
    fn test_transition_time_unchanged_when_status_unchanged() {
        let mut dr = registry();
        dr.update_condition_true(ConditionType::Deleted, ConditionReason::Deletion, "Deleting secrets");
        let first = dr.condition(ConditionType::Deleted).unwrap().clone();

        dr.update_condition_true(ConditionType::Deleted, ConditionReason::Deletion, "Deleting secrets");
        let second = dr.condition(ConditionType::Deleted).unwrap();

        assert_eq!(&first, second);
    }

    #[test]
    fn test_transition_time_set_when_status_changes() {
        let mut dr = registry();
        dr.update_condition_unknown(ConditionType::Deleted, ConditionReason::Deletion, "Uninstalling");
        dr.status.as_mut().unwrap().conditions[0].last_transition_time = None;

        dr.update_condition_false(ConditionType::Deleted, ConditionReason::DeletionErr, &"boom");
        let deleted = dr.condition(ConditionType::Deleted).unwrap();

        assert_eq!(deleted.status, ConditionStatus::False);
        assert_eq!(deleted.reason, "DeletionError");
        assert_eq!(deleted.message, "boom");
        assert!(deleted.last_transition_time.is_some());
    }

    #[test]
    fn test_reason_and_message_refresh_without_status_change() {
        let mut dr = registry();
        dr.update_condition_true(ConditionType::Deleted, ConditionReason::Deletion, "Deleting secrets");
        dr.status.as_mut().unwrap().conditions[0].last_transition_time = None;

        dr.update_condition_true(ConditionType::Deleted, ConditionReason::Deleted, "module deleted");
        let deleted = dr.condition(ConditionType::Deleted).unwrap();

        assert_eq!(deleted.reason, "Deleted");
        assert_eq!(deleted.message, "module deleted");
        assert!(deleted.last_transition_time.is_none());
    }

    #[test]
    fn test_keep_transition_times_undoes_intermediate_flip() {
        let mut before = registry();
        before.update_condition_true(ConditionType::Deleted, ConditionReason::Deletion, "Deleting secrets");
        let previous = before.status.clone().unwrap();
        assert!(previous.conditions[0].last_transition_time.is_some());

        let mut after = before.clone();
        after.update_condition_unknown(ConditionType::Deleted, ConditionReason::Deletion, "Uninstalling");
        after.update_condition_true(ConditionType::Deleted, ConditionReason::Deletion, "Deleting secrets");
        after.status.as_mut().unwrap().conditions[0].last_transition_time =
            Some("2030-01-01T00:00:00+00:00".to_string());

        let status = after.status.as_mut().unwrap();
        status.keep_transition_times(&previous);

        assert_eq!(*status, previous);
    }

    #[test]
    fn test_keep_transition_times_leaves_real_transitions() {
        let mut before = registry();
        before.update_condition_unknown(ConditionType::Deleted, ConditionReason::Deletion, "Uninstalling");
        let mut previous = before.status.clone().unwrap();
        previous.conditions[0].last_transition_time = Some("2020-01-01T00:00:00+00:00".to_string());

        let mut after = before;
        after.update_condition_true(ConditionType::Deleted, ConditionReason::Deleted, "module deleted");
        let status = after.status.as_mut().unwrap();
        status.keep_transition_times(&previous);

        assert_ne!(
            status.conditions[0].last_transition_time,
            previous.conditions[0].last_transition_time
        );
    }
}
