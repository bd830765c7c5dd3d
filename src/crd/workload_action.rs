//! WorkloadAction Custom Resource Definition
//!
//! A WorkloadAction ties a RabbitMQ queue metric to a workload: whenever the
//! metric matches the expected value, the workload is acted upon.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    ActionType, Condition, ConditionSpec, RabbitConnection, SynchronizationSpec, WorkloadRef,
};

/// Specification for a WorkloadAction
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "rabbit-stalker.docplanner.com",
    version = "v1alpha1",
    kind = "WorkloadAction",
    plural = "workloadactions",
    status = "WorkloadActionStatus",
    namespaced,
    printcolumn = r#"{"name":"Action","type":"string","jsonPath":".spec.action"}"#,
    printcolumn = r#"{"name":"Target","type":"string","jsonPath":".spec.workloadRef.name"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadActionSpec {
    /// How often the condition is evaluated
    pub synchronization: SynchronizationSpec,

    /// Broker admin API and queue to inspect
    pub rabbit_connection: RabbitConnection,

    /// Field of the queue document and its expected value
    pub condition: ConditionSpec,

    /// Workload acted upon when the condition matches
    pub workload_ref: WorkloadRef,

    /// What to do with the workload: `restart` or `delete`
    pub action: String,
}

impl WorkloadActionSpec {
    /// Parse the action field
    pub fn action_type(&self) -> Result<ActionType, crate::Error> {
        self.action.parse()
    }
}

/// Status for a WorkloadAction
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadActionStatus {
    /// Conditions representing the latest pass, keyed by type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl WorkloadActionStatus {
    /// Merge a condition by type and return self for chaining
    pub fn condition(mut self, condition: Condition) -> Self {
        crate::status::merge_condition(&mut self.conditions, condition);
        self
    }

    /// Find a condition by type
    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }
}
