//! Custom Resource Definitions for rabbit-stalker
//!
//! This module contains the WorkloadAction CRD and its supporting types.

mod types;
mod workload_action;

pub use types::{
    ActionType, Condition, ConditionReason, ConditionSpec, ConditionStatus, CredentialSource,
    RabbitConnection, RabbitCredentials, SecretKeyRef, SynchronizationSpec, WorkloadRef,
};
pub use workload_action::{WorkloadAction, WorkloadActionSpec, WorkloadActionStatus};
