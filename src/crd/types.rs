//! Supporting types for the WorkloadAction CRD

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use kube::api::{ApiResource, GroupVersionKind};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// Synchronization settings
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct SynchronizationSpec {
    /// Wait between reconciliations, e.g. `30s`, `1m30s`, `2h`
    pub time: String,
}

impl SynchronizationSpec {
    /// Parse `time` into a positive duration
    ///
    /// `name` is the WorkloadAction name, used only for the error message.
    pub fn interval(&self, name: &str) -> Result<Duration, Error> {
        let invalid = |message: String| Error::InvalidSynchronizationTime {
            name: name.to_string(),
            value: self.time.clone(),
            message,
        };

        let interval = humantime::parse_duration(self.time.trim())
            .map_err(|e| invalid(e.to_string()))?;
        if interval.is_zero() {
            return Err(invalid("duration must be greater than zero".to_string()));
        }
        Ok(interval)
    }
}

/// Reference to a single key of a Secret in the WorkloadAction's namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct SecretKeyRef {
    /// Secret name
    #[serde(default)]
    pub name: String,
    /// Key inside the Secret's data
    #[serde(default)]
    pub key: String,
}

impl SecretKeyRef {
    /// Returns true if neither name nor key is set
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.key.is_empty()
    }
}

/// Source of one credential value
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialSource {
    /// Secret holding the value
    #[serde(default)]
    pub secret_ref: SecretKeyRef,
}

/// Basic auth credentials for the RabbitMQ admin API
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct RabbitCredentials {
    /// Where to read the username from
    #[serde(default)]
    pub username: CredentialSource,
    /// Where to read the password from
    #[serde(default)]
    pub password: CredentialSource,
}

impl RabbitCredentials {
    /// Returns true if no reference field is set at all
    pub fn is_empty(&self) -> bool {
        self.username.secret_ref.is_empty() && self.password.secret_ref.is_empty()
    }
}

/// Deserialize an optional credentials block, mapping an all-empty block to `None`
///
/// Manifests written against older schema versions carry `credentials: {}`
/// (or a block of empty strings) to mean "anonymous". Collapsing that here
/// keeps "absent" structurally distinct from "present but incomplete".
fn deserialize_credentials<'de, D>(deserializer: D) -> Result<Option<RabbitCredentials>, D::Error>
where
    D: Deserializer<'de>,
{
    let credentials = Option::<RabbitCredentials>::deserialize(deserializer)?;
    Ok(credentials.filter(|c| !c.is_empty()))
}

/// Connection to a RabbitMQ admin API and the queue to inspect
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct RabbitConnection {
    /// Base URL of the management plugin, e.g. `http://rabbitmq:15672`
    pub url: String,

    /// Virtual host of the queue (`/` for the default vhost)
    pub vhost: String,

    /// Queue name
    pub queue: String,

    /// Credentials; omit for anonymous access
    #[serde(
        default,
        deserialize_with = "deserialize_credentials",
        skip_serializing_if = "Option::is_none"
    )]
    pub credentials: Option<RabbitCredentials>,
}

/// Field of the queue document to compare
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ConditionSpec {
    /// Dotted path into the JSON document, e.g. `messages_ready`
    /// or `consumer_details.0.prefetch_count`
    pub key: String,

    /// Expected string form of the field
    pub value: String,
}

/// Reference to the workload acted upon
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct WorkloadRef {
    /// API group, empty for the core group
    #[serde(default)]
    pub group: String,

    /// API version, e.g. `v1`
    pub version: String,

    /// Kind, e.g. `Deployment`
    pub kind: String,

    /// Namespace of the workload
    pub namespace: String,

    /// Name of the workload
    pub name: String,
}

impl WorkloadRef {
    /// GroupVersionKind of the target
    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
    }

    /// ApiResource for dynamic API access to the target
    pub fn api_resource(&self) -> ApiResource {
        ApiResource::from_gvk(&self.gvk())
    }
}

impl std::fmt::Display for WorkloadRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

/// Action executed when the condition is met
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionType {
    /// Roll the workload's pods by bumping a template annotation
    Restart,
    /// Delete the workload (accepted but not implemented)
    Delete,
}

impl FromStr for ActionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restart" => Ok(Self::Restart),
            "delete" => Ok(Self::Delete),
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restart => write!(f, "restart"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

/// Condition status following Kubernetes conventions
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    /// Condition is true
    True,
    /// Condition is false
    False,
    /// Condition status is unknown
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Machine-readable reasons written to the Ready condition
///
/// The string forms are part of the resource's API and must not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConditionReason {
    /// The condition matched and the workload was restarted
    WorkloadRestarted,
    /// `spec.synchronization.time` is not a positive duration
    SynchronizationTimeNotValid,
    /// A credential Secret or key is missing
    CredentialsNotFound,
    /// The target workload is missing
    WorkloadNotFound,
    /// The admin API request failed before a response arrived
    HttpRequestExecutionFailed,
    /// The admin API answered 401
    CredentialsNotValid,
    /// The admin API answered with invalid JSON
    HttpResponseNotValid,
    /// `spec.action` is unsupported
    InvalidAction,
    /// `spec.action` is `delete`
    DeleteActionNotImplemented,
    /// The target kind cannot be restarted
    WorkloadRestartNotSupported,
    /// The target Deployment is paused
    PausedWorkloadRestart,
    /// Patching the restart annotation failed
    WorkloadActionAnnotationPatchError,
}

impl ConditionReason {
    /// Wire form of the reason
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WorkloadRestarted => "WorkloadRestarted",
            Self::SynchronizationTimeNotValid => "SynchronizationTimeNotValid",
            Self::CredentialsNotFound => "CredentialsNotFound",
            Self::WorkloadNotFound => "WorkloadNotFound",
            Self::HttpRequestExecutionFailed => "HttpRequestExecutionFailed",
            Self::CredentialsNotValid => "CredentialsNotValid",
            Self::HttpResponseNotValid => "HttpResponseNotValid",
            Self::InvalidAction => "InvalidAction",
            Self::DeleteActionNotImplemented => "DeleteActionNotImplemented",
            Self::WorkloadRestartNotSupported => "WorkloadRestartNotSupported",
            Self::PausedWorkloadRestart => "PausedWorkloadRestart",
            Self::WorkloadActionAnnotationPatchError => "WorkloadActionAnnotationPatchError",
        }
    }
}

impl std::fmt::Display for ConditionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kubernetes-style condition for status reporting
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct Condition {
    /// Type of condition (e.g., Ready)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status of the condition (True, False, Unknown)
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition transitioned
    #[serde(rename = "lastTransitionTime")]
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Create a new condition that transitioned at `now`
    pub fn new(
        type_: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            type_: type_.into(),
            status,
            reason: reason.into(),
            message: message.into(),
            last_transition_time: now,
        }
    }
}
