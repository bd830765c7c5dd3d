//! Error types for the rabbit-stalker operator
//!
//! Every failure a reconciliation pass can hit is a variant here. Variants that
//! describe a user-visible outcome map to a stable [`ConditionReason`] which is
//! written to the WorkloadAction status; the rest are operational errors that
//! are logged and retried but never recorded.

use std::time::Duration;

use thiserror::Error;

use crate::crd::ConditionReason;

/// Main error type for rabbit-stalker operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// `spec.synchronization.time` is not a positive duration
    #[error("can not parse the synchronization time '{value}' from workloadAction {name}: {message}")]
    InvalidSynchronizationTime {
        /// Name of the WorkloadAction
        name: String,
        /// The raw value found in the spec
        value: String,
        /// Why parsing failed
        message: String,
    },

    /// One or both credential Secrets (or their keys) could not be resolved
    #[error("credentials not found: {}", .causes.join("; "))]
    CredentialsNotFound {
        /// One entry per failed lookup
        causes: Vec<String>,
    },

    /// The target workload does not exist or could not be fetched
    #[error("workload {kind} {namespace}/{name} not found{}", cause_suffix(.cause))]
    WorkloadNotFound {
        /// Kind of the target
        kind: String,
        /// Namespace of the target
        namespace: String,
        /// Name of the target
        name: String,
        /// Underlying lookup error, if the lookup itself failed
        cause: Option<String>,
    },

    /// The admin API request could not be built or executed
    #[error("http request execution failed for {url}: {message}")]
    HttpRequestExecutionFailed {
        /// URL (or raw base URL) of the request
        url: String,
        /// Description of the failure
        message: String,
    },

    /// The broker answered 401 Unauthorized
    #[error("unauthorized request against the connection. Set the credentials for this server")]
    CredentialsNotValid,

    /// The broker answered with something that is not JSON
    #[error("invalid json from the HTTP response: {0}")]
    HttpResponseNotValid(String),

    /// `spec.action` is neither `restart` nor `delete`
    #[error("invalid action '{0}'. supported: restart, delete")]
    InvalidAction(String),

    /// `spec.action` is `delete`
    #[error("deletion action is not implemented yet")]
    DeleteActionNotImplemented,

    /// The target kind cannot be restarted
    #[error("restarting is not supported for kind {kind}")]
    WorkloadRestartNotSupported {
        /// Kind of the target
        kind: String,
    },

    /// The target is a paused Deployment
    #[error("can't restart paused deployment (run rollout resume first)")]
    PausedWorkloadRestart,

    /// The restart annotation patch was rejected
    #[error("impossible to patch the annotations for the workload template: {source}")]
    AnnotationPatch {
        /// Error returned by the patch call
        #[source]
        source: Box<Error>,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The WorkloadAction has no namespace
    #[error("missing namespace on WorkloadAction")]
    MissingNamespace,

    /// The pass was cancelled by controller shutdown
    #[error("reconciliation cancelled")]
    Cancelled,

    /// The pass did not finish within its deadline
    #[error("reconciliation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

fn cause_suffix(cause: &Option<String>) -> String {
    cause.as_deref().map(|c| format!(": {c}")).unwrap_or_default()
}

impl Error {
    /// Create a transport-level HTTP error
    pub fn http_request(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HttpRequestExecutionFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Wrap a failed patch call as an annotation patch error
    pub fn annotation_patch(source: Error) -> Self {
        Self::AnnotationPatch {
            source: Box::new(source),
        }
    }

    /// Status reason recorded for this error
    ///
    /// Returns `None` for operational errors that are not a property of the
    /// WorkloadAction itself (API outages while writing status, shutdown).
    pub fn reason(&self) -> Option<ConditionReason> {
        match self {
            Self::InvalidSynchronizationTime { .. } => {
                Some(ConditionReason::SynchronizationTimeNotValid)
            }
            Self::CredentialsNotFound { .. } => Some(ConditionReason::CredentialsNotFound),
            Self::WorkloadNotFound { .. } => Some(ConditionReason::WorkloadNotFound),
            Self::HttpRequestExecutionFailed { .. } => {
                Some(ConditionReason::HttpRequestExecutionFailed)
            }
            Self::CredentialsNotValid => Some(ConditionReason::CredentialsNotValid),
            Self::HttpResponseNotValid(_) => Some(ConditionReason::HttpResponseNotValid),
            Self::InvalidAction(_) => Some(ConditionReason::InvalidAction),
            Self::DeleteActionNotImplemented => Some(ConditionReason::DeleteActionNotImplemented),
            Self::WorkloadRestartNotSupported { .. } => {
                Some(ConditionReason::WorkloadRestartNotSupported)
            }
            Self::PausedWorkloadRestart => Some(ConditionReason::PausedWorkloadRestart),
            Self::AnnotationPatch { .. } => {
                Some(ConditionReason::WorkloadActionAnnotationPatchError)
            }
            Self::Kube(_)
            | Self::Serialization(_)
            | Self::MissingNamespace
            | Self::Cancelled
            | Self::DeadlineExceeded(_) => None,
        }
    }

    /// Returns true if re-running the same pass can succeed without a spec change
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidSynchronizationTime { .. }
                | Self::InvalidAction(_)
                | Self::DeleteActionNotImplemented
                | Self::WorkloadRestartNotSupported { .. }
                | Self::MissingNamespace
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // Story Tests: Failure Classification
    // ==========================================================================
    //
    // Every failure a pass can hit ends up as a status reason the user can
    // read with `kubectl get workloadaction -o yaml`. These tests pin the
    // mapping between error variants and those reasons.

    /// Story: The delete action is accepted by the schema but not implemented,
    /// and the status message says so verbatim.
    #[test]
    fn story_delete_action_reports_not_implemented() {
        let err = Error::DeleteActionNotImplemented;
        assert_eq!(err.to_string(), "deletion action is not implemented yet");
        assert_eq!(
            err.reason(),
            Some(ConditionReason::DeleteActionNotImplemented)
        );
        assert!(!err.is_retryable());
    }

    /// Story: When both credential lookups fail, both causes are kept
    #[test]
    fn story_credentials_errors_keep_every_cause() {
        let err = Error::CredentialsNotFound {
            causes: vec![
                "secret default/rabbit-user not found".to_string(),
                "secret default/rabbit-pass not found".to_string(),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("rabbit-user"));
        assert!(msg.contains("rabbit-pass"));
        assert_eq!(err.reason(), Some(ConditionReason::CredentialsNotFound));
        assert!(err.is_retryable());
    }

    /// Story: A 401 is distinct from a transport failure
    #[test]
    fn story_unauthorized_is_not_a_transport_failure() {
        let unauthorized = Error::CredentialsNotValid;
        let transport = Error::http_request("http://rabbit:15672", "connection refused");

        assert_eq!(
            unauthorized.reason(),
            Some(ConditionReason::CredentialsNotValid)
        );
        assert_eq!(
            transport.reason(),
            Some(ConditionReason::HttpRequestExecutionFailed)
        );
        assert!(transport.to_string().contains("connection refused"));
    }

    /// Story: Patch failures keep the underlying cause in the message
    #[test]
    fn story_annotation_patch_error_carries_cause() {
        let err = Error::annotation_patch(Error::serialization("admission webhook denied"));
        assert!(err.to_string().contains("admission webhook denied"));
        assert!(err
            .to_string()
            .starts_with("impossible to patch the annotations"));
        assert_eq!(
            err.reason(),
            Some(ConditionReason::WorkloadActionAnnotationPatchError)
        );
    }

    /// Story: Missing targets mention the full reference, with the lookup
    /// cause only when there was one
    #[test]
    fn story_workload_not_found_message() {
        let missing = Error::WorkloadNotFound {
            kind: "Deployment".to_string(),
            namespace: "shop".to_string(),
            name: "consumer".to_string(),
            cause: None,
        };
        assert_eq!(missing.to_string(), "workload Deployment shop/consumer not found");

        let failed = Error::WorkloadNotFound {
            kind: "Deployment".to_string(),
            namespace: "shop".to_string(),
            name: "consumer".to_string(),
            cause: Some("forbidden".to_string()),
        };
        assert!(failed.to_string().ends_with(": forbidden"));
    }

    /// Story: Operational errors are retried but never written to status
    #[test]
    fn story_operational_errors_have_no_reason() {
        assert_eq!(Error::Cancelled.reason(), None);
        assert_eq!(Error::DeadlineExceeded(Duration::from_secs(30)).reason(), None);
        assert_eq!(Error::serialization("bad").reason(), None);
        assert!(Error::Cancelled.is_retryable());
    }

    /// Story: Spec errors are not retryable without a spec change
    #[test]
    fn story_spec_errors_are_not_retryable() {
        assert!(!Error::InvalidAction("scale".to_string()).is_retryable());
        assert!(!Error::WorkloadRestartNotSupported {
            kind: "Job".to_string()
        }
        .is_retryable());
        assert!(Error::PausedWorkloadRestart.is_retryable());
    }
}
