//! rabbit-stalker - restart Kubernetes workloads when a RabbitMQ queue says so
//!
//! A `WorkloadAction` resource points at a queue on a RabbitMQ broker, a field
//! of the admin API's queue document, an expected value and a target workload.
//! On every reconciliation pass the controller queries the broker and, when the
//! field matches, restarts the workload the same way `kubectl rollout restart`
//! does.
//!
//! # Modules
//!
//! - [`crd`] - The `WorkloadAction` Custom Resource Definition
//! - [`controller`] - Reconciliation logic and the controller runner
//! - [`credentials`] - Broker credential resolution from Secrets
//! - [`broker`] - RabbitMQ admin API client and condition evaluation
//! - [`field_path`] - Dotted path extraction over JSON documents
//! - [`workload`] - Guarded restart of Deployments, StatefulSets and DaemonSets
//! - [`status`] - Status condition construction and merging
//! - [`retry`] - Exponential backoff for startup operations
//! - [`telemetry`] - Logging initialization
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod broker;
pub mod controller;
pub mod credentials;
pub mod crd;
pub mod error;
pub mod field_path;
pub mod retry;
pub mod status;
pub mod telemetry;
pub mod workload;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Annotation set on the pod template to trigger a rollout
///
/// The value is an RFC3339 timestamp of the restart.
pub const RESTARTED_AT_ANNOTATION: &str = "rabbit-stalker.docplanner.com/restartedAt";

/// Field manager used for every write made by the operator
pub const FIELD_MANAGER: &str = "rabbit-stalker-controller";

/// Timeout for a single request against the RabbitMQ admin API
pub const HTTP_REQUEST_TIMEOUT_SECS: u64 = 5;

/// Requeue interval used when a resource's own interval cannot be parsed
pub const DEFAULT_REQUEUE_SECS: u64 = 60;

/// Deadline for one full reconciliation pass
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 30;

/// Longest requeue handed to the controller runtime (365 days)
///
/// kube's scheduler rejects deadlines more than about 795 days out; longer
/// synchronization times are requeued at this bound instead.
pub const MAX_REQUEUE_SECS: u64 = 365 * 24 * 60 * 60;
