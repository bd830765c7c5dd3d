//! WorkloadAction controller implementation
//!
//! Each pass reads the broker, decides whether the condition holds and, if it
//! does, acts on the target workload. Passes are stateless: everything needed
//! is re-read from the API server and the broker, so any pass can be retried.
//!
//! Failures with a user-visible cause are written to the `Ready` condition
//! before the error is handed back to the controller runtime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, DynamicObject, Patch, PatchParams};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[cfg(test)]
use mockall::automock;

use crate::broker::{check_condition, AdminApiClient, HttpAdminApiClient, QueueRequest};
use crate::credentials::resolve_credentials;
use crate::crd::{
    ActionType, Condition, ConditionReason, ConditionStatus, WorkloadAction,
    WorkloadActionStatus, WorkloadRef,
};
use crate::status::{merge_condition, ready_condition};
use crate::workload::{ensure_restartable, restart};
use crate::{
    Error, DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_REQUEUE_SECS, FIELD_MANAGER,
    HTTP_REQUEST_TIMEOUT_SECS, MAX_REQUEUE_SECS,
};

/// Trait abstracting Kubernetes client operations for WorkloadAction
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production. It never lists, watches or creates.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeClient: Send + Sync {
    /// Get a Secret, `None` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Get the workload named by `target`, `None` if it does not exist
    async fn get_workload(&self, target: &WorkloadRef) -> Result<Option<DynamicObject>, Error>;

    /// Apply a JSON merge patch to the workload named by `target`
    async fn patch_workload(
        &self,
        target: &WorkloadRef,
        patch: &serde_json::Value,
    ) -> Result<(), Error>;

    /// Patch the status of a WorkloadAction
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the WorkloadAction
    /// * `namespace` - Namespace of the WorkloadAction
    /// * `status` - New status to apply
    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &WorkloadActionStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeClientImpl {
    client: Client,
    field_manager: String,
}

impl KubeClientImpl {
    /// Create a new KubeClientImpl wrapping the given kube Client
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn workload_api(&self, target: &WorkloadRef) -> Api<DynamicObject> {
        Api::namespaced_with(
            self.client.clone(),
            &target.namespace,
            &target.api_resource(),
        )
    }
}

#[async_trait]
impl KubeClient for KubeClientImpl {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn get_workload(&self, target: &WorkloadRef) -> Result<Option<DynamicObject>, Error> {
        Ok(self.workload_api(target).get_opt(&target.name).await?)
    }

    async fn patch_workload(
        &self,
        target: &WorkloadRef,
        patch: &serde_json::Value,
    ) -> Result<(), Error> {
        self.workload_api(target)
            .patch(
                &target.name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(patch),
            )
            .await?;
        Ok(())
    }

    async fn patch_status(
        &self,
        name: &str,
        namespace: &str,
        status: &WorkloadActionStatus,
    ) -> Result<(), Error> {
        let api: Api<WorkloadAction> = Api::namespaced(self.client.clone(), namespace);

        let status_patch = serde_json::json!({
            "status": status
        });

        api.patch_status(
            name,
            &PatchParams::apply(&self.field_manager),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}

/// Controller context shared by every pass
pub struct Context {
    /// Kubernetes client for API operations (trait object for testability)
    pub kube: Arc<dyn KubeClient>,
    /// Admin API transport
    pub broker: Arc<dyn AdminApiClient>,
    /// Requeue interval when a resource's own interval is invalid
    pub default_requeue: Duration,
    /// Deadline for one pass
    pub reconcile_timeout: Duration,
    /// Cancelled on shutdown to abort in-flight passes
    pub cancel: CancellationToken,
}

impl Context {
    /// Create a builder for constructing a Context
    pub fn builder(client: Client) -> ContextBuilder {
        ContextBuilder::new(client)
    }

    /// Create a context for testing with custom mock clients
    ///
    /// This method is primarily for unit tests where a real Kubernetes
    /// client is not available. For production code, use [`Context::builder`].
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn KubeClient>, broker: Arc<dyn AdminApiClient>) -> Self {
        Self {
            kube,
            broker,
            default_requeue: Duration::from_secs(DEFAULT_REQUEUE_SECS),
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            cancel: CancellationToken::new(),
        }
    }
}

/// Builder for constructing [`Context`] instances
///
/// ```ignore
/// let ctx = Context::builder(client)
///     .default_requeue(Duration::from_secs(30))
///     .cancellation(token.clone())
///     .build()?;
/// ```
pub struct ContextBuilder {
    client: Client,
    kube: Option<Arc<dyn KubeClient>>,
    broker: Option<Arc<dyn AdminApiClient>>,
    field_manager: String,
    default_requeue: Duration,
    reconcile_timeout: Duration,
    cancel: CancellationToken,
}

impl ContextBuilder {
    /// Create a new builder with the given Kubernetes client
    fn new(client: Client) -> Self {
        Self {
            client,
            kube: None,
            broker: None,
            field_manager: FIELD_MANAGER.to_string(),
            default_requeue: Duration::from_secs(DEFAULT_REQUEUE_SECS),
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the field manager used for patches
    pub fn field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }

    /// Set the fallback requeue interval
    pub fn default_requeue(mut self, interval: Duration) -> Self {
        self.default_requeue = interval;
        self
    }

    /// Set the per-pass deadline
    pub fn reconcile_timeout(mut self, timeout: Duration) -> Self {
        self.reconcile_timeout = timeout;
        self
    }

    /// Share a cancellation token with the caller
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Override the Kubernetes client (primarily for testing)
    pub fn kube_client(mut self, kube: Arc<dyn KubeClient>) -> Self {
        self.kube = Some(kube);
        self
    }

    /// Override the admin API client (primarily for testing)
    pub fn broker_client(mut self, broker: Arc<dyn AdminApiClient>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Build the Context
    pub fn build(self) -> Result<Context, Error> {
        let broker: Arc<dyn AdminApiClient> = match self.broker {
            Some(broker) => broker,
            None => Arc::new(HttpAdminApiClient::new(Duration::from_secs(
                HTTP_REQUEST_TIMEOUT_SECS,
            ))?),
        };
        let field_manager = self.field_manager;
        let client = self.client;

        Ok(Context {
            kube: self
                .kube
                .unwrap_or_else(|| Arc::new(KubeClientImpl::new(client, field_manager))),
            broker,
            default_requeue: self.default_requeue,
            reconcile_timeout: self.reconcile_timeout,
            cancel: self.cancel,
        })
    }
}

/// Result of a pass that did not fail
#[derive(Debug, PartialEq)]
enum Outcome {
    /// The queue field did not match; nothing was touched
    ConditionNotMet,
    /// The workload was restarted at the given RFC3339 time
    Restarted(String),
}

/// Reconcile a WorkloadAction
///
/// Runs one pass under the context's deadline and cancellation token.
///
/// # Returns
///
/// Returns an `Action` requeueing after the resource's synchronization
/// interval, or an error if the pass failed.
#[instrument(
    skip(workload_action, ctx),
    fields(
        workload_action = %workload_action.name_any(),
        namespace = %workload_action.namespace().unwrap_or_default(),
    )
)]
pub async fn reconcile(
    workload_action: Arc<WorkloadAction>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    let deadline = ctx.reconcile_timeout;

    tokio::select! {
        biased;
        _ = ctx.cancel.cancelled() => {
            warn!("reconciliation cancelled");
            Err(Error::Cancelled)
        }
        result = tokio::time::timeout(deadline, run_pass(&workload_action, &ctx)) => {
            result.unwrap_or(Err(Error::DeadlineExceeded(deadline)))
        }
    }
}

/// One pass: evaluate, act, record
async fn run_pass(workload_action: &WorkloadAction, ctx: &Context) -> Result<Action, Error> {
    let name = workload_action.name_any();
    let namespace = workload_action.namespace().ok_or(Error::MissingNamespace)?;
    debug!("reconciling workload action");

    let result = match workload_action.spec.synchronization.interval(&name) {
        Ok(interval) => evaluate_and_act(workload_action, &namespace, ctx)
            .await
            .map(|outcome| (interval, outcome)),
        Err(e) => Err(e),
    };

    match result {
        Ok((interval, Outcome::ConditionNotMet)) => {
            debug!(requeue_after = ?interval, "condition not met");
            Ok(requeue_after(interval))
        }
        Ok((interval, Outcome::Restarted(restarted_at))) => {
            let condition = ready_condition(
                ConditionStatus::True,
                ConditionReason::WorkloadRestarted,
                format!(
                    "workload {} restarted at {restarted_at}",
                    workload_action.spec.workload_ref
                ),
                Utc::now(),
            );
            record_status(workload_action, &name, &namespace, ctx, condition).await?;
            Ok(requeue_after(interval))
        }
        Err(err) => {
            if let Some(reason) = err.reason() {
                warn!(error = %err, reason = %reason, "pass failed");
                let condition =
                    ready_condition(ConditionStatus::False, reason, err.to_string(), Utc::now());
                if let Err(status_err) =
                    record_status(workload_action, &name, &namespace, ctx, condition).await
                {
                    error!(error = %status_err, "failed to record failure in status");
                }
            }
            Err(err)
        }
    }
}

/// Resolve, fetch, evaluate and dispatch
async fn evaluate_and_act(
    workload_action: &WorkloadAction,
    namespace: &str,
    ctx: &Context,
) -> Result<Outcome, Error> {
    let spec = &workload_action.spec;
    let connection = &spec.rabbit_connection;

    let credentials =
        resolve_credentials(ctx.kube.as_ref(), connection.credentials.as_ref(), namespace).await?;

    let target = &spec.workload_ref;
    let not_found = |cause: Option<String>| Error::WorkloadNotFound {
        kind: target.kind.clone(),
        namespace: target.namespace.clone(),
        name: target.name.clone(),
        cause,
    };
    let workload = ctx
        .kube
        .get_workload(target)
        .await
        .map_err(|e| not_found(Some(e.to_string())))?
        .ok_or_else(|| not_found(None))?;

    // unsupported kinds fail whatever the queue says
    if matches!(spec.action_type(), Ok(ActionType::Restart)) {
        ensure_restartable(&target.kind)?;
    }

    let request = QueueRequest::new(connection, credentials);
    if !check_condition(ctx.broker.as_ref(), &request, &spec.condition).await? {
        return Ok(Outcome::ConditionNotMet);
    }

    info!(workload = %target, action = %spec.action, "condition met");
    match spec.action_type()? {
        ActionType::Delete => Err(Error::DeleteActionNotImplemented),
        ActionType::Restart => restart(ctx.kube.as_ref(), target, &workload, Utc::now())
            .await
            .map(Outcome::Restarted),
    }
}

/// Merge `condition` into the current status and persist it
async fn record_status(
    workload_action: &WorkloadAction,
    name: &str,
    namespace: &str,
    ctx: &Context,
    condition: Condition,
) -> Result<(), Error> {
    let mut status = workload_action.status.clone().unwrap_or_default();
    merge_condition(&mut status.conditions, condition);
    ctx.kube.patch_status(name, namespace, &status).await
}

/// Requeue action bounded by [`MAX_REQUEUE_SECS`]
fn requeue_after(interval: Duration) -> Action {
    Action::requeue(interval.min(Duration::from_secs(MAX_REQUEUE_SECS)))
}

/// Error policy for the controller
///
/// Requeues after the resource's synchronization interval, falling back to
/// the context default when the interval itself is invalid. Never stops
/// future attempts; failures that need a spec change are logged as such.
pub fn error_policy(
    workload_action: Arc<WorkloadAction>,
    error: &Error,
    ctx: Arc<Context>,
) -> Action {
    let name = workload_action.name_any();
    let requeue = workload_action
        .spec
        .synchronization
        .interval(&name)
        .unwrap_or(ctx.default_requeue);

    match (error.reason(), error.is_retryable()) {
        (Some(reason), true) => warn!(
            error = %error,
            reason = %reason,
            workload_action = %name,
            requeue_after = ?requeue,
            "reconciliation failed"
        ),
        (Some(reason), false) => warn!(
            error = %error,
            reason = %reason,
            workload_action = %name,
            requeue_after = ?requeue,
            "reconciliation failed, WorkloadAction needs to be fixed"
        ),
        (None, _) => error!(
            ?error,
            workload_action = %name,
            requeue_after = ?requeue,
            "reconciliation failed"
        ),
    }

    requeue_after(requeue)
}
