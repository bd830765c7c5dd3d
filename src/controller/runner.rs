//! Controller runner - hosts the WorkloadAction reconciler
//!
//! Builds the watcher over WorkloadActions (cluster-wide or in one namespace)
//! and drives it until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::workload_action::{error_policy, reconcile, Context};
use crate::crd::WorkloadAction;
use crate::Error;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
pub const WATCH_TIMEOUT_SECS: u32 = 25;

/// Settings for one controller instance
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    /// Namespace to watch, all namespaces when `None`
    pub namespace: Option<String>,
    /// Field manager for patches
    pub field_manager: String,
    /// Requeue interval when a resource's own interval is invalid
    pub default_requeue: Duration,
    /// Deadline for one pass
    pub reconcile_timeout: Duration,
}

/// Run the WorkloadAction controller until shutdown
///
/// `cancel` is cancelled when the controller stops, aborting in-flight passes.
pub async fn run_controller(
    client: Client,
    config: RunnerConfig,
    cancel: CancellationToken,
) -> Result<(), Error> {
    let ctx = Arc::new(
        Context::builder(client.clone())
            .field_manager(config.field_manager.clone())
            .default_requeue(config.default_requeue)
            .reconcile_timeout(config.reconcile_timeout)
            .cancellation(cancel.clone())
            .build()?,
    );

    let signals = cancel_on_signal(cancel.clone());

    let workload_actions: Api<WorkloadAction> = match &config.namespace {
        Some(ns) => {
            tracing::info!(namespace = %ns, "- WorkloadAction controller (namespaced)");
            Api::namespaced(client, ns)
        }
        None => {
            tracing::info!("- WorkloadAction controller");
            Api::all(client)
        }
    };

    Controller::new(
        workload_actions,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .shutdown_on_signal()
    .run(reconcile, error_policy, ctx)
    .for_each(log_reconcile_result("WorkloadAction"))
    .await;

    cancel.cancel();
    signals.abort();
    tracing::info!("WorkloadAction controller stopped");
    Ok(())
}

/// Cancel `token` on SIGTERM or SIGINT
///
/// The controller drains on the same signals; cancelling the token makes
/// in-flight passes return instead of waiting on the broker.
fn cancel_on_signal(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            let mut sigint = match signal(SignalKind::interrupt()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(error = %e, "failed to install SIGINT handler");
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT"),
                _ = token.cancelled() => return,
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "failed to listen for Ctrl+C");
                        return;
                    }
                    tracing::info!("received Ctrl+C");
                }
                _ = token.cancelled() => return,
            }
        }

        token.cancel();
    })
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
