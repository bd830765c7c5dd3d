//! rabbit-stalker - restart Kubernetes workloads driven by RabbitMQ queue state

use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;

use rabbit_stalker::controller::{run_controller, RunnerConfig};
use rabbit_stalker::crd::WorkloadAction;
use rabbit_stalker::retry::{retry_with_backoff, RetryConfig};
use rabbit_stalker::telemetry::{init_logging, LogFormat};
use rabbit_stalker::FIELD_MANAGER;

/// rabbit-stalker - restart workloads when a RabbitMQ queue matches a condition
#[derive(Parser, Debug)]
#[command(name = "rabbit-stalker", version, about, long_about = None)]
struct Cli {
    /// Print the WorkloadAction CRD manifest and exit
    #[arg(long)]
    crd: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as controller (default mode)
    ///
    /// Watches WorkloadAction resources, queries the referenced RabbitMQ
    /// queues and restarts the target workloads when their condition matches.
    Controller(ControllerArgs),
}

/// Controller mode arguments
#[derive(Parser, Debug)]
struct ControllerArgs {
    /// Only watch WorkloadActions in this namespace (default: all namespaces)
    #[arg(long, env = "RABBIT_STALKER_NAMESPACE")]
    namespace: Option<String>,

    /// Requeue interval for resources whose synchronization time is invalid
    #[arg(
        long,
        env = "RABBIT_STALKER_DEFAULT_REQUEUE",
        default_value = "1m",
        value_parser = humantime::parse_duration
    )]
    default_requeue: Duration,

    /// Deadline for a single reconciliation pass
    #[arg(
        long,
        env = "RABBIT_STALKER_RECONCILE_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    reconcile_timeout: Duration,

    /// Field manager recorded on every write
    #[arg(long, env = "RABBIT_STALKER_FIELD_MANAGER", default_value = FIELD_MANAGER)]
    field_manager: String,

    /// Log output format: json or text
    #[arg(long, env = "RABBIT_STALKER_LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,

    /// Do not install or update the CRD on startup
    #[arg(long, env = "RABBIT_STALKER_SKIP_CRD_INSTALL")]
    skip_crd_install: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&WorkloadAction::crd())
            .context("failed to serialize CRD")?;
        println!("{crd}");
        return Ok(());
    }

    let args = match cli.command {
        Some(Commands::Controller(args)) => args,
        None => ControllerArgs::try_parse_from(["controller"])?,
    };

    init_logging(args.log_format)?;
    controller(args).await
}

/// Run the controller until a shutdown signal arrives
async fn controller(args: ControllerArgs) -> anyhow::Result<()> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rabbit-stalker starting");

    let client = Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    if args.skip_crd_install {
        tracing::info!("skipping CRD installation");
    } else {
        ensure_crd_installed(&client, &args.field_manager).await?;
    }

    let config = RunnerConfig {
        namespace: args.namespace,
        field_manager: args.field_manager,
        default_requeue: args.default_requeue,
        reconcile_timeout: args.reconcile_timeout,
    };

    run_controller(client, config, CancellationToken::new()).await?;
    Ok(())
}

/// Install or update the WorkloadAction CRD via server-side apply
async fn ensure_crd_installed(client: &Client, field_manager: &str) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(field_manager).force();
    let crd = WorkloadAction::crd();
    let patch = Patch::Apply(&crd);
    let name = WorkloadAction::crd_name();

    tracing::info!(crd = %name, "installing CRD");
    retry_with_backoff(&RetryConfig::with_max_attempts(10), "install_crd", || {
        crds.patch(name, &params, &patch)
    })
    .await
    .with_context(|| format!("failed to install CRD {name}"))?;

    tracing::info!(crd = %name, "CRD installed/updated");
    Ok(())
}
