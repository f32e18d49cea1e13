/// osm-doctor - Open Service Mesh diagnostics
///
/// Runs read-only checks against a Kubernetes cluster with Open Service Mesh
/// installed and prints what is wrong with the mesh, its sidecars and its policies.
mod bundle;
mod check;
mod checks;
mod config;
mod envoy;
mod k8s;
mod printer;
mod suites;
mod utils;
mod version;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use url::Url;

use crate::bundle::{Collector, GetterFactory};
use crate::check::{Check, Dependencies, RunSummary, Runner, DEP_CLUSTER, DEP_KUBECTL};
use crate::checks::Mesh;
use crate::config::DoctorConfig;
use crate::envoy::{AdminConfigGetter, ConfigGetter, SharedGetter};
use crate::k8s::{Cluster, Kubectl, PodExt, PodRef};
use crate::suites::Suite;

/// Exit code when `--fail-on-error` is set and a check failed
const EXIT_CHECKS_FAILED: i32 = 3;

#[derive(Parser)]
#[command(name = "osm-doctor")]
#[command(about = "Diagnose Open Service Mesh installations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "osm-doctor.yaml", global = true)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Kubeconfig to use instead of KUBECONFIG / ~/.kube/config
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Exit with status 3 when any check fails
    #[arg(long, global = true)]
    fail_on_error: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Diagnose traffic between pods or to external URLs
    Connectivity {
        #[command(subcommand)]
        command: ConnectivityCommands,
    },

    /// Inspect the mesh control plane
    ControlPlane {
        #[command(subcommand)]
        command: ControlPlaneCommands,
    },

    /// Diagnose ingress traffic into the mesh
    Ingress {
        #[command(subcommand)]
        command: IngressCommands,
    },

    /// Validate mesh-wide configuration
    Validate,

    /// Collect a support bundle
    Collect {
        /// Directory the bundle is written under
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Generate example configuration file
    Init,
}

#[derive(Subcommand)]
enum ConnectivityCommands {
    /// Traffic from one meshed pod to another
    PodToPod {
        /// Source pod as namespace/name
        source: PodRef,
        /// Destination pod as namespace/name
        destination: PodRef,
    },

    /// Traffic from a meshed pod to a URL outside the mesh
    PodToUrl {
        /// Source pod as namespace/name
        source: PodRef,
        /// Destination URL
        url: Url,
    },
}

#[derive(Subcommand)]
enum ControlPlaneCommands {
    /// Show control plane health
    Status,
}

#[derive(Subcommand)]
enum IngressCommands {
    /// Ingress traffic to a meshed pod
    ToPod {
        /// Destination pod as namespace/name
        destination: PodRef,
    },
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    // Initialize tracing; stdout is reserved for the results table
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("osm_doctor={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match &cli.command {
        Commands::Connectivity { command } => match command {
            ConnectivityCommands::PodToPod {
                source,
                destination,
            } => pod_to_pod(&cli, source, destination).await,
            ConnectivityCommands::PodToUrl { source, url } => pod_to_url(&cli, source, url).await,
        },
        Commands::ControlPlane {
            command: ControlPlaneCommands::Status,
        } => control_plane_status(&cli).await,
        Commands::Ingress {
            command: IngressCommands::ToPod { destination },
        } => ingress_to_pod(&cli, destination).await,
        Commands::Validate => validate(&cli).await,
        Commands::Collect { output } => collect(&cli, output).await,
        Commands::Init => init_config(&cli).await,
    };

    match result {
        Ok(summary) if cli.fail_on_error && summary.has_failures() => {
            std::process::exit(EXIT_CHECKS_FAILED)
        }
        Ok(_) => {}
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Cluster access and prerequisites for one invocation
struct Session {
    config: DoctorConfig,
    kubectl: Kubectl,
    cluster: Cluster,
    deps: Arc<Dependencies>,
}

impl Session {
    async fn connect(cli: &Cli) -> Result<Self> {
        let mut config =
            DoctorConfig::load(&cli.config).context("Failed to load configuration")?;
        if cli.kubeconfig.is_some() {
            config.kubeconfig = cli.kubeconfig.clone();
        }
        if cli.context.is_some() {
            config.kube_context = cli.context.clone();
        }
        debug!("Mesh {} in namespace {}", config.mesh_name, config.mesh_namespace);

        let kubectl = Kubectl::new(config.kubeconfig.clone(), config.kube_context.clone())
            .with_binary(config.kubectl_path.clone());

        let mut deps = Dependencies::new();
        let installed = kubectl.check_installed().await;
        deps.record(DEP_KUBECTL, &installed);
        if installed.is_ok() {
            deps.record(DEP_CLUSTER, &kubectl.ping().await);
        } else {
            deps.unsatisfied(DEP_CLUSTER, "kubectl is not installed");
        }
        for name in [DEP_KUBECTL, DEP_CLUSTER] {
            if let Some(reason) = deps.missing_reason(name) {
                warn!("{} unavailable: {}", name, reason);
            }
        }

        let cluster = Cluster::new(Arc::new(kubectl.clone()));
        Ok(Self {
            config,
            kubectl,
            cluster,
            deps: Arc::new(deps),
        })
    }

    fn suite(&self) -> Suite {
        Suite::new(self.cluster.clone(), &self.config, Arc::clone(&self.deps))
    }

    fn ready(&self) -> bool {
        self.deps.is_satisfied(DEP_KUBECTL) && self.deps.is_satisfied(DEP_CLUSTER)
    }

    /// Config getter for a pod, when it has a sidecar to read from
    async fn getter(&self, pod: &PodRef) -> SharedGetter {
        if !self.ready() {
            return None;
        }

        match self.cluster.pod(pod).await {
            Ok(found) if found.has_sidecar() => {}
            Ok(_) => {
                debug!("{} has no sidecar; Envoy checks will fail", pod);
                return None;
            }
            Err(e) => {
                debug!("Could not load {}: {:#}", pod, e);
                return None;
            }
        }

        match AdminConfigGetter::new(
            self.kubectl.clone(),
            pod.clone(),
            self.config.envoy_admin_port,
            self.config.admin_timeout(),
        ) {
            Ok(getter) => Some(Arc::new(getter) as Arc<dyn ConfigGetter>),
            Err(e) => {
                warn!("Could not create config getter for {}: {:#}", pod, e);
                None
            }
        }
    }
}

/// Run checks and print their results
async fn report(checks: Vec<Box<dyn Check>>) -> RunSummary {
    let records = Runner::run(checks).await;
    printer::print_results(&records);
    RunSummary::from_records(&records)
}

async fn pod_to_pod(cli: &Cli, source: &PodRef, destination: &PodRef) -> Result<RunSummary> {
    let session = Session::connect(cli).await?;
    info!("Diagnosing connectivity from {} to {}", source, destination);

    let source_getter = session.getter(source).await;
    let destination_getter = session.getter(destination).await;
    let checks = session
        .suite()
        .pod_to_pod(source, destination, source_getter, destination_getter);
    Ok(report(checks).await)
}

async fn pod_to_url(cli: &Cli, source: &PodRef, url: &Url) -> Result<RunSummary> {
    let session = Session::connect(cli).await?;
    info!("Diagnosing connectivity from {} to {}", source, url);

    let getter = session.getter(source).await;
    let checks = session.suite().pod_to_url(source, url, getter);
    Ok(report(checks).await)
}

async fn control_plane_status(cli: &Cli) -> Result<RunSummary> {
    let session = Session::connect(cli).await?;
    info!("Checking control plane in {}", session.config.mesh_namespace);
    Ok(report(session.suite().control_plane()).await)
}

async fn ingress_to_pod(cli: &Cli, destination: &PodRef) -> Result<RunSummary> {
    let session = Session::connect(cli).await?;
    info!("Diagnosing ingress to {}", destination);

    let getter = session.getter(destination).await;
    let checks = session.suite().ingress_to_pod(destination, getter);
    Ok(report(checks).await)
}

async fn validate(cli: &Cli) -> Result<RunSummary> {
    let session = Session::connect(cli).await?;
    Ok(report(session.suite().validate()).await)
}

/// Collect a support bundle
async fn collect(cli: &Cli, output: &Path) -> Result<RunSummary> {
    let session = Session::connect(cli).await?;
    for name in [DEP_KUBECTL, DEP_CLUSTER] {
        if let Some(reason) = session.deps.missing_reason(name) {
            anyhow::bail!("Cannot collect a bundle, {} unavailable: {}", name, reason);
        }
    }

    let kubectl = session.kubectl.clone();
    let admin_port = session.config.envoy_admin_port;
    let timeout = session.config.admin_timeout();
    let getters: GetterFactory = Box::new(move |pod: &PodRef| {
        let getter = AdminConfigGetter::new(kubectl.clone(), pod.clone(), admin_port, timeout)?;
        Ok(Arc::new(getter) as Arc<dyn ConfigGetter>)
    });

    let collector = Collector::new(
        session.cluster.clone(),
        Mesh::from(&session.config),
        getters,
    );
    let dir = collector.collect(output).await?;

    info!("✓ Support bundle created: {}", dir.display());
    Ok(RunSummary::default())
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<RunSummary> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let example_config = DoctorConfig::example();
    let yaml = serde_yaml::to_string(&example_config)?;

    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Set mesh_namespace and mesh_name to match your installation");
    info!("  2. Check the control plane:");
    info!("     osm-doctor control-plane status");

    Ok(RunSummary::default())
}
