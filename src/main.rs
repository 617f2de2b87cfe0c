/// hubctl - JupyterHub on managed Kubernetes
///
/// Creates Kubernetes clusters on a provider, registers them in the local
/// kubeconfig and deploys JupyterHub onto them with helm.
mod cluster;
mod config;
mod error;
mod hub;
mod k8s;
mod kubeconfig;
mod providers;
mod utils;
mod workspace;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cluster::ClusterManager;
use crate::config::HubctlConfig;
use crate::hub::HubManager;
use crate::workspace::Workspace;

#[derive(Parser)]
#[command(name = "hubctl")]
#[command(about = "Deploy JupyterHub on managed Kubernetes clusters", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "hubctl.yaml")]
    config: PathBuf,

    /// Kubeconfig to update (defaults to $KUBECONFIG or ~/.kube/config)
    #[arg(short, long)]
    kubeconfig: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage Kubernetes clusters
    Cluster {
        #[command(subcommand)]
        command: ClusterCommands,
    },

    /// Manage the JupyterHub release
    Hub {
        #[command(subcommand)]
        command: HubCommands,
    },

    /// Generate example configuration file
    Init,
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// List clusters in the kubeconfig, or show one
    Get {
        name: Option<String>,

        /// Provider the cluster was created on (aws-eks, kind)
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Create a cluster and deploy JupyterHub onto it
    Create {
        name: String,

        /// Provider to create the cluster on (aws-eks, kind)
        #[arg(short, long)]
        provider: Option<String>,

        /// Only create and register the cluster
        #[arg(long)]
        skip_hub: bool,
    },

    /// Delete a cluster and remove it from the kubeconfig
    Delete {
        name: String,

        /// Provider the cluster was created on (aws-eks, kind)
        #[arg(short, long)]
        provider: Option<String>,
    },
}

#[derive(Subcommand)]
enum HubCommands {
    /// Install or upgrade the JupyterHub release
    Create {
        #[command(flatten)]
        release: ReleaseArgs,

        /// Chart version
        #[arg(long)]
        version: Option<String>,
    },

    /// Uninstall the JupyterHub release
    Delete {
        #[command(flatten)]
        release: ReleaseArgs,
    },
}

#[derive(clap::Args)]
struct ReleaseArgs {
    /// Release name
    #[arg(long)]
    release: Option<String>,

    /// Namespace of the release
    #[arg(short, long)]
    namespace: Option<String>,

    /// Kube context to deploy to (defaults to the current context)
    #[arg(long)]
    context: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hubctl={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match &cli.command {
        Commands::Init => init_config(&cli).await,
        Commands::Cluster { command } => run_cluster(&cli, command).await,
        Commands::Hub { command } => run_hub(&cli, command).await,
    };

    if let Err(e) = result {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_workspace(cli: &Cli) -> Result<Workspace> {
    Workspace::load(&cli.config, cli.kubeconfig.clone()).context("Failed to load configuration")
}

async fn run_cluster(cli: &Cli, command: &ClusterCommands) -> Result<()> {
    let workspace = load_workspace(cli)?;
    let clusters = ClusterManager::new(&workspace);

    match command {
        ClusterCommands::Get { name, provider } => {
            clusters
                .get(name.as_deref(), workspace.provider_name(provider.as_deref()))
                .await
        }
        ClusterCommands::Create {
            name,
            provider,
            skip_hub,
        } => {
            clusters
                .create(name, workspace.provider_name(provider.as_deref()), !skip_hub)
                .await
        }
        ClusterCommands::Delete { name, provider } => {
            clusters
                .delete(name, workspace.provider_name(provider.as_deref()))
                .await
        }
    }
}

async fn run_hub(cli: &Cli, command: &HubCommands) -> Result<()> {
    let workspace = load_workspace(cli)?;
    let mut hub_config = workspace.config.hub.clone();

    let release = match command {
        HubCommands::Create { release, version } => {
            if let Some(version) = version {
                hub_config.version = version.clone();
            }
            release
        }
        HubCommands::Delete { release } => release,
    };
    if let Some(name) = &release.release {
        hub_config.release = name.clone();
    }
    if let Some(namespace) = &release.namespace {
        hub_config.namespace = namespace.clone();
    }

    let mut hub = HubManager::new(hub_config, workspace.kubeconfig_path.clone());
    if let Some(context) = &release.context {
        hub = hub.with_context(context.as_str());
    }

    match command {
        HubCommands::Create { .. } => {
            crate::k8s::Helm::check_installed()
                .await
                .context("helm is required")?;
            hub.create().await.context("Failed to deploy JupyterHub")
        }
        HubCommands::Delete { .. } => hub.delete().await.context("Failed to remove JupyterHub"),
    }
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<()> {
    if cli.config.exists() {
        anyhow::bail!(
            "Configuration file already exists: {}",
            cli.config.display()
        );
    }

    let example_config = HubctlConfig::example();
    let yaml = serde_yaml::to_string(&example_config)?;

    tokio::fs::write(&cli.config, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", cli.config.display());
    info!("");
    info!("Next steps:");
    info!("  1. Edit the configuration file to match your AWS account");
    info!("  2. Create a cluster with JupyterHub:");
    info!("     hubctl cluster create my-hub");
    info!("  or try it locally:");
    info!("     hubctl cluster create my-hub --provider kind");

    Ok(())
}
