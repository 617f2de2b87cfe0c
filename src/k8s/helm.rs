/// Helm operations for installing chart releases
use std::path::PathBuf;
use tracing::info;

use crate::error::Result;
use crate::utils::command::{check_tool_installed, CommandBuilder};

/// A chart release to install or upgrade
#[derive(Debug, Clone)]
pub struct Release {
    pub name: String,
    pub chart: String,
    pub namespace: String,
    pub version: String,
}

/// helm bound to a kubeconfig file and optionally a kube context
pub struct Helm {
    kubeconfig_path: PathBuf,
    context: Option<String>,
}

impl Helm {
    pub fn new(kubeconfig_path: PathBuf) -> Self {
        Self {
            kubeconfig_path,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Check if helm is installed
    pub async fn check_installed() -> Result<()> {
        check_tool_installed("helm", &["version"], "https://helm.sh/docs/intro/install/").await
    }

    fn command(&self) -> CommandBuilder {
        let builder = CommandBuilder::new("helm").kubeconfig(&self.kubeconfig_path);
        match &self.context {
            Some(context) => builder.args(["--kube-context", context.as_str()]),
            None => builder,
        }
    }

    /// Add a chart repository, accepting one that is already registered
    pub async fn repo_add(&self, name: &str, url: &str) -> Result<()> {
        info!("Adding {} Helm repository...", name);

        let output = self
            .command()
            .args(["repo", "add", name, url])
            .context("Failed to add Helm repo")
            .output()
            .await?;

        if !output.success && !output.stderr.contains("already exists") {
            return output.into_result().map(|_| ());
        }

        Ok(())
    }

    /// Update Helm repositories
    pub async fn repo_update(&self) -> Result<()> {
        self.command()
            .args(["repo", "update"])
            .context("Failed to update Helm repos")
            .run_silent()
            .await
    }

    /// `helm upgrade --install` with values passed on stdin
    pub async fn upgrade_install(&self, release: &Release, values_yaml: &str) -> Result<()> {
        info!(
            "Installing release {} ({} {}) into namespace {}...",
            release.name, release.chart, release.version, release.namespace
        );

        self.command()
            .args(upgrade_install_args(release))
            .stdin(values_yaml)
            .context(format!("Failed to install release {}", release.name))
            .run_silent()
            .await
    }

    /// Uninstall a release
    pub async fn uninstall(&self, release: &str, namespace: &str) -> Result<()> {
        info!("Uninstalling release {} from {}...", release, namespace);

        self.command()
            .args(["uninstall", release, "--namespace", namespace])
            .context(format!("Failed to uninstall release {}", release))
            .run_silent()
            .await
    }
}

fn upgrade_install_args(release: &Release) -> Vec<&str> {
    vec![
        "upgrade",
        "--install",
        release.name.as_str(),
        release.chart.as_str(),
        "--namespace",
        release.namespace.as_str(),
        "--create-namespace",
        "--version",
        release.version.as_str(),
        "--values",
        "-",
    ]
}
