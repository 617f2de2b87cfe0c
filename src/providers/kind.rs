/// kind (Kubernetes in Docker) provider for local clusters
use std::path::PathBuf;
use tempfile::TempDir;
use tracing::info;

use super::ClusterAccess;
use crate::config::KindConfig;
use crate::error::{Error, Result};
use crate::kubeconfig::Kubeconfig;
use crate::utils::command::{check_tool_installed, CommandBuilder};

const PROVIDER: &str = "kind";

/// kind cluster manager
#[derive(Debug)]
pub struct Kind {
    name: String,
    node_image: Option<String>,
}

impl Kind {
    pub fn new(name: &str, config: &KindConfig) -> Self {
        Self {
            name: name.to_string(),
            node_image: config.node_image.clone(),
        }
    }

    /// Check if kind is installed
    pub async fn check_kind_installed() -> Result<()> {
        check_tool_installed("kind", &["version"], "https://kind.sigs.k8s.io/docs/user/quick-start/")
            .await
    }

    /// kind names its kubeconfig entries `kind-<cluster>`
    pub fn cluster_name(&self) -> String {
        format!("kind-{}", self.name)
    }

    /// Throwaway kubeconfig handed to kind so it never edits the user's own file.
    ///
    /// The file lives in a private directory that is removed when the
    /// returned [`TempDir`] is dropped.
    fn scratch_kubeconfig(&self) -> Result<(TempDir, PathBuf)> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("hubctl-kind-{}-", self.name))
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        let path = dir.path().join("kubeconfig");
        Ok((dir, path))
    }

    pub async fn create(&self) -> Result<()> {
        info!("Creating kind cluster {}...", self.name);

        let (_scratch_dir, scratch) = self.scratch_kubeconfig()?;
        let mut builder = CommandBuilder::new("kind")
            .args(["create", "cluster", "--name", self.name.as_str()])
            .arg("--kubeconfig")
            .arg(&scratch)
            .args(["--wait", "2m"]);
        if let Some(image) = &self.node_image {
            builder = builder.args(["--image", image.as_str()]);
        }

        builder
            .context("Failed to create kind cluster")
            .run_silent()
            .await?;

        info!("kind cluster {} created", self.name);
        Ok(())
    }

    pub async fn delete(&self) -> Result<()> {
        info!("Deleting kind cluster {}...", self.name);

        let (_scratch_dir, scratch) = self.scratch_kubeconfig()?;
        CommandBuilder::new("kind")
            .args(["delete", "cluster", "--name", self.name.as_str()])
            .arg("--kubeconfig")
            .arg(&scratch)
            .context("Failed to delete kind cluster")
            .run_silent()
            .await?;

        info!("kind cluster {} deleted", self.name);
        Ok(())
    }

    /// Read endpoint, CA and client certificate from `kind get kubeconfig`
    pub async fn access(&self) -> Result<ClusterAccess> {
        let kubeconfig = CommandBuilder::new("kind")
            .args(["get", "kubeconfig", "--name", self.name.as_str()])
            .context("Failed to read kind kubeconfig")
            .run()
            .await?;

        access_from_kubeconfig(&self.cluster_name(), &kubeconfig)
    }
}

fn access_from_kubeconfig(cluster_name: &str, content: &str) -> Result<ClusterAccess> {
    let document = Kubeconfig::from_yaml(content)
        .map_err(|e| Error::provider(PROVIDER, format!("unreadable kubeconfig: {}", e)))?;

    let cluster = document
        .clusters
        .iter()
        .find(|c| c.name == cluster_name)
        .ok_or_else(|| {
            Error::provider(PROVIDER, format!("no cluster {} in kind kubeconfig", cluster_name))
        })?;

    let user = document
        .users
        .into_iter()
        .find(|u| u.name == cluster_name)
        .ok_or_else(|| {
            Error::provider(PROVIDER, format!("no user {} in kind kubeconfig", cluster_name))
        })?;

    Ok(ClusterAccess {
        endpoint_url: cluster.cluster.server.clone(),
        ca_cert: cluster
            .cluster
            .certificate_authority_data
            .clone()
            .unwrap_or_default(),
        credentials: user.user,
    })
}
