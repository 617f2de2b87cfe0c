/// Cluster lifecycle: provision, register in kubeconfig, prepare for the hub
use anyhow::{Context, Result};
use tracing::info;

use crate::hub::HubManager;
use crate::k8s::{Helm, Kubectl};
use crate::kubeconfig::KubeconfigStore;
use crate::providers::{ClusterAccess, Provider};
use crate::workspace::Workspace;

/// Runs the cluster workflows against one workspace
pub struct ClusterManager<'a> {
    workspace: &'a Workspace,
}

impl<'a> ClusterManager<'a> {
    pub fn new(workspace: &'a Workspace) -> Self {
        Self { workspace }
    }

    /// List clusters in the kubeconfig, or show the entry for one cluster
    pub async fn get(&self, name: Option<&str>, provider: &str) -> Result<()> {
        let kubeconf = KubeconfigStore::open(&self.workspace.kubeconfig_path).await?;

        let Some(name) = name else {
            let current_cluster = kubeconf
                .current_context()
                .and_then(|name| kubeconf.get_context(name).ok())
                .map(|ctx| ctx.context.cluster.as_str());

            info!("Clusters:");
            for cluster in kubeconf.get_clusters() {
                let contexts: Vec<&str> = kubeconf
                    .get_contexts()
                    .iter()
                    .filter(|ctx| ctx.context.cluster == cluster.name)
                    .map(|ctx| ctx.name.as_str())
                    .collect();
                let marker = if current_cluster == Some(cluster.name.as_str()) {
                    " (current)"
                } else {
                    ""
                };
                info!(
                    "  - {}{} [contexts: {}]",
                    cluster.name,
                    marker,
                    contexts.join(", ")
                );
            }
            return Ok(());
        };

        let provider = Provider::resolve(provider, name, &self.workspace.config)?;
        let cluster = kubeconf.get_cluster(&provider.cluster_name())?;
        let yaml = serde_yaml::to_string(cluster)?;
        for line in yaml.lines() {
            info!("{}", line);
        }

        Ok(())
    }

    /// Create a cluster on `provider` and deploy the hub onto it
    pub async fn create(&self, name: &str, provider: &str, install_hub: bool) -> Result<()> {
        info!("Starting cluster creation...");

        let provider = Provider::resolve(provider, name, &self.workspace.config)?;
        info!("Cluster name: {} (provider: {})", name, provider.kind());

        // Check prerequisites
        provider
            .check_prerequisites()
            .await
            .with_context(|| format!("{} tooling is required", provider.kind()))?;
        Kubectl::check_installed()
            .await
            .context("kubectl is required")?;
        if install_hub {
            Helm::check_installed().await.context("helm is required")?;
        }

        provider
            .create()
            .await
            .with_context(|| format!("Failed to create cluster {}", name))?;

        let access = provider
            .access()
            .await
            .context("Failed to read cluster endpoint")?;

        let mut kubeconf = KubeconfigStore::open(&self.workspace.kubeconfig_path).await?;
        register(&mut kubeconf, name, &provider.cluster_name(), access)?;
        kubeconf
            .close()
            .await
            .context("Failed to save kubeconfig")?;
        info!(
            "Kubeconfig updated: {}",
            self.workspace.kubeconfig_path.display()
        );

        let kubectl = Kubectl::new(self.workspace.kubeconfig_path.clone()).with_context(name);

        if let Some(manifest) = provider.auth_config()? {
            info!("Applying authorization configuration...");
            kubectl
                .apply(&manifest)
                .await
                .context("Failed to apply authorization configuration")?;
        }

        if let Some(manifest) = provider.storage_config()? {
            info!("Applying storage configuration...");
            kubectl
                .apply(&manifest)
                .await
                .context("Failed to apply storage configuration")?;
        }

        if install_hub {
            HubManager::new(
                self.workspace.config.hub.clone(),
                self.workspace.kubeconfig_path.clone(),
            )
            .with_context(name)
            .create()
            .await
            .context("Failed to deploy JupyterHub")?;
        }

        info!("✓ Cluster {} is ready", name);
        info!("");
        info!("To access your cluster:");
        info!("  kubectl --context {} get nodes", name);

        Ok(())
    }

    /// Delete the provider cluster and its kubeconfig entries
    pub async fn delete(&self, name: &str, provider: &str) -> Result<()> {
        info!("Starting cluster deletion...");

        let provider = Provider::resolve(provider, name, &self.workspace.config)?;
        provider
            .check_prerequisites()
            .await
            .with_context(|| format!("{} tooling is required", provider.kind()))?;

        provider
            .delete()
            .await
            .with_context(|| format!("Failed to delete cluster {}", name))?;

        let mut kubeconf = KubeconfigStore::open(&self.workspace.kubeconfig_path).await?;
        unregister(&mut kubeconf, name, &provider.cluster_name())?;
        kubeconf
            .close()
            .await
            .context("Failed to save kubeconfig")?;

        info!("✓ Cluster {} deleted", name);

        Ok(())
    }
}

/// Add cluster, user and context entries for a new cluster and switch to it.
///
/// The user and context are named after the requested cluster name, the
/// cluster entry after the provider's own cluster name.
pub fn register(
    kubeconf: &mut KubeconfigStore,
    name: &str,
    cluster_name: &str,
    access: ClusterAccess,
) -> crate::error::Result<()> {
    kubeconf.add_cluster(cluster_name, &access.endpoint_url, &access.ca_cert)?;
    kubeconf.add_user(name)?;
    kubeconf.add_to_user(name, access.credentials)?;
    kubeconf.add_context(name, cluster_name, name)?;
    kubeconf.set_current_context(name)
}

/// Remove the entries added by [`register`]
pub fn unregister(
    kubeconf: &mut KubeconfigStore,
    name: &str,
    cluster_name: &str,
) -> crate::error::Result<()> {
    kubeconf.remove_context(name)?;
    kubeconf.remove_user(name)?;
    kubeconf.remove_cluster(cluster_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubctlConfig;
    use crate::error::Error;
    use crate::kubeconfig::User;
    use tempfile::TempDir;

    fn access() -> ClusterAccess {
        ClusterAccess {
            endpoint_url: "https://127.0.0.1:40123".to_string(),
            ca_cert: "LS0tLS1DQQ==".to_string(),
            credentials: User {
                token: Some("t0ken".to_string()),
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_register_then_unregister() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");

        let mut kubeconf = KubeconfigStore::open(&path).await.unwrap();
        register(&mut kubeconf, "lab", "kind-lab", access()).unwrap();
        kubeconf.close().await.unwrap();

        let mut kubeconf = KubeconfigStore::open(&path).await.unwrap();
        assert_eq!(kubeconf.current_context(), Some("lab"));
        let context = kubeconf.get_context("lab").unwrap();
        assert_eq!(context.context.cluster, "kind-lab");
        assert_eq!(context.context.user, "lab");
        assert_eq!(
            kubeconf.get_user("lab").unwrap().user.token.as_deref(),
            Some("t0ken")
        );

        unregister(&mut kubeconf, "lab", "kind-lab").unwrap();
        assert!(kubeconf.get_clusters().is_empty());
        assert!(kubeconf.get_users().is_empty());
        assert!(kubeconf.get_contexts().is_empty());
        assert_eq!(kubeconf.current_context(), None);
    }

    #[tokio::test]
    async fn test_register_twice_is_duplicate() {
        let dir = TempDir::new().unwrap();
        let mut kubeconf = KubeconfigStore::open(dir.path().join("config")).await.unwrap();

        register(&mut kubeconf, "lab", "kind-lab", access()).unwrap();
        let err = register(&mut kubeconf, "lab", "kind-lab", access()).unwrap_err();
        assert!(matches!(err, Error::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_unregister_unknown_cluster_is_not_found() {
        let dir = TempDir::new().unwrap();
        let mut kubeconf = KubeconfigStore::open(dir.path().join("config")).await.unwrap();

        let err = unregister(&mut kubeconf, "ghost", "ghost").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_get_and_delete_resolve_without_create_settings() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config");

        let mut kubeconf = KubeconfigStore::open(&path).await.unwrap();
        register(&mut kubeconf, "hub", "hub", access()).unwrap();
        kubeconf.close().await.unwrap();

        let mut config = HubctlConfig::default();
        config.aws.region = Some("us-west-2".to_string());
        let workspace = Workspace {
            config,
            kubeconfig_path: path,
        };

        ClusterManager::new(&workspace)
            .get(Some("hub"), "aws-eks")
            .await
            .unwrap();

        let provider = Provider::resolve("aws-eks", "hub", &workspace.config).unwrap();
        assert_eq!(provider.cluster_name(), "hub");
    }

    #[tokio::test]
    async fn test_create_with_unknown_provider_fails_before_any_work() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::load(
            &dir.path().join("hubctl.yaml"),
            Some(dir.path().join("config")),
        )
        .unwrap();

        let err = ClusterManager::new(&workspace)
            .create("lab", "openstack", false)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Configuration(_))
        ));
        assert!(!dir.path().join("config").exists());
    }
}
