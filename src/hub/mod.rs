/// JupyterHub deployment through helm
use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::config::HubConfig;
use crate::error::Result;
use crate::k8s::{Helm, Release};
use crate::utils::template;

const SECURITY_VALUES_TEMPLATE: &str = "proxy:\n  secretToken: \"{{token}}\"\n";

/// Number of random bytes in the proxy secret token
const TOKEN_BYTES: usize = 32;

/// A single JupyterHub release
pub struct HubManager {
    config: HubConfig,
    helm: Helm,
}

impl HubManager {
    pub fn new(config: HubConfig, kubeconfig_path: PathBuf) -> Self {
        Self {
            config,
            helm: Helm::new(kubeconfig_path),
        }
    }

    /// Target `context` instead of the kubeconfig's current context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.helm = self.helm.with_context(context);
        self
    }

    fn release(&self) -> Release {
        Release {
            name: self.config.release.clone(),
            chart: self.config.chart.clone(),
            namespace: self.config.namespace.clone(),
            version: self.config.version.clone(),
        }
    }

    /// Helm values securing the proxy with a fresh random token
    pub fn security_values() -> Result<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        template::render(SECURITY_VALUES_TEMPLATE, &json!({ "token": hex::encode(bytes) }))
    }

    /// Install or upgrade the hub release
    pub async fn create(&self) -> Result<()> {
        info!(
            "Deploying JupyterHub release {} into namespace {}...",
            self.config.release, self.config.namespace
        );

        let values = Self::security_values()?;

        self.helm
            .repo_add(&self.config.repo_name, &self.config.helm_repo)
            .await?;
        self.helm.repo_update().await?;
        self.helm.upgrade_install(&self.release(), &values).await?;

        info!("✓ JupyterHub release {} deployed", self.config.release);
        info!("");
        info!("To find the public address:");
        info!(
            "  kubectl --namespace {} get service proxy-public",
            self.config.namespace
        );

        Ok(())
    }

    /// Uninstall the hub release
    pub async fn delete(&self) -> Result<()> {
        self.helm
            .uninstall(&self.config.release, &self.config.namespace)
            .await?;

        info!("✓ JupyterHub release {} removed", self.config.release);
        Ok(())
    }
}
