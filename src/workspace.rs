/// Per-invocation context shared by all commands
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::HubctlConfig;
use crate::error::Result;
use crate::kubeconfig::KubeconfigStore;

/// Loaded configuration plus the kubeconfig file every command works against
pub struct Workspace {
    pub config: HubctlConfig,
    pub kubeconfig_path: PathBuf,
}

impl Workspace {
    /// Load the config file and resolve the kubeconfig path
    /// (explicit path, then `$KUBECONFIG`, then `~/.kube/config`)
    pub fn load(config_path: &Path, kubeconfig: Option<PathBuf>) -> Result<Self> {
        let config = HubctlConfig::from_file_or_default(config_path)?;
        let kubeconfig_path = match kubeconfig {
            Some(path) => path,
            None => KubeconfigStore::default_path()?,
        };
        debug!("Using kubeconfig {}", kubeconfig_path.display());

        Ok(Self {
            config,
            kubeconfig_path,
        })
    }

    /// Provider named on the command line, or the configured default
    pub fn provider_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested.unwrap_or(&self.config.provider)
    }
}
