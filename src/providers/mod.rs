/// Cluster providers: create and delete managed clusters and describe how to reach them
pub mod aws;
pub mod kind;

use std::fmt;
use std::str::FromStr;

use crate::config::HubctlConfig;
use crate::error::{Error, Result};
use crate::kubeconfig::User;

pub use aws::AwsEks;
pub use kind::Kind;

/// Registered provider names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    AwsEks,
    Kind,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::AwsEks, ProviderKind::Kind];

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::AwsEks => "aws-eks",
            ProviderKind::Kind => "kind",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aws-eks" | "awseks" | "eks" => Ok(ProviderKind::AwsEks),
            "kind" => Ok(ProviderKind::Kind),
            _ => {
                let known: Vec<_> = Self::ALL.iter().map(|k| k.name()).collect();
                Err(Error::Configuration(format!(
                    "unknown provider '{}' (available: {})",
                    s,
                    known.join(", ")
                )))
            }
        }
    }
}

/// Everything needed to register a cluster in a kubeconfig
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterAccess {
    pub endpoint_url: String,
    pub ca_cert: String,
    pub credentials: User,
}

/// A provider adapter bound to one cluster
#[derive(Debug)]
pub enum Provider {
    AwsEks(AwsEks),
    Kind(Kind),
}

impl Provider {
    /// Look up a provider by name and bind it to cluster `name`
    pub fn resolve(provider: &str, name: &str, config: &HubctlConfig) -> Result<Self> {
        match provider.parse::<ProviderKind>()? {
            ProviderKind::AwsEks => Ok(Provider::AwsEks(AwsEks::new(name, &config.aws)?)),
            ProviderKind::Kind => Ok(Provider::Kind(Kind::new(name, &config.kind))),
        }
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::AwsEks(_) => ProviderKind::AwsEks,
            Provider::Kind(_) => ProviderKind::Kind,
        }
    }

    /// Name of the cluster entry in the kubeconfig
    pub fn cluster_name(&self) -> String {
        match self {
            Provider::AwsEks(p) => p.cluster_name(),
            Provider::Kind(p) => p.cluster_name(),
        }
    }

    /// Verify the provider's command-line tools are available
    pub async fn check_prerequisites(&self) -> Result<()> {
        match self {
            Provider::AwsEks(_) => AwsEks::check_aws_installed().await,
            Provider::Kind(_) => Kind::check_kind_installed().await,
        }
    }

    pub async fn create(&self) -> Result<()> {
        let result = match self {
            Provider::AwsEks(p) => p.create().await,
            Provider::Kind(p) => p.create().await,
        };
        result.map_err(|e| self.wrap(e))
    }

    pub async fn delete(&self) -> Result<()> {
        let result = match self {
            Provider::AwsEks(p) => p.delete().await,
            Provider::Kind(p) => p.delete().await,
        };
        result.map_err(|e| self.wrap(e))
    }

    /// Endpoint, CA certificate and user credentials of the created cluster
    pub async fn access(&self) -> Result<ClusterAccess> {
        let result = match self {
            Provider::AwsEks(p) => p.access().await,
            Provider::Kind(p) => p.access().await,
        };
        result.map_err(|e| self.wrap(e))
    }

    /// Authorization manifest to apply after registration, if any
    pub fn auth_config(&self) -> Result<Option<String>> {
        match self {
            Provider::AwsEks(p) => p.auth_config(),
            Provider::Kind(_) => Ok(None),
        }
    }

    /// Storage manifest to apply after registration, if any
    pub fn storage_config(&self) -> Result<Option<String>> {
        match self {
            Provider::AwsEks(p) => p.storage_config().map(Some),
            Provider::Kind(_) => Ok(None),
        }
    }

    fn wrap(&self, error: Error) -> Error {
        match error {
            Error::Provider { .. } => error,
            other => Error::provider(self.kind().name(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_names() {
        assert_eq!("aws-eks".parse::<ProviderKind>().unwrap(), ProviderKind::AwsEks);
        assert_eq!("AwsEKS".parse::<ProviderKind>().unwrap(), ProviderKind::AwsEks);
        assert_eq!("eks".parse::<ProviderKind>().unwrap(), ProviderKind::AwsEks);
        assert_eq!("kind".parse::<ProviderKind>().unwrap(), ProviderKind::Kind);
    }

    #[test]
    fn test_unknown_provider_is_configuration_error() {
        let err = "gke".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("aws-eks, kind"));
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let err = Provider::resolve("azure", "hub", &HubctlConfig::example()).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_resolve_kind_needs_no_cloud_settings() {
        let provider = Provider::resolve("kind", "lab", &HubctlConfig::default()).unwrap();
        assert_eq!(provider.kind(), ProviderKind::Kind);
        assert_eq!(provider.cluster_name(), "kind-lab");
        assert_eq!(provider.auth_config().unwrap(), None);
        assert_eq!(provider.storage_config().unwrap(), None);
    }

    #[test]
    fn test_resolve_eks_with_example_config() {
        let provider = Provider::resolve("aws-eks", "hub", &HubctlConfig::example()).unwrap();
        assert_eq!(provider.cluster_name(), "hub");
        assert!(provider.auth_config().unwrap().is_some());
        assert!(provider.storage_config().unwrap().is_some());
    }

    #[test]
    fn test_wrap_turns_command_failure_into_provider_error() {
        let provider = Provider::resolve("kind", "lab", &HubctlConfig::default()).unwrap();
        let err = provider.wrap(Error::Timeout {
            description: "waiting".to_string(),
            secs: 1,
        });
        assert!(matches!(err, Error::Provider { ref provider, .. } if provider == "kind"));
    }
}
