/// Configuration management for hubctl
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

/// Main hubctl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubctlConfig {
    /// Provider used when --provider is not given (e.g., "aws-eks", "kind")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Amazon EKS settings
    #[serde(default)]
    pub aws: AwsConfig,

    /// kind (Kubernetes in Docker) settings
    #[serde(default)]
    pub kind: KindConfig,

    /// JupyterHub helm release settings
    #[serde(default)]
    pub hub: HubConfig,
}

/// Amazon EKS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// AWS region (can also be set via AWS_REGION / AWS_DEFAULT_REGION)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Named AWS CLI profile, exported as AWS_PROFILE to the kubectl exec plugin
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Kubernetes version (e.g., "1.30"); EKS default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubernetes_version: Option<String>,

    /// IAM role assumed by the EKS control plane
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,

    /// Subnets for the cluster VPC configuration
    pub subnet_ids: Vec<String>,

    /// Additional security groups for the control plane ENIs
    pub security_group_ids: Vec<String>,

    /// Name of the default StorageClass created after provisioning
    pub storage_class: String,

    /// How long to wait for the cluster to become ACTIVE
    pub create_timeout_secs: u64,

    /// Managed node group created alongside the cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_group: Option<NodeGroupConfig>,
}

/// EKS managed node group configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeGroupConfig {
    /// IAM role of the worker nodes, also mapped in aws-auth
    pub node_role_arn: String,

    /// EC2 instance type (e.g., "t3.medium")
    pub instance_type: String,

    #[serde(default = "default_one")]
    pub desired_size: u32,

    #[serde(default = "default_one")]
    pub min_size: u32,

    #[serde(default = "default_one")]
    pub max_size: u32,
}

/// kind configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KindConfig {
    /// Node image (e.g., "kindest/node:v1.30.0")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_image: Option<String>,
}

/// JupyterHub helm chart configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Local name of the helm repository
    pub repo_name: String,

    /// JupyterHub helm chart repository URL
    pub helm_repo: String,

    /// Chart reference (e.g., "jupyterhub/jupyterhub")
    pub chart: String,

    /// Chart version
    pub version: String,

    /// Release name
    pub release: String,

    /// Namespace the release is installed into
    pub namespace: String,
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            kubernetes_version: None,
            role_arn: None,
            subnet_ids: Vec::new(),
            security_group_ids: Vec::new(),
            storage_class: "gp3".to_string(),
            create_timeout_secs: 1200,
            node_group: None,
        }
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            repo_name: "jupyterhub".to_string(),
            helm_repo: "https://jupyterhub.github.io/helm-chart/".to_string(),
            chart: "jupyterhub/jupyterhub".to_string(),
            version: "3.3.7".to_string(),
            release: "jhub".to_string(),
            namespace: "jhub".to_string(),
        }
    }
}

impl Default for HubctlConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            aws: AwsConfig::default(),
            kind: KindConfig::default(),
            hub: HubConfig::default(),
        }
    }
}

fn default_provider() -> String {
    "aws-eks".to_string()
}

fn default_one() -> u32 {
    1
}

impl HubctlConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: HubctlConfig = serde_yaml::from_str(&content).map_err(|e| {
            Error::Configuration(format!("invalid config file {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to built-in defaults when the file is absent
    pub fn from_file_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!("No config file at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let hub = &self.hub;
        for (field, value) in [
            ("hub.repo_name", &hub.repo_name),
            ("hub.helm_repo", &hub.helm_repo),
            ("hub.chart", &hub.chart),
            ("hub.version", &hub.version),
            ("hub.release", &hub.release),
            ("hub.namespace", &hub.namespace),
        ] {
            if value.is_empty() {
                return Err(Error::Configuration(format!("{} cannot be empty", field)));
            }
        }

        if let Some(node_group) = &self.aws.node_group {
            node_group.validate()?;
        }

        Ok(())
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            provider: default_provider(),
            aws: AwsConfig {
                region: Some("us-west-2".to_string()),
                profile: None,
                kubernetes_version: Some("1.30".to_string()),
                role_arn: Some("arn:aws:iam::123456789012:role/eks-cluster".to_string()),
                subnet_ids: vec!["subnet-aaaa".to_string(), "subnet-bbbb".to_string()],
                security_group_ids: vec![],
                node_group: Some(NodeGroupConfig {
                    node_role_arn: "arn:aws:iam::123456789012:role/eks-node".to_string(),
                    instance_type: "t3.medium".to_string(),
                    desired_size: 2,
                    min_size: 1,
                    max_size: 3,
                }),
                ..AwsConfig::default()
            },
            kind: KindConfig {
                node_image: Some("kindest/node:v1.30.0".to_string()),
            },
            hub: HubConfig::default(),
        }
    }
}

impl AwsConfig {
    /// Get AWS region from config or environment
    pub fn get_region(&self) -> Result<String> {
        self.region
            .clone()
            .or_else(|| std::env::var("AWS_REGION").ok())
            .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok())
            .ok_or_else(|| {
                Error::Configuration(
                    "AWS region not found. Set AWS_REGION or specify aws.region in config"
                        .to_string(),
                )
            })
    }
}

impl NodeGroupConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_size > self.desired_size || self.desired_size > self.max_size {
            return Err(Error::Configuration(format!(
                "node group sizes must satisfy min <= desired <= max (got {} / {} / {})",
                self.min_size, self.desired_size, self.max_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_is_valid() {
        assert!(HubctlConfig::example().validate().is_ok());
    }

    #[test]
    fn test_empty_hub_field_rejected() {
        let mut config = HubctlConfig::example();
        config.hub.release = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("hub.release"));
    }

    #[test]
    fn test_node_group_sizes() {
        let mut config = HubctlConfig::example();
        if let Some(node_group) = config.aws.node_group.as_mut() {
            node_group.min_size = 4;
        }
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hubctl.yaml");
        std::fs::write(&path, "provider: kind\nhub:\n  release: lab\n").unwrap();

        let config = HubctlConfig::from_file(&path).unwrap();
        assert_eq!(config.provider, "kind");
        assert_eq!(config.hub.release, "lab");
        assert_eq!(config.hub.chart, "jupyterhub/jupyterhub");
        assert_eq!(config.aws.storage_class, "gp3");
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = HubctlConfig::from_file_or_default(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.provider, "aws-eks");
    }

    #[test]
    fn test_example_serializes_and_reloads() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hubctl.yaml");
        std::fs::write(&path, serde_yaml::to_string(&HubctlConfig::example()).unwrap()).unwrap();

        let config = HubctlConfig::from_file(&path).unwrap();
        assert_eq!(config.aws.region.as_deref(), Some("us-west-2"));
        assert_eq!(config.aws.node_group.unwrap().desired_size, 2);
    }

    #[test]
    fn test_configured_region_wins() {
        let config = HubctlConfig::example();
        assert_eq!(config.aws.get_region().unwrap(), "us-west-2");
    }
}
