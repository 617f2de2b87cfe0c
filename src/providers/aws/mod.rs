/// Amazon EKS provider driven through the aws CLI
pub mod models;

use serde_json::json;
use tracing::{debug, info};

use self::models::{ClusterStatus, DescribeClusterResponse, EksCluster};
use super::ClusterAccess;
use crate::config::{AwsConfig, NodeGroupConfig};
use crate::error::{Error, Result};
use crate::kubeconfig::{ExecConfig, ExecEnvVar, User};
use crate::utils::command::{check_tool_installed, CommandBuilder};
use crate::utils::polling::PollingConfig;
use crate::utils::template;

const PROVIDER: &str = "aws-eks";
const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

const AWS_AUTH_TEMPLATE: &str = r#"apiVersion: v1
kind: ConfigMap
metadata:
  name: aws-auth
  namespace: kube-system
data:
  mapRoles: |
    - rolearn: {{node_role_arn}}
      username: system:node:{{node_username}}
      groups:
        - system:bootstrappers
        - system:nodes
"#;

const STORAGE_CLASS_TEMPLATE: &str = r#"apiVersion: storage.k8s.io/v1
kind: StorageClass
metadata:
  name: {{name}}
  annotations:
    storageclass.kubernetes.io/is-default-class: "true"
provisioner: ebs.csi.aws.com
parameters:
  type: gp3
  fsType: ext4
reclaimPolicy: Delete
volumeBindingMode: WaitForFirstConsumer
"#;

/// EKS cluster manager
#[derive(Debug)]
pub struct AwsEks {
    name: String,
    region: String,
    profile: Option<String>,
    kubernetes_version: Option<String>,
    role_arn: Option<String>,
    subnet_ids: Vec<String>,
    security_group_ids: Vec<String>,
    storage_class: String,
    create_timeout_secs: u64,
    node_group: Option<NodeGroupConfig>,
}

impl AwsEks {
    /// Bind the EKS settings to cluster `name`.
    ///
    /// Only the region is required here; the settings used solely for
    /// creating a cluster are checked by [`AwsEks::create`].
    pub fn new(name: &str, config: &AwsConfig) -> Result<Self> {
        if let Some(node_group) = &config.node_group {
            node_group.validate()?;
        }

        Ok(Self {
            name: name.to_string(),
            region: config.get_region()?,
            profile: config.profile.clone(),
            kubernetes_version: config.kubernetes_version.clone(),
            role_arn: config.role_arn.clone(),
            subnet_ids: config.subnet_ids.clone(),
            security_group_ids: config.security_group_ids.clone(),
            storage_class: config.storage_class.clone(),
            create_timeout_secs: config.create_timeout_secs,
            node_group: config.node_group.clone(),
        })
    }

    /// Check if the aws CLI is installed
    pub async fn check_aws_installed() -> Result<()> {
        check_tool_installed(
            "aws",
            &["--version"],
            "https://docs.aws.amazon.com/cli/latest/userguide/getting-started-install.html",
        )
        .await
    }

    pub fn cluster_name(&self) -> String {
        self.name.clone()
    }

    fn node_group_name(&self) -> String {
        format!("{}-workers", self.name)
    }

    /// `aws` invocation with region, profile and JSON output preset
    fn aws(&self) -> CommandBuilder {
        let builder = CommandBuilder::new("aws").args(["--region", self.region.as_str()]);
        let builder = match &self.profile {
            Some(profile) => builder.args(["--profile", profile.as_str()]),
            None => builder,
        };
        builder.args(["--output", "json"])
    }

    /// Role ARN for the control plane, once the create-only settings are present
    fn create_role_arn(&self) -> Result<&str> {
        let role_arn = self.role_arn.as_deref().ok_or_else(|| {
            Error::Configuration("aws.role_arn is required to create an EKS cluster".to_string())
        })?;

        if self.subnet_ids.is_empty() {
            return Err(Error::Configuration(
                "aws.subnet_ids must list at least one subnet to create an EKS cluster"
                    .to_string(),
            ));
        }

        Ok(role_arn)
    }

    fn vpc_config(&self) -> String {
        let mut vpc_config = format!("subnetIds={}", self.subnet_ids.join(","));
        if !self.security_group_ids.is_empty() {
            vpc_config.push_str(&format!(
                ",securityGroupIds={}",
                self.security_group_ids.join(",")
            ));
        }
        vpc_config
    }

    /// Create the EKS control plane, wait for it, then add the node group
    pub async fn create(&self) -> Result<()> {
        let role_arn = self.create_role_arn()?;
        info!("Creating EKS cluster {} in {}...", self.name, self.region);

        let vpc_config = self.vpc_config();
        let mut args = vec![
            "eks",
            "create-cluster",
            "--name",
            self.name.as_str(),
            "--role-arn",
            role_arn,
            "--resources-vpc-config",
            vpc_config.as_str(),
        ];
        if let Some(version) = &self.kubernetes_version {
            args.extend(["--kubernetes-version", version.as_str()]);
        }

        self.aws()
            .args(&args)
            .context("Failed to create EKS cluster")
            .run_silent()
            .await?;

        let cluster = self.wait_for_active().await?;
        info!(
            "EKS cluster {} is active (Kubernetes {}, {})",
            cluster.name,
            cluster.version.as_deref().unwrap_or("unknown"),
            cluster.arn.as_deref().unwrap_or("no ARN")
        );

        if let Some(node_group) = &self.node_group {
            self.create_node_group(node_group).await?;
        }

        Ok(())
    }

    async fn create_node_group(&self, node_group: &NodeGroupConfig) -> Result<()> {
        let node_group_name = self.node_group_name();
        info!(
            "Creating node group {} ({} x {})...",
            node_group_name, node_group.desired_size, node_group.instance_type
        );

        let scaling_config = format!(
            "minSize={},maxSize={},desiredSize={}",
            node_group.min_size, node_group.max_size, node_group.desired_size
        );

        let mut args = vec![
            "eks",
            "create-nodegroup",
            "--cluster-name",
            self.name.as_str(),
            "--nodegroup-name",
            node_group_name.as_str(),
            "--node-role",
            node_group.node_role_arn.as_str(),
            "--scaling-config",
            scaling_config.as_str(),
            "--instance-types",
            node_group.instance_type.as_str(),
            "--subnets",
        ];
        args.extend(self.subnet_ids.iter().map(String::as_str));

        self.aws()
            .args(&args)
            .context("Failed to create EKS node group")
            .run_silent()
            .await?;

        self.aws()
            .args([
                "eks",
                "wait",
                "nodegroup-active",
                "--cluster-name",
                self.name.as_str(),
                "--nodegroup-name",
                node_group_name.as_str(),
            ])
            .context("Node group did not become active")
            .run_silent()
            .await?;

        info!("Node group {} is active", node_group_name);
        Ok(())
    }

    /// Delete the node group (if configured) and the cluster, waiting for both
    pub async fn delete(&self) -> Result<()> {
        if self.node_group.is_some() {
            let node_group_name = self.node_group_name();
            info!("Deleting node group {}...", node_group_name);

            let node_group_args = [
                "--cluster-name",
                self.name.as_str(),
                "--nodegroup-name",
                node_group_name.as_str(),
            ];

            self.aws()
                .args(["eks", "delete-nodegroup"])
                .args(node_group_args)
                .context("Failed to delete EKS node group")
                .run_silent()
                .await?;

            self.aws()
                .args(["eks", "wait", "nodegroup-deleted"])
                .args(node_group_args)
                .context("Node group was not deleted")
                .run_silent()
                .await?;
        }

        info!("Deleting EKS cluster {}...", self.name);

        self.aws()
            .args(["eks", "delete-cluster", "--name", self.name.as_str()])
            .context("Failed to delete EKS cluster")
            .run_silent()
            .await?;

        self.aws()
            .args(["eks", "wait", "cluster-deleted", "--name", self.name.as_str()])
            .context("EKS cluster was not deleted")
            .run_silent()
            .await?;

        info!("EKS cluster {} deleted", self.name);
        Ok(())
    }

    async fn describe(&self) -> Result<EksCluster> {
        let stdout = self
            .aws()
            .args(["eks", "describe-cluster", "--name", self.name.as_str()])
            .context("Failed to describe EKS cluster")
            .run()
            .await?;

        let response: DescribeClusterResponse = serde_json::from_str(&stdout).map_err(|e| {
            Error::provider(PROVIDER, format!("unexpected describe-cluster output: {}", e))
        })?;
        Ok(response.cluster)
    }

    async fn wait_for_active(&self) -> Result<EksCluster> {
        let polling = PollingConfig::new(
            self.create_timeout_secs,
            30,
            format!("Waiting for EKS cluster {} to become ACTIVE", self.name),
        );

        polling
            .poll(|| async {
                let cluster = self.describe().await?;
                debug!("EKS cluster {} status: {:?}", cluster.name, cluster.status);
                match cluster.status {
                    ClusterStatus::Active => Ok(Some(cluster)),
                    ClusterStatus::Failed => Err(Error::provider(
                        PROVIDER,
                        format!("cluster {} entered FAILED state", cluster.name),
                    )),
                    _ => Ok(None),
                }
            })
            .await
    }

    /// Endpoint and CA from describe-cluster plus the `aws eks get-token` exec user
    pub async fn access(&self) -> Result<ClusterAccess> {
        let cluster = self.describe().await?;

        let endpoint_url = cluster.endpoint.ok_or_else(|| {
            Error::provider(PROVIDER, format!("cluster {} has no endpoint yet", self.name))
        })?;
        let ca_cert = cluster
            .certificate_authority
            .and_then(|ca| ca.data)
            .ok_or_else(|| {
                Error::provider(
                    PROVIDER,
                    format!("cluster {} has no certificate authority yet", self.name),
                )
            })?;

        Ok(ClusterAccess {
            endpoint_url,
            ca_cert,
            credentials: self.kube_user_data(),
        })
    }

    /// Exec credential plugin entry for kubeconfig users of this cluster
    pub fn kube_user_data(&self) -> User {
        let env = self
            .profile
            .iter()
            .map(|profile| ExecEnvVar {
                name: "AWS_PROFILE".to_string(),
                value: profile.clone(),
            })
            .collect();

        User {
            exec: Some(ExecConfig {
                api_version: EXEC_API_VERSION.to_string(),
                command: "aws".to_string(),
                args: vec![
                    "--region".to_string(),
                    self.region.clone(),
                    "eks".to_string(),
                    "get-token".to_string(),
                    "--cluster-name".to_string(),
                    self.name.clone(),
                    "--output".to_string(),
                    "json".to_string(),
                ],
                env,
                extra: Default::default(),
            }),
            ..Default::default()
        }
    }

    /// aws-auth ConfigMap letting the node group's role join the cluster
    pub fn auth_config(&self) -> Result<Option<String>> {
        let Some(node_group) = &self.node_group else {
            return Ok(None);
        };

        template::render(
            AWS_AUTH_TEMPLATE,
            &json!({
                "node_role_arn": node_group.node_role_arn,
                "node_username": "{{EC2PrivateDNSName}}",
            }),
        )
        .map(Some)
    }

    /// Default gp3 StorageClass backed by the EBS CSI driver
    pub fn storage_config(&self) -> Result<String> {
        template::render(STORAGE_CLASS_TEMPLATE, &json!({ "name": self.storage_class }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubctlConfig;

    fn example() -> AwsEks {
        AwsEks::new("hub", &HubctlConfig::example().aws).unwrap()
    }

    #[test]
    fn test_example_has_create_settings() {
        assert_eq!(
            example().create_role_arn().unwrap(),
            "arn:aws:iam::123456789012:role/eks-cluster"
        );
    }

    #[test]
    fn test_missing_role_only_blocks_create() {
        let mut config = HubctlConfig::example().aws;
        config.role_arn = None;
        let eks = AwsEks::new("hub", &config).unwrap();

        assert_eq!(eks.cluster_name(), "hub");
        let err = eks.create_role_arn().err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("aws.role_arn"));
    }

    #[test]
    fn test_missing_subnets_only_blocks_create() {
        let mut config = HubctlConfig::example().aws;
        config.subnet_ids.clear();
        let eks = AwsEks::new("hub", &config).unwrap();

        let err = eks.create_role_arn().err().unwrap();
        assert!(matches!(err, Error::Configuration(_)));
        assert!(err.to_string().contains("aws.subnet_ids"));
    }

    #[test]
    fn test_default_settings_with_region_resolve() {
        let mut config = HubctlConfig::default().aws;
        config.region = Some("eu-central-1".to_string());
        let eks = AwsEks::new("hub", &config).unwrap();

        assert_eq!(eks.cluster_name(), "hub");
        assert_eq!(eks.kube_user_data().exec.unwrap().args[1], "eu-central-1");
        assert!(eks.create_role_arn().is_err());
    }

    #[test]
    fn test_vpc_config() {
        let mut config = HubctlConfig::example().aws;
        assert_eq!(
            AwsEks::new("hub", &config).unwrap().vpc_config(),
            "subnetIds=subnet-aaaa,subnet-bbbb"
        );

        config.security_group_ids = vec!["sg-1".to_string()];
        assert_eq!(
            AwsEks::new("hub", &config).unwrap().vpc_config(),
            "subnetIds=subnet-aaaa,subnet-bbbb,securityGroupIds=sg-1"
        );
    }

    #[test]
    fn test_kube_user_data_without_profile() {
        let exec = example().kube_user_data().exec.unwrap();
        assert_eq!(exec.api_version, EXEC_API_VERSION);
        assert_eq!(exec.command, "aws");
        assert_eq!(
            exec.args,
            vec![
                "--region",
                "us-west-2",
                "eks",
                "get-token",
                "--cluster-name",
                "hub",
                "--output",
                "json"
            ]
        );
        assert!(exec.env.is_empty());
    }

    #[test]
    fn test_kube_user_data_exports_profile() {
        let mut config = HubctlConfig::example().aws;
        config.profile = Some("research".to_string());
        let exec = AwsEks::new("hub", &config)
            .unwrap()
            .kube_user_data()
            .exec
            .unwrap();

        assert_eq!(
            exec.env,
            vec![ExecEnvVar {
                name: "AWS_PROFILE".to_string(),
                value: "research".to_string(),
            }]
        );
    }

    #[test]
    fn test_auth_config_maps_node_role() {
        let manifest = example().auth_config().unwrap().unwrap();
        assert!(manifest.contains("name: aws-auth"));
        assert!(manifest.contains("- rolearn: arn:aws:iam::123456789012:role/eks-node"));
        assert!(manifest.contains("username: system:node:{{EC2PrivateDNSName}}"));

        let parsed: serde_yaml::Value = serde_yaml::from_str(&manifest).unwrap();
        assert_eq!(parsed["kind"], "ConfigMap");
    }

    #[test]
    fn test_no_auth_config_without_node_group() {
        let mut config = HubctlConfig::example().aws;
        config.node_group = None;
        assert_eq!(AwsEks::new("hub", &config).unwrap().auth_config().unwrap(), None);
    }

    #[test]
    fn test_storage_config_is_default_class() {
        let manifest = example().storage_config().unwrap();
        let parsed: serde_yaml::Value = serde_yaml::from_str(&manifest).unwrap();
        assert_eq!(parsed["kind"], "StorageClass");
        assert_eq!(parsed["metadata"]["name"], "gp3");
        assert_eq!(
            parsed["metadata"]["annotations"]["storageclass.kubernetes.io/is-default-class"],
            "true"
        );
    }
}
