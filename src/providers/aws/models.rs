/// EKS API data models (as printed by `aws eks ... --output json`)
use serde::Deserialize;

/// Response of `aws eks describe-cluster`
#[derive(Debug, Clone, Deserialize)]
pub struct DescribeClusterResponse {
    pub cluster: EksCluster,
}

/// EKS cluster resource
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EksCluster {
    pub name: String,
    #[serde(default)]
    pub arn: Option<String>,
    pub status: ClusterStatus,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub certificate_authority: Option<CertificateAuthority>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CertificateAuthority {
    #[serde(default)]
    pub data: Option<String>,
}

/// Lifecycle state of an EKS cluster
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClusterStatus {
    Creating,
    Active,
    Deleting,
    Failed,
    Updating,
    Pending,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_describe_cluster() {
        let json = r#"{
            "cluster": {
                "name": "hub",
                "arn": "arn:aws:eks:us-west-2:123456789012:cluster/hub",
                "createdAt": "2024-05-01T10:00:00.000000+00:00",
                "version": "1.30",
                "endpoint": "https://ABCDEF.gr7.us-west-2.eks.amazonaws.com",
                "roleArn": "arn:aws:iam::123456789012:role/eks-cluster",
                "status": "ACTIVE",
                "certificateAuthority": { "data": "LS0tLS1CRUdJTg==" },
                "platformVersion": "eks.5"
            }
        }"#;

        let response: DescribeClusterResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.cluster.status, ClusterStatus::Active);
        assert_eq!(
            response.cluster.certificate_authority.unwrap().data.as_deref(),
            Some("LS0tLS1CRUdJTg==")
        );
    }

    #[test]
    fn test_creating_cluster_has_no_endpoint() {
        let json = r#"{"cluster": {"name": "hub", "status": "CREATING"}}"#;
        let response: DescribeClusterResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.cluster.status, ClusterStatus::Creating);
        assert!(response.cluster.endpoint.is_none());
    }

    #[test]
    fn test_unknown_status() {
        let json = r#"{"cluster": {"name": "hub", "status": "SOMETHING_NEW"}}"#;
        let response: DescribeClusterResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.cluster.status, ClusterStatus::Unknown);
    }
}
