/// Serde model of a kubeconfig document
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Root of a kubeconfig file.
///
/// Keys this tool does not manage (`preferences`, `extensions`, ...) are kept
/// in `extra` so that loading and saving a file never drops them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kubeconfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub clusters: Vec<NamedCluster>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub users: Vec<NamedUser>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub contexts: Vec<NamedContext>,

    #[serde(
        rename = "current-context",
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_context: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub server: String,

    #[serde(
        rename = "certificate-authority-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_authority_data: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: User,
}

/// Credentials of a kubeconfig user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec: Option<ExecConfig>,

    #[serde(
        rename = "client-certificate-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_certificate_data: Option<String>,

    #[serde(
        rename = "client-key-data",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub client_key_data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl User {
    /// Overlay every field set in `other` onto this user
    pub fn merge(&mut self, other: User) {
        if other.exec.is_some() {
            self.exec = other.exec;
        }
        if other.client_certificate_data.is_some() {
            self.client_certificate_data = other.client_certificate_data;
        }
        if other.client_key_data.is_some() {
            self.client_key_data = other.client_key_data;
        }
        if other.token.is_some() {
            self.token = other.token;
        }
        self.extra.extend(other.extra);
    }
}

/// Exec credential plugin invocation (`users[].user.exec`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecConfig {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    pub command: String,

    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty", skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<ExecEnvVar>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecEnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub cluster: String,
    pub user: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for Kubeconfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            clusters: Vec::new(),
            users: Vec::new(),
            contexts: Vec::new(),
            current_context: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Kubeconfig {
    /// Parse a kubeconfig document; blank input is an empty document
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "Config".to_string()
}

// kubectl writes `clusters: null` for empty collections
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const KUBECTL_EMPTY: &str = r#"apiVersion: v1
clusters: null
contexts: null
current-context: ""
kind: Config
preferences: {}
users: null
"#;

    const EKS_KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: hub
  cluster:
    server: https://ABCDEF.gr7.us-west-2.eks.amazonaws.com
    certificate-authority-data: LS0tLS1CRUdJTg==
users:
- name: hub
  user:
    exec:
      apiVersion: client.authentication.k8s.io/v1beta1
      command: aws
      args: [--region, us-west-2, eks, get-token, --cluster-name, hub]
      env: null
      interactiveMode: IfAvailable
contexts:
- name: hub
  context:
    cluster: hub
    user: hub
    namespace: jhub
current-context: hub
"#;

    #[test]
    fn test_blank_input_is_empty_document() {
        let config = Kubeconfig::from_yaml("  \n").unwrap();
        assert_eq!(config, Kubeconfig::default());
    }

    #[test]
    fn test_kubectl_nulls_load_as_empty() {
        let config = Kubeconfig::from_yaml(KUBECTL_EMPTY).unwrap();
        assert!(config.clusters.is_empty());
        assert!(config.users.is_empty());
        assert!(config.contexts.is_empty());
        assert_eq!(config.current_context, None);
        assert!(config.extra.contains_key("preferences"));
    }

    #[test]
    fn test_parse_exec_user() {
        let config = Kubeconfig::from_yaml(EKS_KUBECONFIG).unwrap();
        let exec = config.users[0].user.exec.as_ref().unwrap();
        assert_eq!(exec.command, "aws");
        assert_eq!(exec.args.len(), 6);
        assert!(exec.env.is_empty());
        assert!(exec.extra.contains_key("interactiveMode"));
        assert_eq!(config.contexts[0].context.namespace.as_deref(), Some("jhub"));
        assert_eq!(config.current_context.as_deref(), Some("hub"));
    }

    #[test]
    fn test_unknown_keys_survive_reserialization() {
        let config = Kubeconfig::from_yaml(EKS_KUBECONFIG).unwrap();
        let reparsed = Kubeconfig::from_yaml(&config.to_yaml().unwrap()).unwrap();
        assert_eq!(config, reparsed);
    }

    #[test]
    fn test_user_merge_keeps_unset_fields() {
        let mut user = User {
            token: Some("abc".to_string()),
            ..Default::default()
        };
        user.merge(User {
            client_certificate_data: Some("Y2VydA==".to_string()),
            ..Default::default()
        });

        assert_eq!(user.token.as_deref(), Some("abc"));
        assert_eq!(user.client_certificate_data.as_deref(), Some("Y2VydA=="));
    }
}
