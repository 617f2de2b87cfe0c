/// kubectl operations against the provisioned cluster
use std::path::PathBuf;
use tracing::info;

use crate::error::Result;
use crate::utils::command::{check_tool_installed, CommandBuilder};

/// kubectl bound to a kubeconfig file and optionally a context
pub struct Kubectl {
    kubeconfig_path: PathBuf,
    context: Option<String>,
}

impl Kubectl {
    pub fn new(kubeconfig_path: PathBuf) -> Self {
        Self {
            kubeconfig_path,
            context: None,
        }
    }

    /// Pin every invocation to `context` instead of the file's current-context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Check if kubectl is installed
    pub async fn check_installed() -> Result<()> {
        check_tool_installed(
            "kubectl",
            &["version", "--client"],
            "https://kubernetes.io/docs/tasks/tools/",
        )
        .await
    }

    fn apply_args(&self) -> Vec<&str> {
        let mut args = Vec::new();
        if let Some(context) = &self.context {
            args.extend(["--context", context.as_str()]);
        }
        args.extend(["apply", "-f", "-"]);
        args
    }

    /// Apply a manifest body, passed to kubectl on stdin
    pub async fn apply(&self, manifest: &str) -> Result<()> {
        let stdout = CommandBuilder::new("kubectl")
            .args(self.apply_args())
            .kubeconfig(&self.kubeconfig_path)
            .stdin(manifest)
            .context("Failed to apply manifest")
            .run()
            .await?;

        for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
            info!("{}", line.trim());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_reads_stdin() {
        let kubectl = Kubectl::new(PathBuf::from("/tmp/config"));
        assert_eq!(kubectl.apply_args(), vec!["apply", "-f", "-"]);
    }

    #[test]
    fn test_apply_pins_context() {
        let kubectl = Kubectl::new(PathBuf::from("/tmp/config")).with_context("hub");
        assert_eq!(
            kubectl.apply_args(),
            vec!["--context", "hub", "apply", "-f", "-"]
        );
    }
}
