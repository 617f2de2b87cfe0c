/// External command execution for kubectl, helm and the provider CLIs
use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{Error, Result};

/// Result from command execution with captured output
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    status: String,
    command: String,
    context: String,
}

impl CommandOutput {
    /// Return stdout if successful, otherwise an ExternalCommand error carrying stderr
    pub fn into_result(self) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(Error::ExternalCommand {
                context: self.context,
                command: self.command,
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// Builder for executing external commands with common patterns
pub struct CommandBuilder {
    command: Command,
    program: String,
    args: Vec<String>,
    stdin: Option<String>,
    context_msg: Option<String>,
}

impl CommandBuilder {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        let mut command = Command::new(&program);
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        Self {
            command,
            program: program.as_ref().to_string_lossy().into_owned(),
            args: Vec::new(),
            stdin: None,
            context_msg: None,
        }
    }

    /// Add a single argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self.command.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self = self.arg(arg);
        }
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.command.env(key, val);
        self
    }

    /// Set KUBECONFIG environment variable
    pub fn kubeconfig(self, path: &Path) -> Self {
        self.env("KUBECONFIG", path)
    }

    /// Feed the given text to the process on stdin.
    ///
    /// Used for manifests and helm values so that secrets never show up in
    /// the process argument list.
    pub fn stdin<S: Into<String>>(mut self, input: S) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Set context message for error reporting
    pub fn context<S: Into<String>>(mut self, msg: S) -> Self {
        self.context_msg = Some(msg.into());
        self
    }

    fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Execute and return raw output
    pub async fn output(mut self) -> Result<CommandOutput> {
        let rendered = self.display();
        debug!("Running: {}", rendered);

        let stdin = self.stdin.take();
        self.command.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        let launch_error = |source| Error::Launch {
            program: self.program.clone(),
            source,
        };

        let mut child = self.command.spawn().map_err(launch_error)?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())
                    .await
                    .map_err(launch_error)?;
                // Dropping the pipe closes stdin so the child sees EOF
                drop(pipe);
            }
        }

        let output = child.wait_with_output().await.map_err(launch_error)?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            status: output.status.to_string(),
            command: rendered,
            context: self
                .context_msg
                .unwrap_or_else(|| format!("{} failed", self.program)),
        })
    }

    /// Execute and return stdout on success, error on failure
    pub async fn run(self) -> Result<String> {
        self.output().await?.into_result()
    }

    /// Execute and ignore output (just check success)
    pub async fn run_silent(self) -> Result<()> {
        self.output().await?.into_result().map(|_| ())
    }
}

/// Check if a command-line tool is installed
pub async fn check_tool_installed(
    tool_name: &str,
    version_args: &[&str],
    install_url: &str,
) -> Result<()> {
    let output = CommandBuilder::new(tool_name)
        .args(version_args)
        .output()
        .await;

    match output {
        Ok(out) if out.success => Ok(()),
        _ => Err(Error::Configuration(format!(
            "{} is not installed or not in PATH. Please install from {}",
            tool_name, install_url
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_command_builder_basic() {
        let output = CommandBuilder::new("echo")
            .arg("test")
            .context("Testing echo command")
            .output()
            .await
            .unwrap();

        assert!(output.success);
        assert!(output.stdout.contains("test"));
        assert_eq!(output.command, "echo test");
    }

    #[tokio::test]
    async fn test_command_builder_env() {
        let output = CommandBuilder::new("sh")
            .arg("-c")
            .arg("echo $TEST_VAR")
            .env("TEST_VAR", "test_value")
            .output()
            .await
            .unwrap();

        assert!(output.success);
        assert!(output.stdout.contains("test_value"));
    }

    #[tokio::test]
    async fn test_command_builder_stdin() {
        let stdout = CommandBuilder::new("cat")
            .stdin("kind: ConfigMap\n")
            .run()
            .await
            .unwrap();

        assert_eq!(stdout, "kind: ConfigMap\n");
    }

    #[tokio::test]
    async fn test_failure_is_external_command_error() {
        let err = CommandBuilder::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .context("Failed to apply manifest")
            .run_silent()
            .await
            .unwrap_err();

        match err {
            Error::ExternalCommand {
                context,
                command,
                stderr,
                ..
            } => {
                assert_eq!(context, "Failed to apply manifest");
                assert!(command.starts_with("sh -c"));
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let err = CommandBuilder::new("hubctl-definitely-not-installed")
            .run()
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Launch { .. }));
    }

    #[tokio::test]
    async fn test_check_tool_missing() {
        let err = check_tool_installed("hubctl-definitely-not-installed", &["version"], "nowhere")
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
    }
}
