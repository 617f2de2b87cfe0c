/// Error types shared by the kubeconfig store, providers and command runner
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Named collection of a kubeconfig an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Cluster,
    User,
    Context,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Cluster => write!(f, "cluster"),
            EntryKind::User => write!(f, "user"),
            EntryKind::Context => write!(f, "context"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{kind} '{name}' not found in kubeconfig")]
    NotFound { kind: EntryKind, name: String },

    #[error("{kind} '{name}' already exists in kubeconfig")]
    Duplicate { kind: EntryKind, name: String },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed kubeconfig {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("provider {provider} failed: {message}")]
    Provider { provider: String, message: String },

    #[error("{context}: `{command}` exited with {status}: {stderr}")]
    ExternalCommand {
        context: String,
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to run {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timeout after {secs} seconds: {description}")]
    Timeout { description: String, secs: u64 },

    #[error("failed to render template: {0}")]
    Template(#[from] handlebars::RenderError),
}

impl Error {
    pub fn not_found(kind: EntryKind, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn duplicate(kind: EntryKind, name: impl Into<String>) -> Self {
        Error::Duplicate {
            kind,
            name: name.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap any failure reported while talking to a cluster provider
    pub fn provider(provider: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Provider {
            provider: provider.into(),
            message: message.to_string(),
        }
    }
}
