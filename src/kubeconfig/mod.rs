/// Kubeconfig store: file-backed clusters, users and contexts
pub mod model;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{EntryKind, Error, Result};

pub use model::{
    Cluster, Context, ExecConfig, ExecEnvVar, Kubeconfig, NamedCluster, NamedContext, NamedUser,
    User,
};

pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

/// An opened kubeconfig file.
///
/// The document is read fully on [`KubeconfigStore::open`], mutated in memory
/// and written back by [`KubeconfigStore::close`], which consumes the store.
/// There is no locking: if two processes edit the same file the last close
/// wins.
#[derive(Debug)]
pub struct KubeconfigStore {
    path: PathBuf,
    document: Kubeconfig,
}

impl KubeconfigStore {
    /// Resolve the kubeconfig path the same way kubectl does for writes:
    /// the first entry of `$KUBECONFIG`, otherwise `~/.kube/config`.
    pub fn default_path() -> Result<PathBuf> {
        resolve_path(std::env::var_os(KUBECONFIG_ENV), dirs::home_dir())
    }

    /// Load the backing file, or start an empty document if it does not exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let document = match tokio::fs::read_to_string(&path).await {
            Ok(content) => Kubeconfig::from_yaml(&content).map_err(|source| Error::Malformed {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist, starting empty", path.display());
                Kubeconfig::default()
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        debug!(
            "Opened kubeconfig {} ({} clusters, {} users, {} contexts)",
            path.display(),
            document.clusters.len(),
            document.users.len(),
            document.contexts.len()
        );

        Ok(Self { path, document })
    }

    #[allow(dead_code)]
    pub fn document(&self) -> &Kubeconfig {
        &self.document
    }

    pub fn current_context(&self) -> Option<&str> {
        self.document.current_context.as_deref()
    }

    /// All clusters in file order
    pub fn get_clusters(&self) -> &[NamedCluster] {
        &self.document.clusters
    }

    pub fn get_cluster(&self, name: &str) -> Result<&NamedCluster> {
        self.document
            .clusters
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::not_found(EntryKind::Cluster, name))
    }

    #[allow(dead_code)]
    pub fn get_users(&self) -> &[NamedUser] {
        &self.document.users
    }

    pub fn get_user(&self, name: &str) -> Result<&NamedUser> {
        self.document
            .users
            .iter()
            .find(|u| u.name == name)
            .ok_or_else(|| Error::not_found(EntryKind::User, name))
    }

    pub fn get_contexts(&self) -> &[NamedContext] {
        &self.document.contexts
    }

    pub fn get_context(&self, name: &str) -> Result<&NamedContext> {
        self.document
            .contexts
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::not_found(EntryKind::Context, name))
    }

    pub fn add_cluster(
        &mut self,
        name: &str,
        server: &str,
        certificate_authority_data: &str,
    ) -> Result<()> {
        if self.get_cluster(name).is_ok() {
            return Err(Error::duplicate(EntryKind::Cluster, name));
        }

        self.document.clusters.push(NamedCluster {
            name: name.to_string(),
            cluster: Cluster {
                server: server.to_string(),
                certificate_authority_data: Some(certificate_authority_data.to_string()),
                extra: Default::default(),
            },
        });
        debug!("Added cluster {} ({})", name, server);
        Ok(())
    }

    /// Add a user with no credentials yet; see [`KubeconfigStore::add_to_user`]
    pub fn add_user(&mut self, name: &str) -> Result<()> {
        if self.get_user(name).is_ok() {
            return Err(Error::duplicate(EntryKind::User, name));
        }

        self.document.users.push(NamedUser {
            name: name.to_string(),
            user: User::default(),
        });
        debug!("Added user {}", name);
        Ok(())
    }

    /// Merge credentials (exec plugin, client certificate, token) into a user
    pub fn add_to_user(&mut self, name: &str, credentials: User) -> Result<()> {
        let entry = self
            .document
            .users
            .iter_mut()
            .find(|u| u.name == name)
            .ok_or_else(|| Error::not_found(EntryKind::User, name))?;

        entry.user.merge(credentials);
        Ok(())
    }

    /// Bind a user to a cluster under `name`.
    ///
    /// The referenced cluster and user are not required to exist.
    pub fn add_context(&mut self, name: &str, cluster_name: &str, user_name: &str) -> Result<()> {
        if self.get_context(name).is_ok() {
            return Err(Error::duplicate(EntryKind::Context, name));
        }

        self.document.contexts.push(NamedContext {
            name: name.to_string(),
            context: Context {
                cluster: cluster_name.to_string(),
                user: user_name.to_string(),
                namespace: None,
                extra: Default::default(),
            },
        });
        debug!("Added context {} ({} @ {})", name, user_name, cluster_name);
        Ok(())
    }

    pub fn set_current_context(&mut self, name: &str) -> Result<()> {
        self.get_context(name)?;
        self.document.current_context = Some(name.to_string());
        info!("Switched to context \"{}\"", name);
        Ok(())
    }

    pub fn remove_cluster(&mut self, name: &str) -> Result<()> {
        remove_named(&mut self.document.clusters, |c| c.name == name)
            .ok_or_else(|| Error::not_found(EntryKind::Cluster, name))?;
        debug!("Removed cluster {}", name);
        Ok(())
    }

    pub fn remove_user(&mut self, name: &str) -> Result<()> {
        remove_named(&mut self.document.users, |u| u.name == name)
            .ok_or_else(|| Error::not_found(EntryKind::User, name))?;
        debug!("Removed user {}", name);
        Ok(())
    }

    /// Remove a context, unsetting `current-context` if it pointed at it
    pub fn remove_context(&mut self, name: &str) -> Result<()> {
        remove_named(&mut self.document.contexts, |c| c.name == name)
            .ok_or_else(|| Error::not_found(EntryKind::Context, name))?;

        if self.current_context() == Some(name) {
            self.document.current_context = None;
        }
        debug!("Removed context {}", name);
        Ok(())
    }

    /// Write the document back and release the store.
    ///
    /// The new content goes to a sibling temporary file which is then renamed
    /// over the original, so readers never observe a half-written file.
    pub async fn close(self) -> Result<()> {
        let yaml = self.document.to_yaml().map_err(|source| Error::Malformed {
            path: self.path.clone(),
            source,
        })?;

        // Write through symlinks so a linked kubeconfig stays linked
        let target = match tokio::fs::canonicalize(&self.path).await {
            Ok(real) => real,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => self.path.clone(),
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }

        let tmp_path = temp_path(&target);
        tokio::fs::write(&tmp_path, yaml)
            .await
            .map_err(|e| Error::io(&tmp_path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| Error::io(&tmp_path, e))?;
        }

        if let Err(e) = tokio::fs::rename(&tmp_path, &target).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Error::io(&target, e));
        }

        debug!("Wrote kubeconfig {}", target.display());
        Ok(())
    }
}

/// First non-empty entry of a `KUBECONFIG` value, otherwise `<home>/.kube/config`
fn resolve_path(kubeconfig_env: Option<OsString>, home: Option<PathBuf>) -> Result<PathBuf> {
    let from_env = kubeconfig_env
        .as_deref()
        .and_then(|value| std::env::split_paths(value).find(|p| !p.as_os_str().is_empty()));
    if let Some(path) = from_env {
        return Ok(path);
    }

    home.map(|home| home.join(".kube").join("config"))
        .ok_or_else(|| {
            Error::Configuration(
                "cannot locate home directory; pass --kubeconfig or set KUBECONFIG".to_string(),
            )
        })
}

fn remove_named<T>(entries: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> Option<T> {
    let index = entries.iter().position(matches)?;
    Some(entries.remove(index))
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "config".to_string());
    path.with_file_name(format!(".{}.hubctl.tmp", file_name))
}
