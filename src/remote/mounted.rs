use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{ShareBackend, ShareEntry};
use crate::config::Credentials;
use crate::error::ShareError;

/// Backend for a share the OS has already mounted at
/// `<mount-root>/<server>/<share>` (cifs, gvfs, autofs). Credentials belong
/// to the mount, so authentication only records the session.
#[derive(Debug)]
pub struct MountedShare {
    mount_root: PathBuf,
    server_root: Option<PathBuf>,
    session: bool,
    share_root: Option<PathBuf>,
}

impl MountedShare {
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
            server_root: None,
            session: false,
            share_root: None,
        }
    }

    fn share_root(&self) -> Result<&Path, ShareError> {
        match (&self.share_root, self.session) {
            (Some(root), true) => Ok(root),
            _ => Err(ShareError::NotConnected),
        }
    }

    /// Resolve a share-relative path, refusing anything that climbs out.
    fn resolve(&self, relative: &str) -> Result<PathBuf, ShareError> {
        let root = self.share_root()?;
        let rel = Path::new(relative);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ShareError::Read {
                path: relative.to_string(),
                reason: "path escapes the share".to_string(),
            });
        }
        Ok(root.join(rel))
    }
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

#[async_trait]
impl ShareBackend for MountedShare {
    async fn connect(&mut self, server: &str) -> Result<(), ShareError> {
        let root = self.mount_root.join(server);
        if !is_dir(&root).await {
            return Err(ShareError::Connect {
                server: server.to_string(),
                reason: format!("no mount at {}", root.display()),
            });
        }
        self.server_root = Some(root);
        Ok(())
    }

    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), ShareError> {
        if self.server_root.is_none() {
            return Err(ShareError::NotConnected);
        }
        debug!(?credentials, "session credentials are managed by the mount");
        self.session = true;
        Ok(())
    }

    async fn mount(&mut self, share: &str) -> Result<(), ShareError> {
        let server_root = match (&self.server_root, self.session) {
            (Some(root), true) => root.clone(),
            _ => return Err(ShareError::NotConnected),
        };
        let root = server_root.join(share);
        if !is_dir(&root).await {
            return Err(ShareError::ShareNotFound(share.to_string()));
        }
        self.share_root = Some(root);
        Ok(())
    }

    fn connection_alive(&self) -> bool {
        self.server_root.as_deref().is_some_and(Path::is_dir)
    }

    async fn folder_exists(&mut self, folder: &str) -> Result<bool, ShareError> {
        let path = self.resolve(folder)?;
        Ok(is_dir(&path).await)
    }

    async fn list(&mut self, folder: &str) -> Result<Vec<ShareEntry>, ShareError> {
        let path = self.resolve(folder)?;
        let list_err = |err: std::io::Error| ShareError::List {
            folder: folder.to_string(),
            reason: err.to_string(),
        };
        let mut dir = fs::read_dir(&path).await.map_err(list_err)?;
        let mut entries = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(list_err)? {
            let meta = match entry.metadata().await {
                Ok(meta) => meta,
                // vanished between readdir and stat
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(list_err(err)),
            };
            entries.push(ShareEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: meta.is_dir(),
                changed: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
                size: meta.len(),
            });
        }
        Ok(entries)
    }

    async fn read(&mut self, path: &str) -> Result<Vec<u8>, ShareError> {
        let full = self.resolve(path)?;
        fs::read(&full).await.map_err(|err| ShareError::Read {
            path: path.to_string(),
            reason: err.to_string(),
        })
    }

    async fn close_share(&mut self) -> Result<(), ShareError> {
        self.share_root = None;
        Ok(())
    }

    async fn close_session(&mut self) -> Result<(), ShareError> {
        self.session = false;
        Ok(())
    }

    async fn close_connection(&mut self) -> Result<(), ShareError> {
        self.server_root = None;
        Ok(())
    }

    async fn close_client(&mut self) -> Result<(), ShareError> {
        Ok(())
    }
}
