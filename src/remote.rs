//! Remote share client: connection lifecycle on top of a pluggable backend.
//!
//! The wire protocol lives behind [`ShareBackend`]. [`RemoteShare`] owns the
//! [`ConnectionState`] machine, tracks which handles are held so teardown can
//! release them in reverse order, and turns every failure into a logged,
//! soft result.

pub mod mounted;

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::{Credentials, SmbConfig};
use crate::error::ShareError;
use crate::registry::is_supported_image;

pub type SharedRemote = Arc<Mutex<RemoteShare>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Directory entry as reported by the share.
#[derive(Debug, Clone)]
pub struct ShareEntry {
    pub name: String,
    pub is_dir: bool,
    pub changed: SystemTime,
    pub size: u64,
}

/// A listed image on the share.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteImage {
    pub name: String,
    pub remote_path: String,
    pub last_modified: SystemTime,
    pub size: u64,
}

/// Protocol primitives. Each acquisition step has a matching release step;
/// [`RemoteShare`] only calls a release for a handle it acquired.
#[async_trait]
pub trait ShareBackend: Send {
    /// Create the client and open the network connection to `server`.
    async fn connect(&mut self, server: &str) -> Result<(), ShareError>;
    async fn authenticate(&mut self, credentials: &Credentials) -> Result<(), ShareError>;
    async fn mount(&mut self, share: &str) -> Result<(), ShareError>;
    /// Whether the underlying network connection is still up.
    fn connection_alive(&self) -> bool;

    async fn folder_exists(&mut self, folder: &str) -> Result<bool, ShareError>;
    async fn list(&mut self, folder: &str) -> Result<Vec<ShareEntry>, ShareError>;
    async fn read(&mut self, path: &str) -> Result<Vec<u8>, ShareError>;

    async fn close_share(&mut self) -> Result<(), ShareError>;
    async fn close_session(&mut self) -> Result<(), ShareError>;
    async fn close_connection(&mut self) -> Result<(), ShareError>;
    async fn close_client(&mut self) -> Result<(), ShareError>;
}

#[derive(Debug, Default, Clone, Copy)]
struct Held {
    client: bool,
    connection: bool,
    session: bool,
    share: bool,
}

impl Held {
    fn any(self) -> bool {
        self.client || self.connection || self.session || self.share
    }
}

pub struct RemoteShare {
    cfg: SmbConfig,
    backend: Box<dyn ShareBackend>,
    state: ConnectionState,
    held: Held,
}

impl RemoteShare {
    pub fn new(cfg: SmbConfig, backend: Box<dyn ShareBackend>) -> Self {
        Self {
            cfg,
            backend,
            state: ConnectionState::Disconnected,
            held: Held::default(),
        }
    }

    pub fn shared(cfg: SmbConfig, backend: Box<dyn ShareBackend>) -> SharedRemote {
        Arc::new(Mutex::new(Self::new(cfg, backend)))
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// `server/share/folder`, for status lines.
    pub fn describe(&self) -> String {
        format!("{}/{}/{}", self.cfg.server, self.cfg.share, self.cfg.folder)
    }

    /// Establish client, connection, session and share. Any stale handles
    /// from an earlier attempt are released first. Returns whether the share
    /// is now usable; never leaves the state at `Connecting`.
    #[instrument(skip(self), fields(server = %self.cfg.server, share = %self.cfg.share))]
    pub async fn connect(&mut self) -> bool {
        if self.held.any() {
            debug!("releasing stale handles before reconnecting");
            self.release_handles().await;
        }
        self.state = ConnectionState::Connecting;
        match self.establish().await {
            Ok(()) => {
                self.state = ConnectionState::Connected;
                info!("connected to share");
                true
            }
            Err(err) => {
                warn!(error = %err, "share connection failed");
                self.release_handles().await;
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    async fn establish(&mut self) -> Result<(), ShareError> {
        self.held.client = true;
        self.backend.connect(&self.cfg.server).await?;
        self.held.connection = true;
        self.backend.authenticate(&self.cfg.credentials()).await?;
        self.held.session = true;
        self.backend.mount(&self.cfg.share).await?;
        self.held.share = true;
        Ok(())
    }

    /// True only while the session and mounted share are held and the
    /// network connection is still alive.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
            && self.held.connection
            && self.held.session
            && self.held.share
            && self.backend.connection_alive()
    }

    /// Supported images in the configured folder. Empty on any failure.
    pub async fn list_images(&mut self) -> Vec<RemoteImage> {
        if !self.is_connected() {
            warn!("not connected to share; cannot list images");
            return Vec::new();
        }
        let folder = self.cfg.folder.clone();
        match self.backend.folder_exists(&folder).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(error = %ShareError::FolderMissing(folder), "skipping remote listing");
                return Vec::new();
            }
            Err(err) => {
                warn!(error = %err, "cannot check share folder");
                return Vec::new();
            }
        }
        match self.backend.list(&folder).await {
            Ok(entries) => {
                let images: Vec<RemoteImage> = entries
                    .into_iter()
                    .filter(|e| !e.is_dir && is_supported_image(&e.name))
                    .map(|e| RemoteImage {
                        remote_path: format!("{folder}/{}", e.name),
                        name: e.name,
                        last_modified: e.changed,
                        size: e.size,
                    })
                    .collect();
                debug!(count = images.len(), folder = %folder, "listed share folder");
                images
            }
            Err(err) => {
                warn!(error = %err, "listing share folder failed");
                Vec::new()
            }
        }
    }

    /// Bytes of `remote_path`, or `None` when it cannot be read.
    pub async fn download_image(&mut self, remote_path: &str) -> Option<Vec<u8>> {
        if !self.is_connected() {
            warn!(path = remote_path, "not connected to share; cannot download");
            return None;
        }
        match self.backend.read(remote_path).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(path = remote_path, error = %err, "download failed");
                None
            }
        }
    }

    /// Best-effort teardown. Always ends `Disconnected`; safe to repeat.
    pub async fn disconnect(&mut self) {
        let had_handles = self.held.any();
        self.release_handles().await;
        self.state = ConnectionState::Disconnected;
        if had_handles {
            info!("share connection closed");
        }
    }

    async fn release_handles(&mut self) {
        if self.held.share {
            self.held.share = false;
            log_teardown(self.backend.close_share().await);
        }
        if self.held.session {
            self.held.session = false;
            log_teardown(self.backend.close_session().await);
        }
        if self.held.connection {
            self.held.connection = false;
            log_teardown(self.backend.close_connection().await);
        }
        if self.held.client {
            self.held.client = false;
            log_teardown(self.backend.close_client().await);
        }
    }
}

fn log_teardown(result: Result<(), ShareError>) {
    if let Err(err) = result {
        warn!(error = %err, "error while closing share connection");
    }
}
