//! Source registry: the ordered set of displayable items across origins.
//!
//! The item list is published as an immutable [`Playlist`] snapshot. A rescan
//! or an eviction builds a new snapshot; nothing ever edits one in place, so a
//! reader holding the previous `Arc` never observes a half-built list.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::remote::SharedRemote;

/// Extensions accepted from either origin, compared case-insensitively.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp"];

#[must_use]
pub fn is_supported_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Local,
    Remote,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "LOCAL",
            Self::Remote => "SMB",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnabledOrigins {
    Local,
    Remote,
    Both,
}

impl EnabledOrigins {
    pub fn local(self) -> bool {
        matches!(self, Self::Local | Self::Both)
    }

    pub fn remote(self) -> bool {
        matches!(self, Self::Remote | Self::Both)
    }
}

/// One displayable image. Identity is `(name, origin, locator)`.
#[derive(Debug, Clone)]
pub struct DisplayItem {
    name: String,
    origin: Origin,
    locator: String,
    last_modified: SystemTime,
}

impl DisplayItem {
    pub fn new(
        name: impl Into<String>,
        origin: Origin,
        locator: impl Into<String>,
        last_modified: SystemTime,
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            locator: locator.into(),
            last_modified,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Filesystem path for local items, share-relative path for remote ones.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }
}

impl PartialEq for DisplayItem {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.origin == other.origin && self.locator == other.locator
    }
}

impl Eq for DisplayItem {}

impl Hash for DisplayItem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.origin.hash(state);
        self.locator.hash(state);
    }
}

/// Immutable snapshot of the item sequence, cheap to clone and hand across
/// tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist(Arc<[DisplayItem]>);

impl Default for Playlist {
    fn default() -> Self {
        Self(Arc::from(Vec::new()))
    }
}

impl Playlist {
    /// Sort by name (stable, so equal names keep their contribution order)
    /// and drop exact duplicates.
    pub fn from_items(items: Vec<DisplayItem>) -> Self {
        let mut seen = HashSet::with_capacity(items.len());
        let mut items: Vec<DisplayItem> = items
            .into_iter()
            .filter(|item| seen.insert(item.clone()))
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Self(Arc::from(items))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&DisplayItem> {
        self.0.get(index)
    }

    pub fn items(&self) -> &[DisplayItem] {
        &self.0
    }

    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(DisplayItem::name).collect()
    }
}

/// Position of the display loop inside the current playlist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisplayCursor {
    index: usize,
}

impl DisplayCursor {
    pub fn at(index: usize) -> Self {
        Self { index }
    }

    pub fn index(self) -> usize {
        self.index
    }

    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn advance(&mut self, len: usize) {
        self.index = if len == 0 { 0 } else { (self.index + 1) % len };
    }

    /// Wrap to the start when the index is at or past `len`.
    pub fn clamp(&mut self, len: usize) {
        if self.index >= len {
            self.index = 0;
        }
    }
}

/// Evict the item at `index`, returning the new snapshot and a cursor that
/// points at the item that followed it (or 0 when it was the last one).
pub fn remove_unreadable(sequence: &Playlist, index: usize) -> (Playlist, DisplayCursor) {
    let mut items = sequence.items().to_vec();
    if index < items.len() {
        let evicted = items.remove(index);
        debug!(name = evicted.name(), origin = %evicted.origin(), "evicted unreadable item");
    }
    let mut cursor = DisplayCursor::at(index);
    cursor.clamp(items.len());
    (Playlist(Arc::from(items)), cursor)
}

/// Owns the most recently built snapshot.
#[derive(Debug)]
pub struct SourceRegistry {
    local_dir: PathBuf,
    current: Playlist,
}

impl SourceRegistry {
    pub fn new(local_dir: impl Into<PathBuf>) -> Self {
        Self {
            local_dir: local_dir.into(),
            current: Playlist::default(),
        }
    }

    pub fn current(&self) -> Playlist {
        self.current.clone()
    }

    /// Drop an item the display loop could not read. The next rebuild that
    /// still lists it brings it back.
    pub fn evict(&mut self, item: &DisplayItem) -> Playlist {
        if let Some(index) = self.current.items().iter().position(|i| i == item) {
            self.current = remove_unreadable(&self.current, index).0;
        }
        self.current.clone()
    }

    /// Re-list every enabled origin and replace the current snapshot.
    ///
    /// Failures in either origin are logged and contribute zero items; this
    /// never errors. Calling it twice over unchanged sources yields equal
    /// playlists.
    pub async fn rebuild(
        &mut self,
        origins: EnabledOrigins,
        remote: Option<&SharedRemote>,
    ) -> Playlist {
        let mut items = Vec::new();

        if origins.remote() {
            match remote {
                Some(remote) => {
                    let mut share = remote.lock().await;
                    if share.is_connected() {
                        let listed = share.list_images().await;
                        info!(count = listed.len(), "loaded images from share");
                        items.extend(listed.into_iter().map(|image| {
                            DisplayItem::new(
                                image.name,
                                Origin::Remote,
                                image.remote_path,
                                image.last_modified,
                            )
                        }));
                    } else {
                        warn!("no share connection; remote origin contributes nothing");
                    }
                }
                None => warn!("remote origin enabled without a share client"),
            }
        }

        if origins.local() {
            let dir = self.local_dir.clone();
            let local = match tokio::task::spawn_blocking(move || list_local(&dir)).await {
                Ok(local) => local,
                Err(err) => {
                    warn!(error = %err, "local listing task failed");
                    Vec::new()
                }
            };
            info!(count = local.len(), dir = %self.local_dir.display(), "loaded local images");
            items.extend(local);
        }

        self.current = Playlist::from_items(items);
        info!(total = self.current.len(), "rebuilt playlist");
        self.current.clone()
    }
}

/// Non-recursive listing of supported images in `dir`. An unreadable or
/// missing directory yields nothing.
pub fn list_local(dir: &Path) -> Vec<DisplayItem> {
    match fs::metadata(dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            warn!(dir = %dir.display(), "local images path is not a directory");
            return Vec::new();
        }
        Err(err) => {
            warn!(dir = %dir.display(), error = %err, "cannot access local images folder");
            return Vec::new();
        }
    }

    let mut out = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let Some(name) = entry.file_name().to_str() else {
            debug!(path = %entry.path().display(), "skipping non-UTF-8 file name");
            continue;
        };
        if !is_supported_image(name) {
            continue;
        }
        let path = std::path::absolute(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
        let modified = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        out.push(DisplayItem::new(
            name,
            Origin::Local,
            path.to_string_lossy(),
            modified,
        ));
    }
    out
}

/// Last-modified time of the local folder itself; `None` when it cannot be
/// read.
pub fn local_dir_modified(dir: &Path) -> Option<SystemTime> {
    fs::metadata(dir).and_then(|m| m.modified()).ok()
}
