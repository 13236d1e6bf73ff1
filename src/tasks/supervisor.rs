use std::time::{Duration, SystemTime};

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Configuration;
use crate::events::UiTask;
use crate::registry::{DisplayItem, Playlist, SourceRegistry, local_dir_modified};
use crate::remote::SharedRemote;

/// How long shutdown waits for an in-flight share call before abandoning
/// teardown.
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// What a single poll tick observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub local_changed: bool,
    pub remote_changed: bool,
    pub rescanned: bool,
}

/// Owns the share connection lifecycle and drives periodic rescans.
pub struct Supervisor {
    cfg: Configuration,
    registry: SourceRegistry,
    remote: Option<SharedRemote>,
    local_stamp: Option<SystemTime>,
    /// What the display loop holds, minus anything it has evicted since.
    published: Option<Playlist>,
    to_ui: Sender<UiTask>,
}

impl Supervisor {
    pub fn new(cfg: Configuration, remote: Option<SharedRemote>, to_ui: Sender<UiTask>) -> Self {
        let registry = SourceRegistry::new(cfg.local_images_folder.clone());
        Self {
            cfg,
            registry,
            remote,
            local_stamp: None,
            published: None,
            to_ui,
        }
    }

    async fn status(&self, text: impl Into<String>) {
        if self.to_ui.send(UiTask::Status(text.into())).await.is_err() {
            debug!("display loop gone; dropping status");
        }
    }

    async fn remote_connected(&self) -> bool {
        match &self.remote {
            Some(remote) => remote.lock().await.is_connected(),
            None => false,
        }
    }

    /// Start the first connection attempt in the background. The returned
    /// handle resolves to whether it succeeded.
    pub fn spawn_initial_connect(&self) -> Option<JoinHandle<bool>> {
        if !self.cfg.origins().remote() {
            return None;
        }
        let remote = self.remote.clone()?;
        let to_ui = self.to_ui.clone();
        Some(tokio::spawn(async move {
            let connected = remote.lock().await.connect().await;
            let text = if connected {
                "SMB connection established"
            } else {
                "SMB connection failed"
            };
            if to_ui.send(UiTask::Status(text.to_string())).await.is_err() {
                debug!("display loop gone; dropping status");
            }
            connected
        }))
    }

    /// Rebuild from every enabled origin and hand the result to the display
    /// loop. A rebuild equal to the last published playlist is not re-sent,
    /// so an idle rescan leaves the running slideshow alone.
    pub async fn rescan(&mut self) -> Playlist {
        let origins = self.cfg.origins();
        let stamp = if origins.local() {
            local_dir_modified(&self.cfg.local_images_folder)
        } else {
            None
        };
        let playlist = self.registry.rebuild(origins, self.remote.as_ref()).await;
        if origins.local() {
            self.local_stamp = stamp;
        }

        if self.published.as_ref() == Some(&playlist) {
            debug!(count = playlist.len(), "rescan unchanged; keeping slideshow position");
            return playlist;
        }
        self.published = Some(playlist.clone());
        self.status(format!("Loaded {} images in total", playlist.len()))
            .await;
        let task = if playlist.is_empty() {
            UiTask::Placeholder
        } else {
            UiTask::Apply(playlist.clone())
        };
        if self.to_ui.send(task).await.is_err() {
            warn!("display loop gone; playlist not delivered");
        }
        playlist
    }

    /// The display loop could not read `item`. Drop it from the registry so
    /// the next rescan that still lists it republishes and it gets retried.
    pub fn on_evicted(&mut self, item: &DisplayItem) {
        let remaining = self.registry.evict(item);
        debug!(name = item.name(), remaining = remaining.len(), "registry evicted unreadable item");
        if self.published.is_some() {
            self.published = Some(remaining);
        }
    }

    /// One poll: heal the connection, detect changes, rescan if needed.
    pub async fn tick(&mut self) -> TickOutcome {
        let origins = self.cfg.origins();
        let mut outcome = TickOutcome::default();

        if origins.remote() {
            if let Some(remote) = &self.remote {
                let mut share = remote.lock().await;
                if !share.is_connected() {
                    self.status("Reconnecting to SMB...").await;
                    if share.connect().await {
                        info!(share = %share.describe(), "share connection restored");
                        self.status("SMB connection restored").await;
                    } else {
                        warn!(share = %share.describe(), "reconnect failed; retrying next tick");
                    }
                }
            }
        }

        if origins.local() {
            let stamp = local_dir_modified(&self.cfg.local_images_folder);
            if is_newer(stamp, self.local_stamp) {
                outcome.local_changed = true;
                self.status("New local images found...").await;
            }
        }

        // Remote timestamps are not trusted, so a live connection always
        // rescans.
        if origins.remote() && self.remote_connected().await {
            outcome.remote_changed = true;
        }

        if outcome.local_changed || outcome.remote_changed {
            self.rescan().await;
            outcome.rescanned = true;
        }
        debug!(?outcome, "poll tick");
        outcome
    }

    /// Release the share connection, giving up if it stays busy.
    pub async fn shutdown(&self) {
        let Some(remote) = &self.remote else {
            return;
        };
        match timeout(TEARDOWN_GRACE, remote.lock()).await {
            Ok(mut share) => share.disconnect().await,
            Err(_) => warn!("share busy at shutdown; abandoning teardown"),
        }
    }

    /// Initial load, background connect, then poll every
    /// `file-check-interval` until cancelled.
    #[instrument(skip_all, fields(mode = %self.cfg.mode))]
    pub async fn run(
        mut self,
        mut evicted: Receiver<DisplayItem>,
        cancel: CancellationToken,
    ) -> Result<()> {
        self.status(format!("Mode: {}", self.cfg.mode)).await;
        self.rescan().await;

        // one-shot connect; a success triggers an early rescan
        let (connected_tx, mut connected_rx) = mpsc::channel::<bool>(1);
        if let Some(handle) = self.spawn_initial_connect() {
            tokio::spawn(async move {
                let connected = handle.await.unwrap_or(false);
                if connected_tx.send(connected).await.is_err() {
                    debug!("poll loop gone; dropping initial connect result");
                }
            });
        }

        let period = self.cfg.file_check_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                biased;

                _ = cancel.cancelled() => break,

                Some(item) = evicted.recv() => self.on_evicted(&item),

                Some(connected) = connected_rx.recv() => {
                    if connected {
                        self.rescan().await;
                    }
                }

                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        break;
                    }
                    self.tick().await;
                }
            }
        }

        drop(ticker);
        info!("poll loop cancelled; closing share");
        self.shutdown().await;
        Ok(())
    }
}

fn is_newer(current: Option<SystemTime>, cached: Option<SystemTime>) -> bool {
    match (current, cached) {
        (Some(current), Some(cached)) => current > cached,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
