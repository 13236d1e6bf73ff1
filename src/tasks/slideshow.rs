use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::Configuration;
use crate::display::DisplaySurface;
use crate::events::{FetchRequest, FetchResult, UiTask};
use crate::registry::{DisplayCursor, DisplayItem, Playlist, remove_unreadable};

const CLOCK_PERIOD: Duration = Duration::from_secs(1);
const CLOCK_FORMAT: &str = "%H:%M:%S  %d.%m.%Y";

/// UI-owned state. Lives only inside [`run`].
struct Slideshow<S> {
    surface: S,
    placeholder: String,
    playlist: Playlist,
    cursor: DisplayCursor,
    generation: u64,
    in_flight: bool,
    showing_placeholder: bool,
    to_fetcher: Sender<FetchRequest>,
    evicted: Sender<DisplayItem>,
}

impl<S: DisplaySurface> Slideshow<S> {
    fn status(&mut self, text: &str) {
        info!(text, "status");
        self.surface.set_status_text(text);
    }

    fn replace(&mut self, playlist: Playlist) {
        self.playlist = playlist;
        self.cursor.reset();
        self.generation += 1;
        self.in_flight = false;
        self.showing_placeholder = false;
    }

    /// Apply one marshaled task; returns whether the slide timer restarts.
    fn apply(&mut self, task: UiTask) -> bool {
        match task {
            UiTask::Status(text) => {
                self.status(&text);
                false
            }
            UiTask::Apply(playlist) => {
                debug!(count = playlist.len(), "applying new playlist");
                let empty = playlist.is_empty();
                self.replace(playlist);
                if empty {
                    self.show_placeholder();
                }
                !empty
            }
            UiTask::Placeholder => {
                self.replace(Playlist::default());
                self.show_placeholder();
                false
            }
        }
    }

    fn show_placeholder(&mut self) {
        if self.showing_placeholder {
            return;
        }
        self.showing_placeholder = true;
        self.surface.render(None);
        let message = self.placeholder.clone();
        self.status(&message);
    }

    fn show_next(&mut self) {
        if self.playlist.is_empty() {
            self.show_placeholder();
            return;
        }
        if self.in_flight {
            debug!("previous fetch still pending; holding current image");
            return;
        }
        self.cursor.clamp(self.playlist.len());
        let index = self.cursor.index();
        let Some(item) = self.playlist.get(index).cloned() else {
            return;
        };
        let request = FetchRequest {
            generation: self.generation,
            index,
            item,
        };
        match self.to_fetcher.try_send(request) {
            Ok(()) => self.in_flight = true,
            Err(err) => warn!(error = %err, "cannot queue fetch"),
        }
    }

    fn on_fetched(&mut self, result: FetchResult) {
        if result.generation != self.generation {
            debug!(name = result.item.name(), "dropping fetch for a replaced playlist");
            return;
        }
        self.in_flight = false;
        match result.image {
            Some(image) => {
                self.showing_placeholder = false;
                self.surface.render(Some(&image));
                let len = self.playlist.len();
                self.cursor = DisplayCursor::at(result.index);
                self.cursor.advance(len);
                let text = format!(
                    "Showing: {} ({}) ({}/{})",
                    result.item.name(),
                    result.item.origin(),
                    result.index + 1,
                    len
                );
                self.status(&text);
            }
            None => {
                let (playlist, cursor) = remove_unreadable(&self.playlist, result.index);
                self.playlist = playlist;
                self.cursor = cursor;
                let text = format!("Skipped unreadable image: {}", result.item.name());
                self.status(&text);
                if let Err(err) = self.evicted.try_send(result.item) {
                    warn!(error = %err, "cannot report eviction to the supervisor");
                }
                self.show_next();
            }
        }
    }

    fn tick_clock(&mut self) {
        let text = Local::now().format(CLOCK_FORMAT).to_string();
        self.surface.set_clock_text(&text);
    }
}

/// The display loop: the only context that touches `surface`, the playlist it
/// is showing, and the cursor. Background tasks reach it through `ui_rx`;
/// unreadable items go back to the supervisor on `evicted`.
#[instrument(skip_all, fields(interval = ?cfg.slideshow_interval))]
pub async fn run<S: DisplaySurface>(
    surface: S,
    cfg: Configuration,
    mut ui_rx: Receiver<UiTask>,
    to_fetcher: Sender<FetchRequest>,
    mut fetched_rx: Receiver<FetchResult>,
    evicted: Sender<DisplayItem>,
    cancel: CancellationToken,
) -> Result<()> {
    let mut show = Slideshow {
        surface,
        placeholder: cfg.placeholder_message(),
        playlist: Playlist::default(),
        cursor: DisplayCursor::default(),
        generation: 0,
        in_flight: false,
        showing_placeholder: false,
        to_fetcher,
        evicted,
    };
    show.status("Starting...");
    show.tick_clock();

    let mut slides = interval(cfg.slideshow_interval);
    slides.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut clock = interval(CLOCK_PERIOD);
    clock.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        select! {
            biased;

            _ = cancel.cancelled() => break,

            Some(task) = ui_rx.recv() => {
                // drain everything queued before the next frame
                let mut restart = show.apply(task);
                while let Ok(task) = ui_rx.try_recv() {
                    restart |= show.apply(task);
                }
                if restart {
                    slides.reset_immediately();
                }
            }

            Some(result) = fetched_rx.recv() => show.on_fetched(result),

            _ = slides.tick() => show.show_next(),

            _ = clock.tick() => show.tick_clock(),
        }
    }

    info!("slideshow stopped");
    Ok(())
}
