//! Binary entrypoint for the signage kiosk.
//!
//! Wires the library tasks together; no local modules here.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use kiosk_signage::config::{Configuration, Mode};
use kiosk_signage::display::LogSurface;
use kiosk_signage::events::{FetchRequest, FetchResult, UiTask};
use kiosk_signage::registry::{DisplayItem, SourceRegistry};
use kiosk_signage::remote::mounted::MountedShare;
use kiosk_signage::remote::{RemoteShare, SharedRemote};
use kiosk_signage::tasks::{fetcher, slideshow, supervisor::Supervisor};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

#[derive(Debug, Parser)]
#[command(
    name = "kiosk-signage",
    version,
    about = "Fullscreen slideshow fed by a local folder and an SMB share"
)]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,

    /// Override the configured mode (local, smb, hybrid)
    #[arg(long, value_name = "MODE")]
    mode: Option<Mode>,

    /// Connect, rescan once, print the playlist and exit
    #[arg(long)]
    list: bool,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbosity: u8) -> Result<()> {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(format!("kiosk_signage={level}").parse()?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn ensure_local_folder(cfg: &Configuration) {
    let dir = &cfg.local_images_folder;
    if !cfg.origins().local() || dir.exists() {
        return;
    }
    match fs::create_dir_all(dir) {
        Ok(()) => info!(dir = %dir.display(), "created local images folder"),
        Err(err) => warn!(dir = %dir.display(), error = %err, "cannot create local images folder"),
    }
}

fn build_remote(cfg: &Configuration) -> Option<SharedRemote> {
    if !cfg.origins().remote() {
        return None;
    }
    let backend = MountedShare::new(cfg.smb.mount_root.clone());
    Some(RemoteShare::shared(cfg.smb.clone(), Box::new(backend)))
}

async fn list_once(cfg: &Configuration, remote: Option<SharedRemote>) -> Result<()> {
    if let Some(remote) = &remote {
        remote.lock().await.connect().await;
    }
    let mut registry = SourceRegistry::new(cfg.local_images_folder.clone());
    let playlist = registry.rebuild(cfg.origins(), remote.as_ref()).await;

    println!("# mode: {}\n# images: {}", cfg.mode, playlist.len());
    if playlist.is_empty() {
        println!("{}", cfg.placeholder_message());
    }
    for (idx, item) in playlist.items().iter().enumerate() {
        println!(
            "  {:>4}: {} ({}) {}",
            idx + 1,
            item.name(),
            item.origin(),
            item.locator()
        );
    }

    if let Some(remote) = &remote {
        remote.lock().await.disconnect().await;
    }
    Ok(())
}

fn spawn_shutdown_watchers(cancel: &CancellationToken) {
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("ctrl-c handler failed: {err}");
                return;
            }
            info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    #[cfg(unix)]
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = sigterm.recv() => {
                            info!("SIGTERM received; initiating shutdown");
                            cancel.cancel();
                        }
                    }
                }
                Err(err) => warn!("failed to register SIGTERM handler: {err}"),
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let mut cfg = Configuration::load(&cli.config).validated();
    if let Some(mode) = cli.mode {
        cfg.mode = mode;
    }
    info!(
        "Loaded configuration from {}:\n{:#?}",
        cli.config.display(),
        cfg
    );

    ensure_local_folder(&cfg);
    let remote = build_remote(&cfg);

    if cli.list {
        return list_once(&cfg, remote).await;
    }

    // Channels (small/bounded)
    let (ui_tx, ui_rx) = mpsc::channel::<UiTask>(32); // Supervisor -> Slideshow
    let (fetch_tx, fetch_rx) = mpsc::channel::<FetchRequest>(4); // Slideshow -> Fetcher
    let (fetched_tx, fetched_rx) = mpsc::channel::<FetchResult>(4); // Fetcher -> Slideshow
    let (evicted_tx, evicted_rx) = mpsc::channel::<DisplayItem>(16); // Slideshow -> Supervisor

    let cancel = CancellationToken::new();
    spawn_shutdown_watchers(&cancel);

    let mut tasks = JoinSet::new();

    tasks.spawn({
        let supervisor = Supervisor::new(cfg.clone(), remote.clone(), ui_tx);
        let cancel = cancel.clone();
        async move { supervisor.run(evicted_rx, cancel).await.context("supervisor task failed") }
    });

    tasks.spawn({
        let remote = remote.clone();
        let cancel = cancel.clone();
        async move {
            fetcher::run(fetch_rx, fetched_tx, remote, cancel)
                .await
                .context("fetcher task failed")
        }
    });

    // The display loop owns the surface and runs on this task until shutdown
    if let Err(e) = slideshow::run(
        LogSurface::default(),
        cfg.clone(),
        ui_rx,
        fetch_tx,
        fetched_rx,
        evicted_tx,
        cancel.clone(),
    )
    .await
    .context("slideshow failed")
    {
        tracing::error!("{e:?}");
    }
    cancel.cancel();

    while let Some(res) = tasks.join_next().await {
        match res {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("task error: {e:?}"),
            Err(e) => tracing::error!("join error: {e}"),
        }
    }

    Ok(())
}
