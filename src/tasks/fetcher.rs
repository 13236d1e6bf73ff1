use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::events::{DecodedImage, FetchRequest, FetchResult};
use crate::registry::{DisplayItem, Origin};
use crate::remote::SharedRemote;

fn decode_rgba8(name: &str, bytes: &[u8]) -> Option<DecodedImage> {
    match image::load_from_memory(bytes) {
        Ok(img) => {
            let rgba = img.to_rgba8();
            let (width, height) = rgba.dimensions();
            Some(DecodedImage {
                name: name.to_string(),
                width,
                height,
                pixels: rgba.into_raw(),
            })
        }
        Err(err) => {
            warn!(name, error = %err, "image failed to decode");
            None
        }
    }
}

async fn read_bytes(item: &DisplayItem, remote: Option<&SharedRemote>) -> Option<Vec<u8>> {
    match item.origin() {
        Origin::Local => match tokio::fs::read(item.locator()).await {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                warn!(path = item.locator(), error = %err, "cannot read local image");
                None
            }
        },
        Origin::Remote => match remote {
            Some(remote) => remote.lock().await.download_image(item.locator()).await,
            None => {
                warn!(path = item.locator(), "remote item without a share client");
                None
            }
        },
    }
}

/// Read and decode one item off the display loop. Decoding runs on the
/// blocking pool.
pub async fn fetch(item: &DisplayItem, remote: Option<&SharedRemote>) -> Option<DecodedImage> {
    let bytes = read_bytes(item, remote).await?;
    let name = item.name().to_string();
    match tokio::task::spawn_blocking(move || decode_rgba8(&name, &bytes)).await {
        Ok(decoded) => decoded,
        Err(err) => {
            warn!(error = %err, "decode task failed");
            None
        }
    }
}

/// Serves fetch requests from the display loop one at a time.
#[instrument(skip_all)]
pub async fn run(
    mut requests: Receiver<FetchRequest>,
    to_display: Sender<FetchResult>,
    remote: Option<SharedRemote>,
    cancel: CancellationToken,
) -> Result<()> {
    loop {
        let request = select! {
            _ = cancel.cancelled() => break,
            maybe = requests.recv() => match maybe {
                Some(request) => request,
                None => break,
            },
        };

        let FetchRequest {
            generation,
            index,
            item,
        } = request;
        debug!(name = item.name(), origin = %item.origin(), generation, "fetching");
        let image = select! {
            _ = cancel.cancelled() => break,
            image = fetch(&item, remote.as_ref()) => image,
        };
        let result = FetchResult {
            generation,
            index,
            item,
            image,
        };
        if to_display.send(result).await.is_err() {
            warn!("display loop gone; stopping fetcher");
            break;
        }
    }
    info!("fetcher stopped");
    Ok(())
}
