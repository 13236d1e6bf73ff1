use crate::registry::{DisplayItem, Playlist};

/// Work marshaled from background tasks onto the display loop. Only the
/// display loop applies these to UI-owned state.
#[derive(Debug, Clone)]
pub enum UiTask {
    Status(String),
    /// A freshly rebuilt, non-empty playlist; restarts the slideshow.
    Apply(Playlist),
    /// Every enabled origin came back empty.
    Placeholder,
}

/// Display loop -> fetcher.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Playlist generation the request was made against.
    pub generation: u64,
    pub index: usize,
    pub item: DisplayItem,
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Fetcher -> display loop. `image` is `None` when the item could not be
/// read or decoded.
#[derive(Debug)]
pub struct FetchResult {
    pub generation: u64,
    pub index: usize,
    pub item: DisplayItem,
    pub image: Option<DecodedImage>,
}
