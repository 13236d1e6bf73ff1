use tracing::{debug, info, trace};

use crate::events::DecodedImage;

/// The rendering collaborator. Implementations run on the display loop and
/// must not block.
pub trait DisplaySurface: Send {
    /// Show `image`, or clear the picture when `None`.
    fn render(&mut self, image: Option<&DecodedImage>);
    fn set_status_text(&mut self, text: &str);
    fn set_clock_text(&mut self, text: &str);
}

/// Headless surface that reports what would be on screen through tracing.
#[derive(Debug, Default)]
pub struct LogSurface {
    showing: Option<String>,
}

impl DisplaySurface for LogSurface {
    fn render(&mut self, image: Option<&DecodedImage>) {
        match image {
            Some(img) => {
                info!(name = %img.name, width = img.width, height = img.height, "render");
                self.showing = Some(img.name.clone());
            }
            None => {
                if self.showing.take().is_some() {
                    info!("render: cleared");
                }
            }
        }
    }

    fn set_status_text(&mut self, text: &str) {
        debug!(text, "status text");
    }

    fn set_clock_text(&mut self, text: &str) {
        trace!(text, "clock text");
    }
}
