//! The `.dzi` XML descriptor.

use super::generator::{OVERLAP, TILE_SIZE};

pub const DEEPZOOM_NAMESPACE: &str = "http://schemas.microsoft.com/deepzoom/2008";

/// Tile image format written by this crate.
pub const TILE_FORMAT: &str = "jpeg";

/// Descriptor fields; `width` and `height` are those of the last (full
/// resolution) Deep Zoom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DziDescriptor {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub overlap: u32,
}

impl DziDescriptor {
    /// Descriptor for the fixed 254/1 tiling.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tile_size: TILE_SIZE,
            overlap: OVERLAP,
        }
    }

    /// Render the XML document, one attribute per line.
    pub fn to_xml(&self) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
             <Image xmlns=\"{ns}\"\n  \
             Format=\"{format}\"\n  \
             Overlap=\"{overlap}\"\n  \
             TileSize=\"{tile_size}\">\n  \
             <Size Height=\"{height}\"\n    \
             Width=\"{width}\" />\n\
             </Image>",
            ns = DEEPZOOM_NAMESPACE,
            format = TILE_FORMAT,
            overlap = self.overlap,
            tile_size = self.tile_size,
            height = self.height,
            width = self.width,
        )
    }
}
