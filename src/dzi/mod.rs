//! Deep Zoom output: the tile pyramid, its XML descriptor, and the on-disk
//! layout OpenSeadragon and other Deep Zoom viewers read.

mod descriptor;
mod generator;
mod writer;

pub use descriptor::{DziDescriptor, DEEPZOOM_NAMESPACE, TILE_FORMAT};
pub use generator::{
    DeepZoomGenerator, DeepZoomOptions, TileRegion, TileSource, LIMIT_BOUNDS, OVERLAP, TILE_SIZE,
};
pub use writer::DziWriter;
