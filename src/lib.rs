//! # wsi-dzi
//!
//! Converts Whole Slide Images (WSI) into Deep Zoom (DZI) tile pyramids that
//! OpenSeadragon and other Deep Zoom viewers display directly.
//!
//! ## Features
//!
//! - **Native slide reading**: TIFF/BigTIFF parser with Aperio SVS and generic
//!   pyramidal TIFF support, JPEG-compressed tiles only
//! - **Deep Zoom tiling**: 254px tiles with 1px overlap, levels halving down to
//!   a single pixel, each tile read from the best native level
//! - **Bounded memory**: block cache for file reads, LRU cache of decoded
//!   source tiles
//! - **Upload service**: optional HTTP endpoint that converts uploaded slides
//!   and serves the results
//!
//! ## Architecture
//!
//! - [`io`] - Range reads over local files with block caching
//! - [`mod@format`] - TIFF/SVS parsers and JPEG stream handling
//! - [`slide`] - Opened slide handle and region reads
//! - [`tile`] - JPEG decode/encode and decoded tile cache
//! - [`dzi`] - Deep Zoom pyramid math, descriptor, and on-disk writer
//! - [`convert`] - The end-to-end conversion routine
//! - [`server`] - Axum upload service
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use wsi_dzi::{convert, ConsoleObserver, SlideOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wsi_dzi::ConvertError> {
//!     let summary = convert(
//!         Path::new("CMU-1.svs"),
//!         Path::new("out"),
//!         "cmu1",
//!         &SlideOptions::default(),
//!         &ConsoleObserver,
//!     )
//!     .await?;
//!     println!("{} levels, {} tiles", summary.level_count, summary.tile_count);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod convert;
pub mod dzi;
pub mod error;
pub mod format;
pub mod io;
pub mod server;
pub mod slide;
pub mod tile;

// Re-export commonly used types
pub use config::{CacheArgs, Cli, Command, ConvertConfig, ServeConfig};
pub use convert::{convert, ConsoleObserver, ConvertObserver, ConvertSummary, TracingObserver};
pub use dzi::{
    DeepZoomGenerator, DeepZoomOptions, DziDescriptor, DziWriter, TileRegion, TileSource, OVERLAP,
    TILE_SIZE,
};
pub use error::{ConvertError, FormatError, IoError, TiffError, TileError};
pub use format::tiff::{
    validate_level, validate_pyramid, ByteOrder, Compression, FieldType, Ifd, IfdEntry,
    LevelData, PyramidLevel, TiffHeader, TiffPyramid, TiffTag, TileData, ValidationError,
    ValidationResult, ValueReader,
};
pub use format::{
    detect_format, is_tiff_header, GenericTiffReader, SlideFormat, SvsMetadata, SvsReader,
};
pub use io::{BlockCache, LocalFileReader, RangeReader};
pub use server::{create_router, AppState, RouterConfig};
pub use slide::{LevelInfo, RegionSource, Slide, SlideBounds, SlideOptions, SlideReader};
pub use tile::{JpegTileEncoder, TileCache, DEFAULT_JPEG_QUALITY, DEFAULT_TILE_CACHE_CAPACITY};
