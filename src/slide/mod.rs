//! Slide abstraction layer.
//!
//! ```text
//!              DeepZoomGenerator
//!                      │ RegionSource
//!                      ▼
//!                    Slide  ──▶ BlockCache ──▶ LocalFileReader
//!                      │ SlideReader
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//!     SvsReader            GenericTiffReader
//! ```
//!
//! [`Slide`] is the handle the converter works with: it opens a file,
//! detects its format, and answers region reads by decoding and stitching
//! native tiles.

mod handle;
mod reader;
mod region;

pub use handle::{Slide, SlideOptions};
pub use reader::{base_properties, LevelInfo, SlideReader};
pub use region::{RegionSource, SlideBounds, DEFAULT_BACKGROUND};
