//! Tile pixels: JPEG decode/encode and the decoded source tile cache.
//!
//! ```text
//! slide tile bytes ──decode──▶ RgbImage ──▶ TileCache
//!                                              │
//!                         read_region / resize ▼
//!                           Deep Zoom tile ──encode──▶ .jpeg
//! ```

mod cache;
mod encoder;

pub use cache::{TileCache, TileCacheKey, TileCacheStats, DEFAULT_TILE_CACHE_CAPACITY};
pub use encoder::{run_blocking, JpegTileEncoder, DEFAULT_JPEG_QUALITY};
