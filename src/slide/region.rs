//! Region reads: the slide-side interface the Deep Zoom generator consumes.

use async_trait::async_trait;
use image::{Rgb, RgbImage};

use crate::error::TileError;

/// White, the background of every supported format.
pub const DEFAULT_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Non-empty area of a slide in level-0 pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideBounds {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait RegionSource: Send + Sync {
    /// Level 0 size.
    fn dimensions(&self) -> (u32, u32);

    fn level_count(&self) -> usize;

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)>;

    fn level_downsample(&self, level: usize) -> Option<f64>;

    fn best_level_for_downsample(&self, downsample: f64) -> usize;

    /// Scanned area, when the format records one.
    fn bounds(&self) -> Option<SlideBounds> {
        None
    }

    fn background(&self) -> Rgb<u8> {
        DEFAULT_BACKGROUND
    }

    /// An RGB image of `size` whose top-left corner is `location` in level-0
    /// pixels, sampled from `level`. Anything outside the level is
    /// background.
    async fn read_region(
        &self,
        location: (i64, i64),
        level: usize,
        size: (u32, u32),
    ) -> Result<RgbImage, TileError>;
}

/// Per-axis copy between a tile placed at `tile_origin` and an output
/// region starting at `region_origin`, limited to `[0, limit)` in level
/// pixels.
///
/// Returns `(source_offset, dest_offset, length)`, or None when they do not
/// overlap.
pub(crate) fn overlap_span(
    tile_origin: i64,
    tile_len: u32,
    region_origin: i64,
    region_len: u32,
    limit: u32,
) -> Option<(u32, u32, u32)> {
    let start = tile_origin.max(region_origin).max(0);
    let end = (tile_origin + tile_len as i64)
        .min(region_origin + region_len as i64)
        .min(limit as i64);
    if start >= end {
        return None;
    }
    Some((
        (start - tile_origin) as u32,
        (start - region_origin) as u32,
        (end - start) as u32,
    ))
}

/// Copy the overlapping part of `tile` (placed at `tile_origin` in level
/// pixels) into `out` (placed at `region_origin`), clipped to `level_size`.
pub(crate) fn blit_tile(
    out: &mut RgbImage,
    region_origin: (i64, i64),
    tile: &RgbImage,
    tile_origin: (i64, i64),
    level_size: (u32, u32),
) {
    let Some((sx, dx, w)) = overlap_span(
        tile_origin.0,
        tile.width(),
        region_origin.0,
        out.width(),
        level_size.0,
    ) else {
        return;
    };
    let Some((sy, dy, h)) = overlap_span(
        tile_origin.1,
        tile.height(),
        region_origin.1,
        out.height(),
        level_size.1,
    ) else {
        return;
    };

    for y in 0..h {
        for x in 0..w {
            out.put_pixel(dx + x, dy + y, *tile.get_pixel(sx + x, sy + y));
        }
    }
}
