//! Deep Zoom tile generation.
//!
//! Deep Zoom numbers its levels the other way round from a slide pyramid:
//! level 0 is 1x1 and the last level is full resolution, each level half the
//! size of the next (rounded up). Every Deep Zoom level is served from the
//! native level closest to it without upsampling, then scaled the rest of
//! the way.
//!
//! Tiles are `tile_size` pixels plus `overlap` pixels on every side that has
//! a neighbour, so interior tiles are `tile_size + 2 * overlap` wide.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

use crate::error::TileError;
use crate::tile::run_blocking;
use crate::slide::RegionSource;

pub const TILE_SIZE: u32 = 254;

pub const OVERLAP: u32 = 1;

pub const LIMIT_BOUNDS: bool = true;

// =============================================================================
// TileSource
// =============================================================================

/// The four operations the writer needs from a Deep Zoom pyramid.
#[async_trait]
pub trait TileSource: Send + Sync {
    fn level_count(&self) -> usize;

    /// `(columns, rows)` of a level, None when the level does not exist.
    fn level_tile_grid(&self, level: usize) -> Option<(u32, u32)>;

    /// `(width, height)` of a level, None when the level does not exist.
    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)>;

    async fn get_tile(&self, level: usize, column: u32, row: u32) -> Result<RgbImage, TileError>;
}

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeepZoomOptions {
    pub tile_size: u32,
    pub overlap: u32,

    /// Render only the slide's bounds instead of the whole level 0 area
    pub limit_bounds: bool,
}

impl Default for DeepZoomOptions {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            overlap: OVERLAP,
            limit_bounds: LIMIT_BOUNDS,
        }
    }
}

/// The `read_region` call behind one Deep Zoom tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRegion {
    /// Top-left corner in level-0 pixels
    pub location: (i64, i64),

    /// Native level read from
    pub slide_level: usize,

    /// Pixels read from `slide_level`
    pub size: (u32, u32),

    /// Final tile size after scaling
    pub output_size: (u32, u32),
}

// =============================================================================
// DeepZoomGenerator
// =============================================================================

pub struct DeepZoomGenerator<S> {
    source: S,
    options: DeepZoomOptions,

    /// Level-0 offset of the rendered area
    l0_offset: (i64, i64),

    /// Native level sizes, scaled to the rendered area
    l_dimensions: Vec<(u32, u32)>,

    /// Deep Zoom level sizes, 1x1 first
    z_dimensions: Vec<(u32, u32)>,

    /// Tile grid per Deep Zoom level
    t_dimensions: Vec<(u32, u32)>,

    /// Native level used for each Deep Zoom level
    slide_from_dz_level: Vec<usize>,

    /// Native level downsamples relative to level 0
    l0_l_downsamples: Vec<f64>,

    /// Remaining downsample from the native level to the Deep Zoom level
    l_z_downsamples: Vec<f64>,
}

impl<S: RegionSource> DeepZoomGenerator<S> {
    /// 254 px tiles, 1 px overlap, limited to the slide bounds.
    pub fn new(source: S) -> Self {
        Self::with_options(source, DeepZoomOptions::default())
    }

    pub fn with_options(source: S, options: DeepZoomOptions) -> Self {
        let native_levels = source.level_count();
        let native_dimensions: Vec<(u32, u32)> = (0..native_levels)
            .map(|l| source.level_dimensions(l).unwrap_or((0, 0)))
            .collect();
        let l0_l_downsamples: Vec<f64> = (0..native_levels)
            .map(|l| source.level_downsample(l).unwrap_or(1.0))
            .collect();

        let bounds = if options.limit_bounds {
            source.bounds()
        } else {
            None
        };
        let (l0_offset, l_dimensions) = match bounds {
            Some(bounds) => {
                let (l0_w, l0_h) = source.dimensions();
                let scale = (
                    bounds.width as f64 / l0_w.max(1) as f64,
                    bounds.height as f64 / l0_h.max(1) as f64,
                );
                let dims = native_dimensions
                    .iter()
                    .map(|&(w, h)| {
                        (
                            (w as f64 * scale.0).ceil() as u32,
                            (h as f64 * scale.1).ceil() as u32,
                        )
                    })
                    .collect();
                ((bounds.x, bounds.y), dims)
            }
            None => ((0, 0), native_dimensions),
        };

        // Halve down to 1x1, then flip so level 0 is the smallest
        let mut z_size = l_dimensions.first().copied().unwrap_or((0, 0));
        let mut z_dimensions = vec![z_size];
        while z_size.0 > 1 || z_size.1 > 1 {
            z_size = (z_size.0.div_ceil(2).max(1), z_size.1.div_ceil(2).max(1));
            z_dimensions.push(z_size);
        }
        z_dimensions.reverse();

        let tile_size = options.tile_size.max(1);
        let t_dimensions = z_dimensions
            .iter()
            .map(|&(w, h)| (w.div_ceil(tile_size), h.div_ceil(tile_size)))
            .collect();

        let dz_levels = z_dimensions.len();
        let l0_z_downsamples: Vec<f64> = (0..dz_levels)
            .map(|z| 2f64.powi((dz_levels - z - 1) as i32))
            .collect();
        let slide_from_dz_level: Vec<usize> = l0_z_downsamples
            .iter()
            .map(|&d| source.best_level_for_downsample(d))
            .collect();
        let l_z_downsamples = l0_z_downsamples
            .iter()
            .zip(&slide_from_dz_level)
            .map(|(&d, &level)| d / l0_l_downsamples.get(level).copied().unwrap_or(1.0))
            .collect();

        let (width, height) = z_dimensions.last().copied().unwrap_or((0, 0));
        debug!(dz_levels, native_levels, width, height, "deep zoom pyramid");

        DeepZoomGenerator {
            source,
            options,
            l0_offset,
            l_dimensions,
            z_dimensions,
            t_dimensions,
            slide_from_dz_level,
            l0_l_downsamples,
            l_z_downsamples,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn options(&self) -> DeepZoomOptions {
        self.options
    }

    /// Total number of tiles across all levels.
    pub fn tile_count(&self) -> u64 {
        self.t_dimensions
            .iter()
            .map(|&(c, r)| c as u64 * r as u64)
            .sum()
    }

    /// Work out which region of which native level makes up a tile.
    pub fn tile_region(&self, level: usize, column: u32, row: u32) -> Result<TileRegion, TileError> {
        let (columns, rows) =
            self.t_dimensions
                .get(level)
                .copied()
                .ok_or(TileError::InvalidLevel {
                    level,
                    level_count: self.z_dimensions.len(),
                })?;
        if column >= columns || row >= rows {
            return Err(TileError::InvalidAddress {
                level,
                col: column,
                row,
                cols: columns,
                rows,
            });
        }

        let slide_level = self.slide_from_dz_level[level];
        let l_z_downsample = self.l_z_downsamples[level];
        let l0_l_downsample = self.l0_l_downsamples.get(slide_level).copied().unwrap_or(1.0);
        let l_dims = self.l_dimensions.get(slide_level).copied().unwrap_or((0, 0));
        let z_dims = self.z_dimensions[level];
        let tile_size = self.options.tile_size;
        let overlap = self.options.overlap;

        let axis = |t: u32, t_lim: u32, z_lim: u32, l_lim: u32, offset: i64| {
            let overlap_tl = if t != 0 { overlap } else { 0 };
            let overlap_br = if t != t_lim - 1 { overlap } else { 0 };
            let z_size = tile_size.min(z_lim - tile_size * t) + overlap_tl + overlap_br;

            let z_location = (tile_size * t - overlap_tl) as f64;
            let l_location = l_z_downsample * z_location;
            let l0_location = (l0_l_downsample * l_location + offset as f64).floor() as i64;

            let l_size = (l_z_downsample * z_size as f64)
                .ceil()
                .min(l_lim as f64 - l_location.ceil())
                .max(1.0) as u32;

            (l0_location, l_size, z_size)
        };

        let (x, w, z_w) = axis(column, columns, z_dims.0, l_dims.0, self.l0_offset.0);
        let (y, h, z_h) = axis(row, rows, z_dims.1, l_dims.1, self.l0_offset.1);

        Ok(TileRegion {
            location: (x, y),
            slide_level,
            size: (w, h),
            output_size: (z_w, z_h),
        })
    }
}

#[async_trait]
impl<S: RegionSource> TileSource for DeepZoomGenerator<S> {
    fn level_count(&self) -> usize {
        self.z_dimensions.len()
    }

    fn level_tile_grid(&self, level: usize) -> Option<(u32, u32)> {
        self.t_dimensions.get(level).copied()
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.z_dimensions.get(level).copied()
    }

    async fn get_tile(&self, level: usize, column: u32, row: u32) -> Result<RgbImage, TileError> {
        let region = self.tile_region(level, column, row)?;
        let tile = self
            .source
            .read_region(region.location, region.slide_level, region.size)
            .await?;

        if tile.dimensions() == region.output_size {
            return Ok(tile);
        }
        let (width, height) = region.output_size;
        run_blocking(move || {
            Ok(imageops::resize(&tile, width, height, FilterType::Lanczos3))
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================
