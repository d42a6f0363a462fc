//! Format-agnostic access to the native pyramid of a slide.
//!
//! [`SlideReader`] is implemented by [`crate::format::SvsReader`] and
//! [`crate::format::GenericTiffReader`]. Both expose their levels as
//! [`LevelData`], so geometry queries and tile reads come as provided
//! methods; a reader only supplies its levels and properties.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TiffError;
use crate::format::jpeg::prepare_tile_jpeg;
use crate::format::tiff::{best_level_for_downsample, LevelData};
use crate::io::RangeReader;

// =============================================================================
// Level Information
// =============================================================================

/// Snapshot of one native level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelInfo {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,

    /// Relative to level 0, which is 1.0
    pub downsample: f64,
}

// =============================================================================
// SlideReader Trait
// =============================================================================

#[async_trait]
pub trait SlideReader: Send + Sync {
    /// Native levels, 0 = full resolution.
    fn levels(&self) -> &[LevelData];

    /// Slide properties keyed the way OpenSlide names them
    /// (`openslide.vendor`, `aperio.AppMag`, `tiff.ImageDescription`, ...).
    fn properties(&self) -> &BTreeMap<String, String>;

    fn level_count(&self) -> usize {
        self.levels().len()
    }

    /// Level 0 size, None for an empty pyramid.
    fn dimensions(&self) -> Option<(u32, u32)> {
        self.level_dimensions(0)
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.levels()
            .get(level)
            .map(|l| (l.level.width, l.level.height))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.levels().get(level).map(|l| l.level.downsample)
    }

    fn tile_size(&self, level: usize) -> Option<(u32, u32)> {
        self.levels()
            .get(level)
            .map(|l| (l.level.tile_width, l.level.tile_height))
    }

    fn tile_count(&self, level: usize) -> Option<(u32, u32)> {
        self.levels()
            .get(level)
            .map(|l| (l.level.tiles_x, l.level.tiles_y))
    }

    fn level_info(&self, level: usize) -> Option<LevelInfo> {
        let (width, height) = self.level_dimensions(level)?;
        let (tile_width, tile_height) = self.tile_size(level)?;
        let (tiles_x, tiles_y) = self.tile_count(level)?;
        let downsample = self.level_downsample(level)?;

        Some(LevelInfo {
            width,
            height,
            tile_width,
            tile_height,
            tiles_x,
            tiles_y,
            downsample,
        })
    }

    /// Lowest-resolution level whose downsample does not exceed `downsample`.
    fn best_level_for_downsample(&self, downsample: f64) -> usize {
        let downsamples: Vec<f64> = self.levels().iter().map(|l| l.level.downsample).collect();
        best_level_for_downsample(&downsamples, downsample)
    }

    /// Read a native tile as a self-contained JPEG stream.
    ///
    /// Shared JPEGTables are merged in and RGB tiles get their colour space
    /// pinned. Tiles absent from a sparse file come back empty.
    async fn read_tile<R: RangeReader>(
        &self,
        reader: &R,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError> {
        let level_data = self
            .levels()
            .get(level)
            .ok_or_else(|| TiffError::InvalidTagValue {
                tag: "level",
                message: format!("level {} out of range ({} levels)", level, self.level_count()),
            })?;

        let raw = level_data.read_raw_tile(reader, tile_x, tile_y).await?;
        if raw.is_empty() {
            return Ok(raw);
        }

        let tables = level_data.jpeg_tables().map(|t| t.as_ref());
        Ok(prepare_tile_jpeg(tables, &raw, level_data.level.is_rgb()))
    }
}

// =============================================================================
// Properties
// =============================================================================

/// Vendor, per-level geometry and the raw ImageDescription, the properties
/// every reader reports.
pub fn base_properties(
    vendor: &str,
    levels: &[LevelData],
    description: Option<&str>,
) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    properties.insert("openslide.vendor".to_string(), vendor.to_string());
    properties.insert("openslide.level-count".to_string(), levels.len().to_string());

    for (i, data) in levels.iter().enumerate() {
        let level = &data.level;
        let prefix = format!("openslide.level[{}]", i);
        properties.insert(format!("{}.width", prefix), level.width.to_string());
        properties.insert(format!("{}.height", prefix), level.height.to_string());
        properties.insert(format!("{}.downsample", prefix), level.downsample.to_string());
        properties.insert(format!("{}.tile-width", prefix), level.tile_width.to_string());
        properties.insert(format!("{}.tile-height", prefix), level.tile_height.to_string());
    }

    if let Some(description) = description {
        properties.insert("tiff.ImageDescription".to_string(), description.to_string());
    }

    properties
}

// =============================================================================
// Tests
// =============================================================================
