//! Pyramid level identification.
//!
//! A slide TIFF holds more IFDs than pyramid levels: Aperio files carry a
//! stripped thumbnail, label and macro image between and after the tiled
//! levels. Levels are picked out as follows:
//!
//! 1. The IFD must be tiled and carry TileOffsets/TileByteCounts.
//! 2. Candidates are ordered by area; the largest is level 0.
//! 3. Each following candidate must keep level 0's aspect ratio and have a
//!    strictly larger downsample than the level before it.

use std::collections::HashSet;

use bytes::Bytes;
use tracing::debug;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::TiffTag;
use super::values::ValueReader;

// =============================================================================
// Constants
// =============================================================================

/// Maximum number of IFDs followed in one file
const MAX_IFDS: usize = 100;

/// Entry counts above this are treated as corruption
const MAX_IFD_ENTRIES: u64 = 4096;

/// Relative slack allowed between a level's height and the height implied by
/// its width downsample
const ASPECT_TOLERANCE: f64 = 0.02;

const PHOTOMETRIC_RGB: u16 = 2;

// =============================================================================
// PyramidLevel
// =============================================================================

/// One tiled resolution of the slide. Level 0 is full resolution.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    pub level_index: usize,

    /// Position of the IFD in the file's chain
    pub ifd_index: usize,

    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    pub tile_count: u32,

    /// Relative to level 0, average of the two axis ratios
    pub downsample: f64,

    /// Raw compression value (7 = JPEG)
    pub compression: u16,

    /// PhotometricInterpretation, None when the tag is absent
    pub photometric: Option<u16>,

    pub ifd: Ifd,
    pub tile_offsets_entry: Option<IfdEntry>,
    pub tile_byte_counts_entry: Option<IfdEntry>,
    pub jpeg_tables_entry: Option<IfdEntry>,
}

impl PyramidLevel {
    /// Build a level from a tiled IFD, None if the IFD lacks tile geometry.
    pub fn from_ifd(ifd: Ifd, ifd_index: usize, byte_order: ByteOrder) -> Option<Self> {
        let tile_width = ifd.tile_width(byte_order).filter(|&w| w > 0)?;
        let tile_height = ifd.tile_height(byte_order).filter(|&h| h > 0)?;
        let width = ifd.image_width(byte_order).filter(|&w| w > 0)?;
        let height = ifd.image_height(byte_order).filter(|&h| h > 0)?;

        let compression = ifd.compression(byte_order).unwrap_or(1);
        let photometric = ifd
            .get_u32(TiffTag::PhotometricInterpretation, byte_order)
            .map(|p| p as u16);

        let tiles_x = width.div_ceil(tile_width);
        let tiles_y = height.div_ceil(tile_height);

        let tile_offsets_entry = ifd.get_entry_by_tag(TiffTag::TileOffsets).cloned();
        let tile_byte_counts_entry = ifd.get_entry_by_tag(TiffTag::TileByteCounts).cloned();
        let jpeg_tables_entry = ifd.get_entry_by_tag(TiffTag::JpegTables).cloned();

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x,
            tiles_y,
            tile_count: tiles_x.saturating_mul(tiles_y),
            downsample: 1.0,
            compression,
            photometric,
            ifd,
            tile_offsets_entry,
            tile_byte_counts_entry,
            jpeg_tables_entry,
        })
    }

    /// JPEG tiles hold RGB rather than YCbCr components.
    pub fn is_rgb(&self) -> bool {
        self.photometric == Some(PHOTOMETRIC_RGB)
    }

    pub fn has_tile_data(&self) -> bool {
        self.tile_offsets_entry.is_some() && self.tile_byte_counts_entry.is_some()
    }

    /// Row-major index of a tile, None when out of the grid.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<u32> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y * self.tiles_x + tile_x)
    }

    /// Pixel size of the image content of a tile; edge tiles are clipped.
    pub fn tile_dimensions(&self, tile_x: u32, tile_y: u32) -> Option<(u32, u32)> {
        self.tile_index(tile_x, tile_y)?;
        let w = (self.width - tile_x * self.tile_width).min(self.tile_width);
        let h = (self.height - tile_y * self.tile_height).min(self.tile_height);
        Some((w, h))
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// The pyramid levels of a TIFF file plus the IFDs that are not levels.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,

    /// Sorted by resolution, 0 = highest
    pub levels: Vec<PyramidLevel>,

    /// Thumbnail, label, macro and anything else skipped
    pub other_ifds: Vec<(usize, Ifd)>,
}

impl TiffPyramid {
    /// Read the header, follow the IFD chain, and identify the levels.
    pub async fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
        let header_bytes = reader.read_exact_at(0, header_len).await?;
        let header = TiffHeader::parse(&header_bytes, reader.size())?;

        let ifds = Self::parse_all_ifds(reader, &header).await?;
        Ok(Self::build_pyramid(header, ifds))
    }

    /// Follow the next-IFD chain, stopping at 0, a loop, or MAX_IFDS.
    async fn parse_all_ifds<R: RangeReader>(
        reader: &R,
        header: &TiffHeader,
    ) -> Result<Vec<Ifd>, TiffError> {
        let mut ifds = Vec::new();
        let mut seen = HashSet::new();
        let mut offset = header.first_ifd_offset;

        while offset != 0 && ifds.len() < MAX_IFDS {
            if !seen.insert(offset) {
                debug!(offset, "IFD chain loops back, stopping");
                break;
            }
            if offset >= reader.size() {
                return Err(TiffError::InvalidIfdOffset(offset));
            }

            let count_bytes = reader.read_exact_at(offset, header.ifd_count_size()).await?;
            let entry_count = header.read_entry_count(&count_bytes);
            if entry_count > MAX_IFD_ENTRIES {
                return Err(TiffError::InvalidTagValue {
                    tag: "IFD",
                    message: format!("{} entries at offset {}", entry_count, offset),
                });
            }

            let ifd_size = Ifd::calculate_size(entry_count, header);
            let ifd_bytes = reader.read_exact_at(offset, ifd_size).await?;
            let ifd = Ifd::parse(&ifd_bytes, header)?;

            offset = ifd.next_ifd_offset;
            ifds.push(ifd);
        }

        Ok(ifds)
    }

    /// Split parsed IFDs into pyramid levels and other images.
    pub fn build_pyramid(header: TiffHeader, ifds: Vec<Ifd>) -> Self {
        let byte_order = header.byte_order;
        let mut candidates = Vec::new();
        let mut other_ifds = Vec::new();

        for (ifd_index, ifd) in ifds.into_iter().enumerate() {
            match PyramidLevel::from_ifd(ifd.clone(), ifd_index, byte_order) {
                Some(level) if level.has_tile_data() => candidates.push(level),
                _ => other_ifds.push((ifd_index, ifd)),
            }
        }

        // Largest first; ties keep file order
        candidates.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));

        let mut levels: Vec<PyramidLevel> = Vec::with_capacity(candidates.len());
        for mut level in candidates {
            let accepted = match levels.first() {
                None => true,
                Some(base) => {
                    level.downsample = downsample_between(base, &level);
                    let previous = levels.last().map(|l| l.downsample).unwrap_or(1.0);
                    level.downsample > previous && matches_base_aspect(base, &level)
                }
            };

            if accepted {
                level.level_index = levels.len();
                levels.push(level);
            } else {
                debug!(
                    ifd = level.ifd_index,
                    width = level.width,
                    height = level.height,
                    "tiled IFD is not part of the pyramid"
                );
                other_ifds.push((level.ifd_index, level.ifd));
            }
        }

        TiffPyramid {
            header,
            levels,
            other_ifds,
        }
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn get_level(&self, level: usize) -> Option<&PyramidLevel> {
        self.levels.get(level)
    }

    pub fn base_level(&self) -> Option<&PyramidLevel> {
        self.levels.first()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.base_level().map(|l| (l.width, l.height))
    }
}

fn downsample_between(base: &PyramidLevel, level: &PyramidLevel) -> f64 {
    let dx = base.width as f64 / level.width as f64;
    let dy = base.height as f64 / level.height as f64;
    (dx + dy) / 2.0
}

fn matches_base_aspect(base: &PyramidLevel, level: &PyramidLevel) -> bool {
    let dx = base.width as f64 / level.width as f64;
    let expected_height = base.height as f64 / dx;
    (expected_height - level.height as f64).abs() <= 1.0 + ASPECT_TOLERANCE * level.height as f64
}

/// Index of the lowest-resolution level whose downsample does not exceed
/// `downsample`; level 0 when even that one is too coarse.
pub fn best_level_for_downsample(downsamples: &[f64], downsample: f64) -> usize {
    downsamples
        .iter()
        .rposition(|&d| d <= downsample)
        .unwrap_or(0)
}

// =============================================================================
// Tile Data Loading
// =============================================================================

/// Tile locations and JPEG tables of one level.
#[derive(Debug, Clone)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    pub async fn load<R: RangeReader>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let offsets_entry = level
            .tile_offsets_entry
            .as_ref()
            .ok_or(TiffError::MissingTag("TileOffsets"))?;
        let counts_entry = level
            .tile_byte_counts_entry
            .as_ref()
            .ok_or(TiffError::MissingTag("TileByteCounts"))?;

        let offsets = values.read_u64_array(offsets_entry).await?;
        let byte_counts = values.read_u64_array(counts_entry).await?;

        if (offsets.len() as u64) < level.tile_count as u64
            || (byte_counts.len() as u64) < level.tile_count as u64
        {
            return Err(TiffError::InvalidTagValue {
                tag: "TileOffsets",
                message: format!(
                    "level {} needs {} tiles, file lists {} offsets and {} byte counts",
                    level.level_index,
                    level.tile_count,
                    offsets.len(),
                    byte_counts.len()
                ),
            });
        }

        let jpeg_tables = match level.jpeg_tables_entry {
            Some(ref entry) => Some(values.read_bytes(entry).await?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// `(offset, byte_count)` of a tile.
    pub fn get_tile_location(&self, tile_index: u32) -> Option<(u64, u64)> {
        let idx = tile_index as usize;
        Some((*self.offsets.get(idx)?, *self.byte_counts.get(idx)?))
    }
}

/// A pyramid level together with its loaded tile table.
#[derive(Debug, Clone)]
pub struct LevelData {
    pub level: PyramidLevel,
    pub tile_data: TileData,
}

impl LevelData {
    /// Load tile tables for every level of a pyramid.
    pub async fn load_all<R: RangeReader>(
        reader: &R,
        pyramid: &TiffPyramid,
    ) -> Result<Vec<Self>, TiffError> {
        let mut levels = Vec::with_capacity(pyramid.levels.len());
        for level in &pyramid.levels {
            let tile_data = TileData::load(reader, level, &pyramid.header).await?;
            levels.push(LevelData {
                level: level.clone(),
                tile_data,
            });
        }
        Ok(levels)
    }

    pub fn get_tile_location(&self, tile_x: u32, tile_y: u32) -> Option<(u64, u64)> {
        let tile_index = self.level.tile_index(tile_x, tile_y)?;
        self.tile_data.get_tile_location(tile_index)
    }

    pub fn jpeg_tables(&self) -> Option<&Bytes> {
        self.tile_data.jpeg_tables.as_ref()
    }

    /// Stored bytes of a tile. Sparse files mark absent tiles with a zero
    /// byte count; those come back empty.
    pub async fn read_raw_tile<R: RangeReader>(
        &self,
        reader: &R,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError> {
        let (offset, size) =
            self.get_tile_location(tile_x, tile_y)
                .ok_or_else(|| TiffError::InvalidTagValue {
                    tag: "TileOffsets",
                    message: format!(
                        "tile ({}, {}) out of range for level {}",
                        tile_x, tile_y, self.level.level_index
                    ),
                })?;

        if size == 0 {
            return Ok(Bytes::new());
        }

        let size = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
            tag: "TileByteCounts",
            message: format!("tile of {} bytes", size),
        })?;
        Ok(reader.read_exact_at(offset, size).await?)
    }
}

// =============================================================================
// Tests
// =============================================================================
