//! Test utilities for integration tests.
//!
//! Builds small pyramidal TIFF files with real JPEG tiles so the full
//! open / tile / write path runs against bytes shaped like scanner output.

use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};

// =============================================================================
// JPEG Helpers
// =============================================================================

/// Encode a solid-colour RGB tile.
pub fn solid_jpeg(width: u32, height: u32, color: Rgb<u8>) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, color);
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 95);
    encoder.encode_image(&img).unwrap();
    buf
}

/// Split a complete JPEG into a `JPEGTables` stream (SOI, DQT/DHT, EOI) and
/// an abbreviated tile holding everything else.
pub fn split_jpeg_tables(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);
    let mut tables = vec![0xFF, 0xD8];
    let mut tile = vec![0xFF, 0xD8];

    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        let code = jpeg[pos + 1];
        if code == 0xDA {
            tile.extend_from_slice(&jpeg[pos..]);
            break;
        }
        let length = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let segment = &jpeg[pos..pos + 2 + length];
        if code == 0xDB || code == 0xC4 {
            tables.extend_from_slice(segment);
        } else {
            tile.extend_from_slice(segment);
        }
        pos += 2 + length;
    }

    tables.extend_from_slice(&[0xFF, 0xD9]);
    (tables, tile)
}

// =============================================================================
// Slide Builder
// =============================================================================

/// One pyramid level: every tile is the same solid colour.
#[derive(Debug, Clone, Copy)]
pub struct LevelLayout {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub color: Rgb<u8>,
}

impl LevelLayout {
    pub fn new(width: u32, height: u32, tile_size: u32, color: Rgb<u8>) -> Self {
        Self {
            width,
            height,
            tile_size,
            color,
        }
    }

    pub fn tile_count(&self) -> u32 {
        self.width.div_ceil(self.tile_size) * self.height.div_ceil(self.tile_size)
    }
}

/// Builder for little-endian classic TIFF slides with JPEG tiles.
pub struct SlideBuilder {
    levels: Vec<LevelLayout>,
    description: Option<String>,
    jpeg_tables: bool,
    photometric: u16,
}

impl SlideBuilder {
    pub fn new() -> Self {
        Self {
            levels: Vec::new(),
            description: None,
            jpeg_tables: false,
            photometric: 6,
        }
    }

    pub fn level(mut self, level: LevelLayout) -> Self {
        self.levels.push(level);
        self
    }

    /// ImageDescription of the first IFD.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Store DQT/DHT once per level in `JPEGTables`.
    pub fn with_jpeg_tables(mut self) -> Self {
        self.jpeg_tables = true;
        self
    }

    pub fn photometric(mut self, photometric: u16) -> Self {
        self.photometric = photometric;
        self
    }

    /// Aperio-style 1000x800 slide with levels at downsample 1 and 4.
    pub fn aperio() -> Self {
        Self::new()
            .description(
                "Aperio Image Library v12.0.15\r\n1000x800 [0,0 1000x800] (256x256) JPEG/RGB Q=70\
                 |AppMag = 20|MPP = 0.4990|ScanScope ID = SS1234",
            )
            .with_jpeg_tables()
            .level(LevelLayout::new(1000, 800, 256, Rgb([200, 40, 40])))
            .level(LevelLayout::new(250, 200, 256, Rgb([200, 40, 40])))
    }

    /// Generic two-level pyramidal TIFF, 600x400 and 150x100.
    pub fn generic() -> Self {
        Self::new()
            .description("pyramid written by a test")
            .level(LevelLayout::new(600, 400, 128, Rgb([30, 90, 200])))
            .level(LevelLayout::new(150, 100, 128, Rgb([30, 90, 200])))
    }

    pub fn build(self) -> Vec<u8> {
        let mut data = b"II\x2A\x00\x00\x00\x00\x00".to_vec();

        let description_offset = self.description.as_ref().map(|text| {
            let offset = data.len() as u32;
            data.extend_from_slice(text.as_bytes());
            data.push(0);
            offset
        });

        struct Blobs {
            tile_offset: u32,
            tile_len: u32,
            offsets_at: u32,
            counts_at: u32,
            tables: Option<(u32, u32)>,
        }

        let mut blobs = Vec::new();
        for level in &self.levels {
            let jpeg = solid_jpeg(level.tile_size, level.tile_size, level.color);
            let (tables, tile) = if self.jpeg_tables {
                let (tables, tile) = split_jpeg_tables(&jpeg);
                (Some(tables), tile)
            } else {
                (None, jpeg)
            };

            let tile_offset = data.len() as u32;
            data.extend_from_slice(&tile);
            let count = level.tile_count();

            let offsets_at = data.len() as u32;
            for _ in 0..count {
                data.extend_from_slice(&tile_offset.to_le_bytes());
            }
            let counts_at = data.len() as u32;
            for _ in 0..count {
                data.extend_from_slice(&(tile.len() as u32).to_le_bytes());
            }

            let tables = tables.map(|t| {
                let at = data.len() as u32;
                data.extend_from_slice(&t);
                (at, t.len() as u32)
            });

            blobs.push(Blobs {
                tile_offset,
                tile_len: tile.len() as u32,
                offsets_at,
                counts_at,
                tables,
            });
        }

        let mut next_pointer_at = 4usize;
        for (index, (level, blob)) in self.levels.iter().zip(&blobs).enumerate() {
            if data.len() % 2 == 1 {
                data.push(0);
            }
            let ifd_offset = data.len() as u32;
            data[next_pointer_at..next_pointer_at + 4].copy_from_slice(&ifd_offset.to_le_bytes());

            let count = level.tile_count();
            let mut entries: Vec<(u16, u16, u32, u32)> = vec![
                (256, 4, 1, level.width),
                (257, 4, 1, level.height),
                (258, 3, 1, 8),
                (259, 3, 1, 7),
                (262, 3, 1, self.photometric as u32),
                (277, 3, 1, 3),
                (322, 3, 1, level.tile_size),
                (323, 3, 1, level.tile_size),
            ];
            if count == 1 {
                entries.push((324, 4, 1, blob.tile_offset));
                entries.push((325, 4, 1, blob.tile_len));
            } else {
                entries.push((324, 4, count, blob.offsets_at));
                entries.push((325, 4, count, blob.counts_at));
            }
            if index == 0 {
                if let (Some(text), Some(offset)) = (&self.description, description_offset) {
                    entries.push((270, 2, text.len() as u32 + 1, offset));
                }
            }
            if let Some((at, len)) = blob.tables {
                entries.push((347, 7, len, at));
            }
            entries.sort_by_key(|e| e.0);

            data.extend_from_slice(&(entries.len() as u16).to_le_bytes());
            for (tag, field_type, count, value) in entries {
                data.extend_from_slice(&tag.to_le_bytes());
                data.extend_from_slice(&field_type.to_le_bytes());
                data.extend_from_slice(&count.to_le_bytes());
                if field_type == 3 && count == 1 {
                    data.extend_from_slice(&(value as u16).to_le_bytes());
                    data.extend_from_slice(&[0, 0]);
                } else {
                    data.extend_from_slice(&value.to_le_bytes());
                }
            }
            next_pointer_at = data.len();
            data.extend_from_slice(&0u32.to_le_bytes());
        }

        data
    }

    /// Build and write to `dir/name`.
    pub fn write_to(self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

impl Default for SlideBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Deep Zoom Expectations
// =============================================================================

/// Deep Zoom level sizes for a `width` x `height` image, smallest first.
pub fn expected_dz_levels(width: u32, height: u32) -> Vec<(u32, u32)> {
    let mut levels = vec![(width, height)];
    let (mut w, mut h) = (width, height);
    while w > 1 || h > 1 {
        w = w.div_ceil(2).max(1);
        h = h.div_ceil(2).max(1);
        levels.push((w, h));
    }
    levels.reverse();
    levels
}

/// 254px tile grid for a level size.
pub fn expected_grid((width, height): (u32, u32)) -> (u32, u32) {
    (width.div_ceil(254), height.div_ceil(254))
}

/// Every file under `root`, relative and sorted.
pub fn list_tree(root: &Path) -> Vec<PathBuf> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                out.push(path.strip_prefix(root).unwrap().to_path_buf());
            }
        }
    }

    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}
