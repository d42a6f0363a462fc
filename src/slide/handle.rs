//! An opened slide: format-specific reader, cached I/O and decoded tiles.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::error::{FormatError, TiffError, TileError};
use crate::format::{detect_format, GenericTiffReader, SlideFormat, SvsReader};
use crate::io::{
    BlockCache, BlockCacheStats, LocalFileReader, RangeReader, DEFAULT_BLOCK_CACHE_CAPACITY,
    DEFAULT_BLOCK_SIZE,
};
use crate::tile::{
    run_blocking, JpegTileEncoder, TileCache, TileCacheKey, TileCacheStats,
    DEFAULT_TILE_CACHE_CAPACITY,
};

use super::reader::{LevelInfo, SlideReader};
use super::region::{blit_tile, RegionSource, SlideBounds, DEFAULT_BACKGROUND};

// =============================================================================
// Options
// =============================================================================

/// I/O and cache sizing for an opened slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideOptions {
    /// BlockCache block size in bytes
    pub block_size: usize,

    /// Blocks held by the BlockCache
    pub cache_blocks: usize,

    /// Decoded source tiles held in memory
    pub cache_tiles: usize,
}

impl Default for SlideOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_BLOCK_CACHE_CAPACITY,
            cache_tiles: DEFAULT_TILE_CACHE_CAPACITY,
        }
    }
}

// =============================================================================
// Slide
// =============================================================================

/// `SlideReader::read_tile` is generic over the byte source, so the readers
/// are held in an enum rather than behind a trait object.
enum SlideReaderInner {
    Svs(SvsReader),
    GenericTiff(GenericTiffReader),
}

impl SlideReaderInner {
    fn as_reader(&self) -> &dyn SlideLevels {
        match self {
            SlideReaderInner::Svs(r) => r,
            SlideReaderInner::GenericTiff(r) => r,
        }
    }
}

/// The object-safe half of `SlideReader`.
trait SlideLevels {
    fn info(&self, level: usize) -> Option<LevelInfo>;
    fn count(&self) -> usize;
    fn best_level(&self, downsample: f64) -> usize;
    fn props(&self) -> &BTreeMap<String, String>;
}

impl<T: SlideReader> SlideLevels for T {
    fn info(&self, level: usize) -> Option<LevelInfo> {
        self.level_info(level)
    }

    fn count(&self) -> usize {
        self.level_count()
    }

    fn best_level(&self, downsample: f64) -> usize {
        self.best_level_for_downsample(downsample)
    }

    fn props(&self) -> &BTreeMap<String, String> {
        self.properties()
    }
}

pub struct Slide<R: RangeReader + 'static> {
    format: SlideFormat,
    reader: BlockCache<R>,
    inner: SlideReaderInner,
    dimensions: (u32, u32),
    tiles: TileCache,
    decoder: JpegTileEncoder,
    background: Rgb<u8>,
}

impl Slide<LocalFileReader> {
    /// Open a slide file from disk.
    pub async fn open(path: impl AsRef<Path>, options: &SlideOptions) -> Result<Self, FormatError> {
        let reader = LocalFileReader::open(path).await?;
        Self::from_reader(reader, options).await
    }
}

impl<R: RangeReader + 'static> Slide<R> {
    /// Detect the format and parse the pyramid of an arbitrary byte source.
    pub async fn from_reader(reader: R, options: &SlideOptions) -> Result<Self, FormatError> {
        let reader = BlockCache::with_capacity(reader, options.block_size, options.cache_blocks);

        let format = detect_format(&reader).await?;
        debug!(slide = reader.identifier(), format = format.name(), "detected format");

        let inner = match format {
            SlideFormat::AperioSvs => SlideReaderInner::Svs(SvsReader::open(&reader).await?),
            SlideFormat::GenericTiff => {
                SlideReaderInner::GenericTiff(GenericTiffReader::open(&reader).await?)
            }
        };

        let dimensions = inner
            .as_reader()
            .info(0)
            .map(|info| (info.width, info.height))
            .ok_or(TiffError::NoPyramidLevels)?;

        info!(
            slide = reader.identifier(),
            format = format.name(),
            width = dimensions.0,
            height = dimensions.1,
            levels = inner.as_reader().count(),
            "opened slide"
        );

        Ok(Slide {
            format,
            reader,
            inner,
            dimensions,
            tiles: TileCache::with_capacity(options.cache_tiles),
            decoder: JpegTileEncoder::new(),
            background: DEFAULT_BACKGROUND,
        })
    }

    pub fn format(&self) -> SlideFormat {
        self.format
    }

    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    pub fn level_info(&self, level: usize) -> Option<LevelInfo> {
        self.inner.as_reader().info(level)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        self.inner.as_reader().props()
    }

    pub fn io_stats(&self) -> BlockCacheStats {
        self.reader.stats()
    }

    pub fn tile_stats(&self) -> TileCacheStats {
        self.tiles.stats()
    }

    /// Decoded native tile, None for tiles absent from a sparse file.
    async fn decoded_tile(
        &self,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Option<Arc<RgbImage>>, TileError> {
        let key = TileCacheKey::new(level, tile_x, tile_y);
        if let Some(tile) = self.tiles.get(&key).await {
            return Ok(Some(tile));
        }

        let jpeg = match &self.inner {
            SlideReaderInner::Svs(r) => r.read_tile(&self.reader, level, tile_x, tile_y).await?,
            SlideReaderInner::GenericTiff(r) => {
                r.read_tile(&self.reader, level, tile_x, tile_y).await?
            }
        };
        if jpeg.is_empty() {
            return Ok(None);
        }

        let decoder = self.decoder;
        let tile = Arc::new(run_blocking(move || decoder.decode(&jpeg)).await?);
        self.tiles.put(key, tile.clone()).await;
        Ok(Some(tile))
    }
}

#[async_trait]
impl<R: RangeReader + 'static> RegionSource for Slide<R> {
    fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    fn level_count(&self) -> usize {
        self.inner.as_reader().count()
    }

    fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.level_info(level).map(|info| (info.width, info.height))
    }

    fn level_downsample(&self, level: usize) -> Option<f64> {
        self.level_info(level).map(|info| info.downsample)
    }

    fn best_level_for_downsample(&self, downsample: f64) -> usize {
        self.inner.as_reader().best_level(downsample)
    }

    /// Neither Aperio nor generic TIFF files record a scanned area.
    fn bounds(&self) -> Option<SlideBounds> {
        None
    }

    fn background(&self) -> Rgb<u8> {
        self.background
    }

    async fn read_region(
        &self,
        location: (i64, i64),
        level: usize,
        size: (u32, u32),
    ) -> Result<RgbImage, TileError> {
        let info = self.level_info(level).ok_or(TileError::SlideLevel(level))?;
        let mut out = RgbImage::from_pixel(size.0, size.1, self.background);
        if size.0 == 0 || size.1 == 0 {
            return Ok(out);
        }

        // Region origin in this level's pixels
        let origin = (
            (location.0 as f64 / info.downsample).floor() as i64,
            (location.1 as f64 / info.downsample).floor() as i64,
        );

        let x_start = origin.0.max(0);
        let y_start = origin.1.max(0);
        let x_end = (origin.0 + size.0 as i64).min(info.width as i64);
        let y_end = (origin.1 + size.1 as i64).min(info.height as i64);
        if x_start >= x_end || y_start >= y_end {
            return Ok(out);
        }

        let tw = info.tile_width as i64;
        let th = info.tile_height as i64;
        for tile_y in (y_start / th)..=((y_end - 1) / th) {
            for tile_x in (x_start / tw)..=((x_end - 1) / tw) {
                let (tile_x, tile_y) = (tile_x as u32, tile_y as u32);
                let Some(tile) = self.decoded_tile(level, tile_x, tile_y).await? else {
                    continue;
                };
                blit_tile(
                    &mut out,
                    origin,
                    &tile,
                    (tile_x as i64 * tw, tile_y as i64 * th),
                    (info.width, info.height),
                );
            }
        }

        Ok(out)
    }
}
