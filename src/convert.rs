//! Slide to Deep Zoom conversion.
//!
//! Opens the slide, builds the Deep Zoom pyramid over it, and writes every
//! tile followed by the descriptor. Steps run strictly one after another.
//! Progress goes to a [`ConvertObserver`]: the CLI prints it to stdout, the
//! upload service logs it.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::dzi::{DeepZoomGenerator, DziWriter, TileSource};
use crate::error::ConvertError;
use crate::slide::{RegionSource, Slide, SlideOptions};

// =============================================================================
// Progress reporting
// =============================================================================

/// Progress callbacks, in the order they fire.
pub trait ConvertObserver: Send + Sync {
    fn opening(&self, _input: &Path) {}

    /// Level-0 size and native level count of the opened slide.
    fn opened(&self, _dimensions: (u32, u32), _native_levels: usize) {}

    /// Deep Zoom level count, before any tile is written.
    fn generating(&self, _level_count: usize) {}

    fn level_written(&self, _level: usize, _columns: u32, _rows: u32) {}

    fn finished(&self, _dzi_path: &Path) {}
}

/// Prints progress to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleObserver;

impl ConvertObserver for ConsoleObserver {
    fn opening(&self, input: &Path) {
        println!("Opening slide: {}", input.display());
    }

    fn opened(&self, dimensions: (u32, u32), native_levels: usize) {
        println!("Slide dimensions: ({}, {})", dimensions.0, dimensions.1);
        println!("Levels: {}", native_levels);
    }

    fn generating(&self, level_count: usize) {
        println!("Generating tiles for {} levels...", level_count);
    }

    fn level_written(&self, level: usize, columns: u32, rows: u32) {
        println!("  Level {}: {}x{} tiles", level, columns, rows);
    }

    fn finished(&self, dzi_path: &Path) {
        println!("SUCCESS: Created {}", dzi_path.display());
    }
}

/// Logs progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ConvertObserver for TracingObserver {
    fn opening(&self, input: &Path) {
        info!(input = %input.display(), "opening slide");
    }

    fn opened(&self, dimensions: (u32, u32), native_levels: usize) {
        info!(
            width = dimensions.0,
            height = dimensions.1,
            native_levels,
            "slide opened"
        );
    }

    fn generating(&self, level_count: usize) {
        info!(level_count, "generating tiles");
    }

    fn finished(&self, dzi_path: &Path) {
        info!(dzi = %dzi_path.display(), "conversion complete");
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// What a finished conversion produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSummary {
    pub dzi_path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub level_count: usize,
    pub tile_count: u64,
}

/// Convert `input` into `<output_dir>/<output_name>.dzi` and
/// `<output_dir>/<output_name>_files/`.
///
/// The slide is opened before anything is created on disk, so an unreadable
/// input leaves the filesystem untouched.
pub async fn convert(
    input: &Path,
    output_dir: &Path,
    output_name: &str,
    options: &SlideOptions,
    observer: &dyn ConvertObserver,
) -> Result<ConvertSummary, ConvertError> {
    observer.opening(input);
    let slide = Slide::open(input, options)
        .await
        .map_err(|source| ConvertError::SlideOpen {
            path: input.to_path_buf(),
            source,
        })?;
    observer.opened(slide.dimensions(), slide.level_count());

    let generator = DeepZoomGenerator::new(slide);
    let level_count = generator.level_count();
    observer.generating(level_count);

    let writer = DziWriter::new(output_dir, output_name);
    let dzi_path = writer
        .write(&generator, |level, columns, rows| {
            observer.level_written(level, columns, rows)
        })
        .await?;
    observer.finished(&dzi_path);

    let (width, height) = level_count
        .checked_sub(1)
        .and_then(|last| generator.level_dimensions(last))
        .unwrap_or((0, 0));
    let slide = generator.source();
    info!(
        io_hits = slide.io_stats().hits,
        io_misses = slide.io_stats().misses,
        tile_hits = slide.tile_stats().hits,
        tile_misses = slide.tile_stats().misses,
        "cache usage"
    );

    Ok(ConvertSummary {
        dzi_path,
        width,
        height,
        level_count,
        tile_count: generator.tile_count(),
    })
}
