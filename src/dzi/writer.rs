//! Writes a Deep Zoom pyramid to disk.
//!
//! ```text
//! <output_dir>/
//!   <name>.dzi
//!   <name>_files/
//!     0/0_0.jpeg
//!     ...
//!     <level_count - 1>/<column>_<row>.jpeg
//! ```
//!
//! The descriptor is written last, so a run that fails partway leaves tiles
//! without a `.dzi`. Existing files are overwritten.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ConvertError;
use crate::tile::{run_blocking, JpegTileEncoder};

use super::descriptor::{DziDescriptor, TILE_FORMAT};
use super::generator::TileSource;

#[derive(Debug, Clone)]
pub struct DziWriter {
    output_dir: PathBuf,
    name: String,
    encoder: JpegTileEncoder,
}

impl DziWriter {
    pub fn new(output_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            name: name.into(),
            encoder: JpegTileEncoder::new(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn dzi_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.dzi", self.name))
    }

    pub fn files_dir(&self) -> PathBuf {
        self.output_dir.join(format!("{}_files", self.name))
    }

    pub fn tile_path(&self, level: usize, column: u32, row: u32) -> PathBuf {
        self.files_dir()
            .join(level.to_string())
            .join(format!("{}_{}.{}", column, row, TILE_FORMAT))
    }

    /// Write every tile of every level, then the descriptor.
    ///
    /// Tiles are fetched and written one at a time, columns outer and rows
    /// inner. `on_level` is called with `(level, columns, rows)` after each
    /// level is complete. Returns the descriptor path.
    pub async fn write<T, F>(&self, source: &T, mut on_level: F) -> Result<PathBuf, ConvertError>
    where
        T: TileSource,
        F: FnMut(usize, u32, u32) + Send,
    {
        create_dir_all(&self.output_dir).await?;
        create_dir_all(&self.files_dir()).await?;

        for level in 0..source.level_count() {
            let (columns, rows) = source.level_tile_grid(level).unwrap_or((0, 0));
            let level_dir = self.files_dir().join(level.to_string());
            create_dir_all(&level_dir).await?;

            for column in 0..columns {
                for row in 0..rows {
                    let tile = source.get_tile(level, column, row).await?;
                    let encoder = self.encoder;
                    let jpeg = run_blocking(move || encoder.encode(&tile)).await?;

                    let path = self.tile_path(level, column, row);
                    tokio::fs::write(&path, &jpeg)
                        .await
                        .map_err(|e| ConvertError::io(&path, e))?;
                }
            }

            debug!(level, columns, rows, "level written");
            on_level(level, columns, rows);
        }

        let last = source.level_count().saturating_sub(1);
        let (width, height) = source.level_dimensions(last).unwrap_or((0, 0));
        let dzi_path = self.dzi_path();
        tokio::fs::write(&dzi_path, DziDescriptor::new(width, height).to_xml())
            .await
            .map_err(|e| ConvertError::io(&dzi_path, e))?;

        Ok(dzi_path)
    }
}

async fn create_dir_all(path: &Path) -> Result<(), ConvertError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| ConvertError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};

    use crate::error::TileError;

    /// Two levels: 1x1 and 300x20 (a 2x1 grid).
    struct TwoLevels;

    #[async_trait]
    impl TileSource for TwoLevels {
        fn level_count(&self) -> usize {
            2
        }

        fn level_tile_grid(&self, level: usize) -> Option<(u32, u32)> {
            [(1, 1), (2, 1)].get(level).copied()
        }

        fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
            [(1, 1), (300, 20)].get(level).copied()
        }

        async fn get_tile(&self, level: usize, column: u32, _row: u32) -> Result<RgbImage, TileError> {
            let width = match (level, column) {
                (0, _) => 1,
                (_, 0) => 255,
                _ => 47,
            };
            Ok(RgbImage::from_pixel(width, if level == 0 { 1 } else { 20 }, Rgb([200, 10, 10])))
        }
    }

    struct Failing;

    #[async_trait]
    impl TileSource for Failing {
        fn level_count(&self) -> usize {
            1
        }

        fn level_tile_grid(&self, _level: usize) -> Option<(u32, u32)> {
            Some((1, 1))
        }

        fn level_dimensions(&self, _level: usize) -> Option<(u32, u32)> {
            Some((1, 1))
        }

        async fn get_tile(&self, level: usize, col: u32, row: u32) -> Result<RgbImage, TileError> {
            Err(TileError::InvalidAddress {
                level,
                col,
                row,
                cols: 0,
                rows: 0,
            })
        }
    }

    #[test]
    fn test_paths() {
        let writer = DziWriter::new("/out", "slide");
        assert_eq!(writer.dzi_path(), PathBuf::from("/out/slide.dzi"));
        assert_eq!(writer.files_dir(), PathBuf::from("/out/slide_files"));
        assert_eq!(
            writer.tile_path(12, 3, 7),
            PathBuf::from("/out/slide_files/12/3_7.jpeg")
        );
    }

    #[tokio::test]
    async fn test_writes_tree_and_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let writer = DziWriter::new(&out, "slide");

        let mut levels = Vec::new();
        let dzi = writer
            .write(&TwoLevels, |level, cols, rows| levels.push((level, cols, rows)))
            .await
            .unwrap();

        assert_eq!(dzi, out.join("slide.dzi"));
        assert_eq!(levels, vec![(0, 1, 1), (1, 2, 1)]);
        assert!(writer.tile_path(0, 0, 0).is_file());
        assert!(writer.tile_path(1, 0, 0).is_file());
        assert!(writer.tile_path(1, 1, 0).is_file());

        let tile = image::open(writer.tile_path(1, 1, 0)).unwrap();
        assert_eq!((tile.width(), tile.height()), (47, 20));

        let xml = std::fs::read_to_string(&dzi).unwrap();
        assert!(xml.contains("<Size Height=\"20\"\n    Width=\"300\" />"));
    }

    #[tokio::test]
    async fn test_failure_leaves_no_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let writer = DziWriter::new(dir.path(), "broken");

        let err = writer.write(&Failing, |_, _, _| {}).await.unwrap_err();

        assert!(matches!(err, ConvertError::Generation(_)));
        assert!(writer.files_dir().join("0").is_dir());
        assert!(!writer.dzi_path().exists());
    }

    #[tokio::test]
    async fn test_output_dir_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("taken");
        std::fs::write(&blocker, b"x").unwrap();

        let writer = DziWriter::new(&blocker, "slide");
        let err = writer.write(&TwoLevels, |_, _, _| {}).await.unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
    }
}
