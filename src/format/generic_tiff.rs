//! Generic pyramidal TIFF reader.
//!
//! Accepts tiled, JPEG-compressed TIFFs with one or more resolution levels.
//! Strip-organized files and other compressions (LZW, Deflate, JPEG 2000)
//! are rejected when the file is opened.

use std::collections::BTreeMap;

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::slide::{base_properties, SlideReader};

use super::detect::SlideFormat;
use super::tiff::{LevelData, TiffHeader, TiffPyramid};
use super::{load_pyramid, read_description};

#[derive(Debug)]
pub struct GenericTiffReader {
    pyramid: TiffPyramid,
    levels: Vec<LevelData>,

    /// Non-fatal validation findings
    warnings: Vec<String>,

    properties: BTreeMap<String, String>,
}

impl GenericTiffReader {
    pub async fn open<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let (pyramid, levels, warnings) = load_pyramid(reader).await?;
        let description = read_description(reader, &pyramid).await?;
        let properties = base_properties(
            SlideFormat::GenericTiff.vendor(),
            &levels,
            description.as_deref(),
        );

        Ok(GenericTiffReader {
            pyramid,
            levels,
            warnings,
            properties,
        })
    }

    pub fn header(&self) -> &TiffHeader {
        &self.pyramid.header
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

impl SlideReader for GenericTiffReader {
    fn levels(&self) -> &[LevelData] {
        &self.levels
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}
