//! Aperio SVS reader.
//!
//! SVS files are TIFFs whose tiled IFDs form the pyramid, interleaved with a
//! stripped thumbnail, label and macro image. Tiles are abbreviated JPEG
//! streams sharing one `JPEGTables` per level.
//!
//! The first IFD's ImageDescription carries the scanner metadata:
//!
//! ```text
//! Aperio Image Library v12.0.15
//! 46920x33600 (256x256) JPEG/RGB Q=70|AppMag = 20|MPP = 0.499|...
//! ```
//!
//! The first `|`-separated segment is a free-form header; the rest are
//! `key = value` pairs.

use std::collections::{BTreeMap, HashMap};

use crate::error::TiffError;
use crate::io::RangeReader;
use crate::slide::{base_properties, SlideReader};

use super::detect::SlideFormat;
use super::tiff::{LevelData, TiffHeader, TiffPyramid};
use super::{load_pyramid, read_description};

// =============================================================================
// SVS Metadata
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct SvsMetadata {
    /// Microns per pixel
    pub mpp: Option<f64>,

    /// Objective magnification (AppMag)
    pub magnification: Option<f64>,

    pub vendor: Option<String>,

    pub image_description: Option<String>,

    /// Every `key = value` pair after the header segment
    pub properties: HashMap<String, String>,
}

impl SvsMetadata {
    pub fn parse(description: &str) -> Self {
        let mut metadata = SvsMetadata {
            image_description: Some(description.to_string()),
            ..Default::default()
        };

        if description.contains("Aperio") {
            metadata.vendor = Some("Aperio".to_string());
        }

        for part in description.split('|').skip(1) {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if key.is_empty() {
                continue;
            }

            match key {
                "MPP" => metadata.mpp = value.parse().ok(),
                "AppMag" => metadata.magnification = value.parse().ok(),
                _ => {}
            }
            metadata
                .properties
                .insert(key.to_string(), value.to_string());
        }

        metadata
    }

    /// `aperio.*` properties plus the standard resolution ones.
    fn extend_properties(&self, properties: &mut BTreeMap<String, String>) {
        for (key, value) in &self.properties {
            properties.insert(format!("aperio.{}", key), value.clone());
        }
        if let Some(mpp) = self.mpp {
            properties.insert("openslide.mpp-x".to_string(), mpp.to_string());
            properties.insert("openslide.mpp-y".to_string(), mpp.to_string());
        }
        if let Some(magnification) = self.magnification {
            properties.insert(
                "openslide.objective-power".to_string(),
                magnification.to_string(),
            );
        }
    }
}

// =============================================================================
// SVS Reader
// =============================================================================

#[derive(Debug)]
pub struct SvsReader {
    pyramid: TiffPyramid,
    levels: Vec<LevelData>,
    metadata: SvsMetadata,
    properties: BTreeMap<String, String>,
}

impl SvsReader {
    /// Parse the pyramid, reject undecodable levels, and load tile tables
    /// and metadata.
    pub async fn open<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let (pyramid, levels, _warnings) = load_pyramid(reader).await?;

        let description = read_description(reader, &pyramid).await?;
        let metadata = description
            .as_deref()
            .map(SvsMetadata::parse)
            .unwrap_or_default();

        let mut properties =
            base_properties(SlideFormat::AperioSvs.vendor(), &levels, description.as_deref());
        metadata.extend_properties(&mut properties);

        Ok(SvsReader {
            pyramid,
            levels,
            metadata,
            properties,
        })
    }

    pub fn header(&self) -> &TiffHeader {
        &self.pyramid.header
    }

    pub fn metadata(&self) -> &SvsMetadata {
        &self.metadata
    }

    /// Thumbnail, label, macro and other IFDs outside the pyramid.
    pub fn associated_image_count(&self) -> usize {
        self.pyramid.other_ifds.len()
    }
}

impl SlideReader for SvsReader {
    fn levels(&self) -> &[LevelData] {
        &self.levels
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

// =============================================================================
// Tests
// =============================================================================
