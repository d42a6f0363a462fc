//! Slide file formats.
//!
//! Both supported formats are TIFF containers, so they share the parser in
//! [`tiff`] and differ in metadata handling only:
//!
//! - **Aperio SVS**: identified by the "Aperio" marker in ImageDescription
//! - **Generic Pyramidal TIFF**: any other tiled, JPEG-compressed TIFF

pub mod detect;
pub mod generic_tiff;
pub mod jpeg;
pub mod svs;
pub mod tiff;

pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use generic_tiff::GenericTiffReader;
pub use svs::{SvsMetadata, SvsReader};

use tracing::warn;

use crate::error::TiffError;
use crate::io::RangeReader;

use tiff::{validate_pyramid, LevelData, TiffPyramid, TiffTag, ValueReader};

/// Parse, validate and load the tile tables of a pyramid.
///
/// Validation warnings are logged and returned; the first validation error
/// aborts the open.
pub(crate) async fn load_pyramid<R: RangeReader>(
    reader: &R,
) -> Result<(TiffPyramid, Vec<LevelData>, Vec<String>), TiffError> {
    let pyramid = TiffPyramid::parse(reader).await?;

    let validation = validate_pyramid(&pyramid);
    for warning in &validation.warnings {
        warn!(slide = reader.identifier(), "{}", warning);
    }
    let warnings = validation.warnings.clone();
    validation.into_result()?;

    let levels = LevelData::load_all(reader, &pyramid).await?;
    Ok((pyramid, levels, warnings))
}

/// ImageDescription of the full-resolution level, if present.
pub(crate) async fn read_description<R: RangeReader>(
    reader: &R,
    pyramid: &TiffPyramid,
) -> Result<Option<String>, TiffError> {
    let entry = match pyramid
        .base_level()
        .and_then(|level| level.ifd.get_entry_by_tag(TiffTag::ImageDescription))
    {
        Some(entry) => entry,
        None => return Ok(None),
    };

    let description = ValueReader::new(reader, &pyramid.header)
        .read_string(entry)
        .await?;
    Ok(Some(description))
}
