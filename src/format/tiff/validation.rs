//! Checks run when a slide is opened, so that unreadable files fail up front
//! instead of halfway through tile generation.

use crate::error::TiffError;

use super::pyramid::{PyramidLevel, TiffPyramid};
use super::tags::Compression;

/// Outcome of validating a pyramid: errors make it unusable, warnings are
/// only logged.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// The first error, if any.
    pub fn into_result(self) -> Result<(), TiffError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Only stripped images were found
    StripOrganization,

    UnsupportedCompression { level: usize, compression: u16 },

    NoPyramidLevels,
}

impl From<ValidationError> for TiffError {
    fn from(error: ValidationError) -> Self {
        match error {
            ValidationError::StripOrganization => TiffError::StripOrganization,
            ValidationError::UnsupportedCompression { compression, .. } => {
                TiffError::UnsupportedCompression(Compression::describe(compression))
            }
            ValidationError::NoPyramidLevels => TiffError::NoPyramidLevels,
        }
    }
}

/// Check a single level.
pub fn validate_level(level: &PyramidLevel) -> ValidationResult {
    let mut result = ValidationResult::default();

    let supported = Compression::from_u16(level.compression)
        .map(Compression::is_supported)
        .unwrap_or(false);
    if !supported {
        result.errors.push(ValidationError::UnsupportedCompression {
            level: level.level_index,
            compression: level.compression,
        });
    }

    if level.tile_width % 16 != 0 || level.tile_height % 16 != 0 {
        result.warnings.push(format!(
            "level {}: tile size {}x{} is not a multiple of 16",
            level.level_index, level.tile_width, level.tile_height
        ));
    }

    result
}

/// Check that a pyramid has at least one level and that every level can be
/// decoded.
pub fn validate_pyramid(pyramid: &TiffPyramid) -> ValidationResult {
    let mut result = ValidationResult::default();

    if pyramid.levels.is_empty() {
        let byte_order = pyramid.header.byte_order;
        let has_image = pyramid.other_ifds.iter().any(|(_, ifd)| {
            ifd.is_stripped() && ifd.image_width(byte_order).is_some()
        });
        result.errors.push(if has_image {
            ValidationError::StripOrganization
        } else {
            ValidationError::NoPyramidLevels
        });
        return result;
    }

    for level in &pyramid.levels {
        let level_result = validate_level(level);
        result.errors.extend(level_result.errors);
        result.warnings.extend(level_result.warnings);
    }

    result
}
