//! TIFF parser for Whole Slide Images.
//!
//! Classic TIFF and BigTIFF in either byte order. WSI files hold several
//! IFDs: the pyramid levels plus thumbnail, label and macro images. Small
//! tag values are stored inline in their IFD entry; larger ones (tile offset
//! arrays, JPEG tables, descriptions) live at an offset.

mod parser;
mod pyramid;
mod tags;
mod validation;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{best_level_for_downsample, LevelData, PyramidLevel, TiffPyramid, TileData};
pub use tags::{Compression, FieldType, TiffTag};
pub use validation::{validate_level, validate_pyramid, ValidationError, ValidationResult};
pub use values::{parse_u64_array, ValueReader};
