use std::path::PathBuf;

use thiserror::Error;

/// I/O errors that can occur when reading slide bytes
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(String),

    /// Any other failure from the operating system
    #[error("Read error: {0}")]
    Read(String),
}

/// Errors related to opening a slide (format detection and validation)
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    /// I/O error while reading the file
    #[error("{0}")]
    Io(#[from] IoError),

    /// TIFF parsing error
    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// File format is not supported
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

/// Errors that can occur when parsing TIFF files
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    /// I/O error while reading the file
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Invalid TIFF magic bytes (not II or MM)
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    /// Invalid TIFF version number
    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    /// Invalid BigTIFF offset byte size (must be 8)
    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    /// File is too small to contain a valid TIFF header
    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// Invalid IFD offset (points outside file or to invalid location)
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    /// Required tag is missing from IFD
    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    /// Tag has unexpected type or count
    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    /// Unsupported compression scheme
    #[error("Unsupported compression: {0} (only JPEG is supported)")]
    UnsupportedCompression(String),

    /// File uses strips instead of tiles
    #[error("Unsupported organization: file uses strips instead of tiles")]
    StripOrganization,

    /// No IFD qualified as a pyramid level
    #[error("No tiled pyramid levels found")]
    NoPyramidLevels,

    /// Unknown field type in IFD entry
    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// Errors raised while producing Deep Zoom tiles
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Deep Zoom level outside `[0, level_count)`
    #[error("Invalid level {level}: pyramid has {level_count} levels")]
    InvalidLevel { level: usize, level_count: usize },

    /// Tile address outside the level's grid
    #[error("Invalid address ({col}, {row}) for level {level}: grid is {cols}x{rows}")]
    InvalidAddress {
        level: usize,
        col: u32,
        row: u32,
        cols: u32,
        rows: u32,
    },

    /// Native slide level that the reader does not have
    #[error("Slide level {0} does not exist")]
    SlideLevel(usize),

    /// Source tile could not be read from the slide
    #[error("Failed to read source tile: {0}")]
    Read(#[from] TiffError),

    /// Source tile bytes are not a decodable image
    #[error("Failed to decode source tile: {0}")]
    Decode(String),

    /// Output tile could not be encoded
    #[error("Failed to encode tile: {0}")]
    Encode(String),

    /// A blocking pixel task panicked or was cancelled
    #[error("Tile worker failed: {0}")]
    Worker(String),
}

/// Top-level conversion failure, printed after `ERROR: `
#[derive(Debug, Clone, Error)]
pub enum ConvertError {
    #[error("Failed to open slide {}: {source}", path.display())]
    SlideOpen { path: PathBuf, source: FormatError },

    #[error("Failed to write {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    #[error("Tile generation failed: {0}")]
    Generation(#[from] TileError),
}

impl ConvertError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        ConvertError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
