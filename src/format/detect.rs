//! Slide format detection.
//!
//! Only TIFF containers are readable. Among them, Aperio files are told apart
//! by the "Aperio" marker in the first IFD's ImageDescription; everything
//! else tiled is treated as a generic pyramidal TIFF.

use crate::error::FormatError;
use crate::io::RangeReader;

use super::tiff::{
    ByteOrder, Ifd, TiffHeader, TiffTag, ValueReader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE,
};

// =============================================================================
// SlideFormat
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    /// Aperio SVS: JPEG tiles with shared JPEGTables and key=value metadata
    AperioSvs,

    /// Any other tiled, JPEG-compressed pyramidal TIFF
    GenericTiff,
}

impl SlideFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic Pyramidal TIFF",
        }
    }

    /// Vendor string in the slide properties, as OpenSlide names them.
    pub const fn vendor(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "aperio",
            SlideFormat::GenericTiff => "generic-tiff",
        }
    }
}

// =============================================================================
// Format Detection
// =============================================================================

const APERIO_MARKER: &[u8] = b"Aperio";

/// Identify the format of a slide file.
///
/// Fails with `UnsupportedFormat` when the file is not a TIFF at all, and
/// with a TIFF error when the header or first IFD is corrupt.
pub async fn detect_format<R: RangeReader>(reader: &R) -> Result<SlideFormat, FormatError> {
    let header_len = (BIGTIFF_HEADER_SIZE as u64).min(reader.size()) as usize;
    let header_bytes = reader.read_exact_at(0, header_len).await?;

    if !is_tiff_header(&header_bytes) {
        return Err(FormatError::UnsupportedFormat {
            reason: format!("{} is not a TIFF file", reader.identifier()),
        });
    }
    let header = TiffHeader::parse(&header_bytes, reader.size())?;

    let count_bytes = reader
        .read_exact_at(header.first_ifd_offset, header.ifd_count_size())
        .await?;
    let ifd_size = Ifd::calculate_size(header.read_entry_count(&count_bytes), &header);
    let ifd_bytes = reader.read_exact_at(header.first_ifd_offset, ifd_size).await?;
    let ifd = Ifd::parse(&ifd_bytes, &header)?;

    let description = match ifd.get_entry_by_tag(TiffTag::ImageDescription) {
        Some(entry) => ValueReader::new(reader, &header).read_bytes(entry).await?,
        None => return Ok(SlideFormat::GenericTiff),
    };

    if contains_aperio_marker(&description) {
        Ok(SlideFormat::AperioSvs)
    } else {
        Ok(SlideFormat::GenericTiff)
    }
}

fn contains_aperio_marker(data: &[u8]) -> bool {
    data.windows(APERIO_MARKER.len())
        .any(|window| window == APERIO_MARKER)
}

/// Quick magic and version check, no IFD validation.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    if bytes.len() < TIFF_HEADER_SIZE {
        return false;
    }

    let byte_order = match &bytes[0..2] {
        b"II" => ByteOrder::LittleEndian,
        b"MM" => ByteOrder::BigEndian,
        _ => return false,
    };

    matches!(byte_order.read_u16(&bytes[2..4]), 42 | 43)
}

// =============================================================================
// Tests
// =============================================================================
