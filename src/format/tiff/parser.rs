//! TIFF header and IFD parsing.
//!
//! # Header layouts
//!
//! ```text
//! Classic TIFF (8 bytes)          BigTIFF (16 bytes)
//! 0-1  byte order (II / MM)       0-1   byte order
//! 2-3  version 42                 2-3   version 43
//! 4-7  first IFD offset (u32)     4-5   offset size (8)
//!                                 6-7   reserved
//!                                 8-15  first IFD offset (u64)
//! ```
//!
//! # IFD layout
//!
//! ```text
//! entry count (u16 / u64)
//! entries     (12 / 20 bytes each: tag u16, type u16, count u32/u64, value u32/u64)
//! next IFD    (u32 / u64, 0 terminates the chain)
//! ```

use std::collections::HashMap;

use crate::error::TiffError;
use crate::io::{read_u16_be, read_u16_le, read_u32_be, read_u32_le, read_u64_be, read_u64_le};

use super::tags::{FieldType, TiffTag};

// =============================================================================
// Constants
// =============================================================================

const BYTE_ORDER_LITTLE_ENDIAN: [u8; 2] = *b"II";
const BYTE_ORDER_BIG_ENDIAN: [u8; 2] = *b"MM";

const VERSION_TIFF: u16 = 42;
const VERSION_BIGTIFF: u16 = 43;

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Byte order declared by the first two bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II" (Intel)
    LittleEndian,
    /// "MM" (Motorola)
    BigEndian,
}

impl ByteOrder {
    #[inline]
    pub fn read_u16(self, bytes: &[u8]) -> u16 {
        match self {
            ByteOrder::LittleEndian => read_u16_le(bytes),
            ByteOrder::BigEndian => read_u16_be(bytes),
        }
    }

    #[inline]
    pub fn read_u32(self, bytes: &[u8]) -> u32 {
        match self {
            ByteOrder::LittleEndian => read_u32_le(bytes),
            ByteOrder::BigEndian => read_u32_be(bytes),
        }
    }

    #[inline]
    pub fn read_u64(self, bytes: &[u8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => read_u64_le(bytes),
            ByteOrder::BigEndian => read_u64_be(bytes),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed TIFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,

    /// 64-bit offsets and counts
    pub is_bigtiff: bool,

    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse the header from the first bytes of a file.
    ///
    /// `bytes` needs 8 bytes for classic TIFF and 16 for BigTIFF. The first
    /// IFD offset must point inside a file of `file_size` bytes.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let byte_order = match [bytes[0], bytes[1]] {
            BYTE_ORDER_LITTLE_ENDIAN => ByteOrder::LittleEndian,
            BYTE_ORDER_BIG_ENDIAN => ByteOrder::BigEndian,
            _ => return Err(TiffError::InvalidMagic(u16::from_le_bytes([bytes[0], bytes[1]]))),
        };

        let (is_bigtiff, first_ifd_offset) = match byte_order.read_u16(&bytes[2..4]) {
            VERSION_TIFF => (false, byte_order.read_u32(&bytes[4..8]) as u64),
            VERSION_BIGTIFF => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..6]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..16]))
            }
            version => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset == 0 || first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// 12 bytes for classic TIFF, 20 for BigTIFF.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Width of the entry count at the start of an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Width of offsets: the next-IFD pointer and an entry's value field.
    #[inline]
    pub const fn offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Decode the entry count from the first `ifd_count_size()` bytes of an IFD.
    pub fn read_entry_count(&self, bytes: &[u8]) -> u64 {
        if self.is_bigtiff {
            self.byte_order.read_u64(bytes)
        } else {
            self.byte_order.read_u16(bytes) as u64
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// A single tag entry of an IFD.
///
/// The value field is kept raw: it holds the value itself when it fits
/// (`is_inline`), otherwise an offset to the value elsewhere in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,

    /// None for field types this parser does not know
    pub field_type: Option<FieldType>,

    pub field_type_raw: u16,

    /// Number of values (not bytes)
    pub count: u64,

    /// The 4 or 8 raw bytes of the value field
    pub value_offset_bytes: Vec<u8>,

    pub is_inline: bool,
}

impl IfdEntry {
    fn parse(bytes: &[u8], header: &TiffHeader) -> Self {
        let byte_order = header.byte_order;
        let tag_id = byte_order.read_u16(&bytes[0..2]);
        let field_type_raw = byte_order.read_u16(&bytes[2..4]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value_start) = if header.is_bigtiff {
            (byte_order.read_u64(&bytes[4..12]), 12)
        } else {
            (byte_order.read_u32(&bytes[4..8]) as u64, 8)
        };

        let value_offset_bytes = bytes[value_start..value_start + header.offset_size()].to_vec();
        let is_inline = field_type
            .map(|ft| ft.fits_inline(count, header.is_bigtiff))
            .unwrap_or(false);

        IfdEntry {
            tag_id,
            field_type,
            field_type_raw,
            count,
            value_offset_bytes,
            is_inline,
        }
    }

    pub fn tag(&self) -> Option<TiffTag> {
        TiffTag::from_u16(self.tag_id)
    }

    /// Total size of the value in bytes, None for unknown field types.
    pub fn value_byte_size(&self) -> Option<u64> {
        let field_type = self.field_type?;
        (field_type.size_in_bytes() as u64).checked_mul(self.count)
    }

    /// Interpret the value field as a file offset.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() >= 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// A single inline Short or Long, widened to u32.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }

    /// A single inline Short, Long or Long8, widened to u64.
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Long8 | FieldType::Ifd8 => {
                Some(byte_order.read_u64(&self.value_offset_bytes))
            }
            _ => self.inline_u32(byte_order).map(u64::from),
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ifd {
    pub entries: Vec<IfdEntry>,

    /// Tag id to index in `entries`
    pub entries_by_tag: HashMap<u16, usize>,

    /// 0 when this is the last IFD
    pub next_ifd_offset: u64,
}

impl Ifd {
    /// An IFD with no entries.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bytes occupied by an IFD with `entry_count` entries.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> usize {
        header.ifd_count_size()
            + entry_count as usize * header.ifd_entry_size()
            + header.offset_size()
    }

    /// Parse an IFD from bytes starting at its entry count.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_count = header.read_entry_count(bytes);
        let required = Self::calculate_size(entry_count, header);
        if bytes.len() < required {
            return Err(TiffError::FileTooSmall {
                required: required as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let mut ifd = Ifd::empty();

        for i in 0..entry_count as usize {
            let start = count_size + i * entry_size;
            let entry = IfdEntry::parse(&bytes[start..start + entry_size], header);
            // Duplicate tags: first one wins
            ifd.entries_by_tag.entry(entry.tag_id).or_insert(i);
            ifd.entries.push(entry);
        }

        let next_start = count_size + entry_count as usize * entry_size;
        ifd.next_ifd_offset = if header.is_bigtiff {
            header.byte_order.read_u64(&bytes[next_start..next_start + 8])
        } else {
            header.byte_order.read_u32(&bytes[next_start..next_start + 4]) as u64
        };

        Ok(ifd)
    }

    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries_by_tag
            .get(&tag.as_u16())
            .and_then(|&idx| self.entries.get(idx))
    }

    pub fn has_tag(&self, tag: TiffTag) -> bool {
        self.entries_by_tag.contains_key(&tag.as_u16())
    }

    /// Inline single-value Short/Long tag.
    pub fn get_u32(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(tag)?.inline_u32(byte_order)
    }

    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageWidth, byte_order)
    }

    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::ImageLength, byte_order)
    }

    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileWidth, byte_order)
    }

    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.get_u32(TiffTag::TileLength, byte_order)
    }

    /// Raw compression value; TIFF defaults to 1 (none) when absent.
    pub fn compression(&self, byte_order: ByteOrder) -> Option<u16> {
        self.get_u32(TiffTag::Compression, byte_order)
            .map(|v| v as u16)
    }

    pub fn is_tiled(&self) -> bool {
        self.has_tag(TiffTag::TileWidth) && self.has_tag(TiffTag::TileLength)
    }

    pub fn is_stripped(&self) -> bool {
        self.has_tag(TiffTag::StripOffsets)
    }

    /// NewSubfileType bit 0.
    pub fn is_reduced_resolution(&self, byte_order: ByteOrder) -> bool {
        self.get_u32(TiffTag::NewSubfileType, byte_order)
            .map(|v| v & 1 == 1)
            .unwrap_or(false)
    }
}

// =============================================================================
// Tests
// =============================================================================
