//! Reading tag values, inline or from elsewhere in the file.
//!
//! Arrays such as TileOffsets are fetched with one range read each, so a
//! level with tens of thousands of tiles costs two reads, not one per tile.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

fn tag_name(entry: &IfdEntry) -> &'static str {
    entry.tag().map(|t| t.name()).unwrap_or("unknown")
}

// =============================================================================
// ValueReader
// =============================================================================

/// Reads tag values through a RangeReader, honouring the file's byte order.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    #[inline]
    pub fn byte_order(&self) -> ByteOrder {
        self.header.byte_order
    }

    /// Raw bytes of an entry's value.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(
                &entry.value_offset_bytes[..size as usize],
            ));
        }

        let size = usize::try_from(size).map_err(|_| TiffError::InvalidTagValue {
            tag: tag_name(entry),
            message: format!("value of {} bytes is too large", size),
        })?;
        let offset = entry.value_offset(self.header.byte_order);
        Ok(self.reader.read_exact_at(offset, size).await?)
    }

    /// A single unsigned value, inline or not.
    pub async fn read_u64(&self, entry: &IfdEntry) -> Result<u64, TiffError> {
        if let Some(value) = entry.inline_u64(self.header.byte_order) {
            return Ok(value);
        }
        if entry.count != 1 {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected count 1, got {}", entry.count),
            });
        }
        self.read_u64_array(entry)
            .await?
            .first()
            .copied()
            .ok_or(TiffError::MissingTag(tag_name(entry)))
    }

    /// An array of Short, Long or Long8 values widened to u64.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;

        if !matches!(
            field_type,
            FieldType::Short | FieldType::Long | FieldType::Long8 | FieldType::Ifd8
        ) {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected an integer array, got {:?}", field_type),
            });
        }

        if entry.count == 0 {
            return Ok(Vec::new());
        }

        let bytes = self.read_bytes(entry).await?;
        Ok(parse_u64_array(
            &bytes,
            entry.count as usize,
            field_type,
            self.header.byte_order,
        ))
    }

    /// An ASCII value up to its first NUL, decoded lossily.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        if entry.field_type != Some(FieldType::Ascii) {
            return Err(TiffError::InvalidTagValue {
                tag: tag_name(entry),
                message: format!("expected Ascii, got type {}", entry.field_type_raw),
            });
        }

        let bytes = self.read_bytes(entry).await?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// Decode `count` integers of `field_type` from `bytes`.
///
/// Values that would run past the end of `bytes` are dropped; non-integer
/// field types yield an empty vector.
pub fn parse_u64_array(
    bytes: &[u8],
    count: usize,
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Vec<u64> {
    let width = field_type.size_in_bytes();
    let read: fn(ByteOrder, &[u8]) -> u64 = match field_type {
        FieldType::Short => |bo, b| bo.read_u16(b) as u64,
        FieldType::Long => |bo, b| bo.read_u32(b) as u64,
        FieldType::Long8 | FieldType::Ifd8 => |bo, b| bo.read_u64(b),
        _ => return Vec::new(),
    };

    bytes
        .chunks_exact(width)
        .take(count)
        .map(|chunk| read(byte_order, chunk))
        .collect()
}
