//! TIFF tag, field type and compression vocabularies.
//!
//! Only the tags needed to locate pyramid tiles and read slide metadata are
//! named here; every other tag survives parsing as a raw id and is ignored.

// =============================================================================
// TIFF Field Types
// =============================================================================

/// Encoding of an IFD entry's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum FieldType {
    /// 8-bit unsigned integer
    Byte = 1,
    /// NUL-terminated 7-bit ASCII
    Ascii = 2,
    /// 16-bit unsigned integer
    Short = 3,
    /// 32-bit unsigned integer
    Long = 4,
    /// Two Longs: numerator, denominator
    Rational = 5,
    /// Opaque bytes (JPEGTables uses this)
    Undefined = 7,
    /// 64-bit unsigned integer (BigTIFF only)
    Long8 = 16,
    /// 64-bit IFD offset (BigTIFF only)
    Ifd8 = 18,
}

impl FieldType {
    /// Size of a single value of this type.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Rational | FieldType::Long8 | FieldType::Ifd8 => 8,
        }
    }

    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(FieldType::Byte),
            2 => Some(FieldType::Ascii),
            3 => Some(FieldType::Short),
            4 => Some(FieldType::Long),
            5 => Some(FieldType::Rational),
            7 => Some(FieldType::Undefined),
            16 => Some(FieldType::Long8),
            18 => Some(FieldType::Ifd8),
            _ => None,
        }
    }

    /// Whether `count` values fit in the entry's value field (4 bytes for
    /// classic TIFF, 8 for BigTIFF).
    #[inline]
    pub fn fits_inline(self, count: u64, is_bigtiff: bool) -> bool {
        let threshold = if is_bigtiff { 8 } else { 4 };
        (self.size_in_bytes() as u64).saturating_mul(count) <= threshold
    }
}

// =============================================================================
// TIFF Tags
// =============================================================================

macro_rules! tiff_tags {
    ($($(#[$doc:meta])* $name:ident = $id:literal,)*) => {
        /// TIFF tags the slide readers look at.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum TiffTag {
            $($(#[$doc])* $name = $id,)*
        }

        impl TiffTag {
            pub fn from_u16(value: u16) -> Option<Self> {
                match value {
                    $($id => Some(TiffTag::$name),)*
                    _ => None,
                }
            }

            /// Tag name for error messages.
            pub const fn name(self) -> &'static str {
                match self {
                    $(TiffTag::$name => stringify!($name),)*
                }
            }
        }
    };
}

tiff_tags! {
    /// Bit 0 set marks a reduced-resolution image
    NewSubfileType = 254,
    ImageWidth = 256,
    ImageLength = 257,
    BitsPerSample = 258,
    Compression = 259,
    PhotometricInterpretation = 262,
    /// Free text; Aperio stores its metadata here
    ImageDescription = 270,
    StripOffsets = 273,
    SamplesPerPixel = 277,
    RowsPerStrip = 278,
    StripByteCounts = 279,
    PlanarConfiguration = 284,
    TileWidth = 322,
    TileLength = 323,
    TileOffsets = 324,
    TileByteCounts = 325,
    /// Shared DQT/DHT segments for abbreviated JPEG tiles
    JpegTables = 347,
    YCbCrSubSampling = 530,
}

impl TiffTag {
    #[inline]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }
}

// =============================================================================
// Compression Values
// =============================================================================

/// Compression schemes seen in slide files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Compression {
    None = 1,
    Lzw = 5,
    OldJpeg = 6,
    Jpeg = 7,
    Deflate = 8,
    AdobeDeflate = 32946,
    /// Aperio JPEG 2000, YCbCr
    Jpeg2000YCbCr = 33003,
    /// Aperio JPEG 2000, RGB
    Jpeg2000Rgb = 33005,
}

impl Compression {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Compression::None),
            5 => Some(Compression::Lzw),
            6 => Some(Compression::OldJpeg),
            7 => Some(Compression::Jpeg),
            8 => Some(Compression::Deflate),
            32946 => Some(Compression::AdobeDeflate),
            33003 => Some(Compression::Jpeg2000YCbCr),
            33005 => Some(Compression::Jpeg2000Rgb),
            _ => None,
        }
    }

    /// Only JPEG tiles can be decoded.
    #[inline]
    pub const fn is_supported(self) -> bool {
        matches!(self, Compression::Jpeg)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Compression::None => "None",
            Compression::Lzw => "LZW",
            Compression::OldJpeg => "Old JPEG",
            Compression::Jpeg => "JPEG",
            Compression::Deflate => "Deflate",
            Compression::AdobeDeflate => "Adobe Deflate",
            Compression::Jpeg2000YCbCr | Compression::Jpeg2000Rgb => "JPEG 2000",
        }
    }

    /// Human-readable name for a raw compression value.
    pub fn describe(value: u16) -> String {
        match Self::from_u16(value) {
            Some(compression) => compression.name().to_string(),
            None => format!("unknown ({})", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_round_trip_ids() {
        for id in [1u16, 2, 3, 4, 5, 7, 16, 18] {
            let ty = FieldType::from_u16(id).unwrap();
            assert_eq!(ty as u16, id);
        }
        assert_eq!(FieldType::from_u16(0), None);
        assert_eq!(FieldType::from_u16(12), None);
    }

    #[test]
    fn test_fits_inline() {
        // Two shorts fill a classic value field exactly
        assert!(FieldType::Short.fits_inline(2, false));
        assert!(!FieldType::Short.fits_inline(3, false));
        assert!(FieldType::Short.fits_inline(4, true));
        assert!(!FieldType::Long8.fits_inline(1, false));
        assert!(FieldType::Long8.fits_inline(1, true));
        assert!(!FieldType::Ascii.fits_inline(u64::MAX, true));
    }

    #[test]
    fn test_tag_lookup() {
        assert_eq!(TiffTag::from_u16(322), Some(TiffTag::TileWidth));
        assert_eq!(TiffTag::from_u16(347), Some(TiffTag::JpegTables));
        assert_eq!(TiffTag::from_u16(9999), None);
        assert_eq!(TiffTag::TileOffsets.as_u16(), 324);
        assert_eq!(TiffTag::ImageLength.name(), "ImageLength");
    }

    #[test]
    fn test_compression_support() {
        assert!(Compression::Jpeg.is_supported());
        assert!(!Compression::Jpeg2000YCbCr.is_supported());
        assert!(!Compression::Lzw.is_supported());
        assert_eq!(Compression::describe(33005), "JPEG 2000");
        assert_eq!(Compression::describe(4242), "unknown (4242)");
    }
}
