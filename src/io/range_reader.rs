use async_trait::async_trait;
use bytes::Bytes;

use crate::error::IoError;

/// Positional, read-only access to the bytes of a slide file.
///
/// The TIFF parser only ever asks for "N bytes at offset X", which lets the
/// same parsing code run against a local file, a block cache, or an in-memory
/// buffer in tests.
#[async_trait]
pub trait RangeReader: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Returns an error if the range is out of bounds or if the read fails.
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError>;

    /// Get the total size of the resource in bytes.
    fn size(&self) -> u64;

    /// Identifier used in log lines, e.g. `file:///data/slide.svs`.
    fn identifier(&self) -> &str;
}

// =============================================================================
// Endian Helper Functions
// =============================================================================
//
// TIFF files declare their byte order in the header, so every multi-byte read
// in the parser goes through one of these.

macro_rules! endian_reader {
    ($(#[$doc:meta] $name:ident => $ty:ty, $from:ident;)*) => {
        $(
            #[$doc]
            ///
            /// # Panics
            /// Panics if the slice is shorter than the integer width.
            #[inline]
            pub fn $name(bytes: &[u8]) -> $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                let mut buf = [0u8; WIDTH];
                buf.copy_from_slice(&bytes[..WIDTH]);
                <$ty>::$from(buf)
            }
        )*
    };
}

endian_reader! {
    /// Read a little-endian u16 from a byte slice.
    read_u16_le => u16, from_le_bytes;
    /// Read a big-endian u16 from a byte slice.
    read_u16_be => u16, from_be_bytes;
    /// Read a little-endian u32 from a byte slice.
    read_u32_le => u32, from_le_bytes;
    /// Read a big-endian u32 from a byte slice.
    read_u32_be => u32, from_be_bytes;
    /// Read a little-endian u64 from a byte slice.
    read_u64_le => u64, from_le_bytes;
    /// Read a big-endian u64 from a byte slice.
    read_u64_be => u64, from_be_bytes;
}
