//! JPEG stream fix-ups for TIFF tiles.
//!
//! # Abbreviated streams
//!
//! JPEG-in-TIFF writers (Aperio, libtiff) usually store the quantization
//! (DQT) and Huffman (DHT) tables once, in the `JPEGTables` tag, and leave
//! them out of every tile. Such a tile cannot be decoded on its own:
//!
//! ```text
//! tables: SOI DQT DHT ... EOI
//! tile:   SOI SOF SOS <scan> EOI
//! merged: SOI DQT DHT ... SOF SOS <scan> EOI
//! ```
//!
//! # Colour space
//!
//! A tile whose IFD says `PhotometricInterpretation = RGB` holds RGB
//! components, not YCbCr. Decoders default to YCbCr for three-component
//! frames without a JFIF or Adobe marker, so an Adobe APP14 segment with
//! transform 0 is inserted to pin the colour space.

use bytes::{Bytes, BytesMut};

// =============================================================================
// JPEG Markers
// =============================================================================

pub const SOI: [u8; 2] = [0xFF, 0xD8];
pub const EOI: [u8; 2] = [0xFF, 0xD9];
pub const SOF0: [u8; 2] = [0xFF, 0xC0];
pub const DHT: [u8; 2] = [0xFF, 0xC4];
pub const DQT: [u8; 2] = [0xFF, 0xDB];
pub const SOS: [u8; 2] = [0xFF, 0xDA];
pub const APP0: [u8; 2] = [0xFF, 0xE0];
pub const APP14: [u8; 2] = [0xFF, 0xEE];

/// APP14 "Adobe" segment, version 100, no flags, transform 0 (RGB)
const ADOBE_RGB_SEGMENT: [u8; 16] = [
    0xFF, 0xEE, 0x00, 0x0E, b'A', b'd', b'o', b'b', b'e', 0x00, 0x64, 0x00, 0x00, 0x00, 0x00,
    0x00,
];

// =============================================================================
// Stream Analysis
// =============================================================================

/// Marker codes (second byte) of the header segments before SOS.
///
/// Stops at SOS, EOI, or the first malformed segment.
fn header_markers(data: &[u8]) -> Vec<u8> {
    let mut markers = Vec::new();
    if data.len() < 4 || data[0..2] != SOI {
        return markers;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            break;
        }
        let code = data[pos + 1];
        // Fill bytes
        if code == 0xFF {
            pos += 1;
            continue;
        }
        markers.push(code);
        if code == SOS[1] || code == EOI[1] {
            break;
        }
        // Standalone markers carry no length
        if (0xD0..=0xD7).contains(&code) || code == 0x01 {
            pos += 2;
            continue;
        }
        if pos + 3 >= data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        if length < 2 {
            break;
        }
        pos += 2 + length;
    }

    markers
}

/// True when the stream reaches SOS without defining any DQT or DHT.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    let markers = header_markers(data);
    markers.last() == Some(&SOS[1]) && !markers.iter().any(|&m| m == DQT[1] || m == DHT[1])
}

/// True when the stream defines its own quantization tables.
pub fn is_complete_stream(data: &[u8]) -> bool {
    header_markers(data).contains(&DQT[1])
}

fn declares_color_space(data: &[u8]) -> bool {
    header_markers(data)
        .iter()
        .any(|&m| m == APP0[1] || m == APP14[1])
}

// =============================================================================
// Stream Rewriting
// =============================================================================

/// Splice `JPEGTables` into an abbreviated tile.
///
/// The tables' trailing EOI and the tile's leading SOI are dropped.
pub fn merge_jpeg_tables(tables: &[u8], tile_data: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile_data);
    }
    if tile_data.is_empty() {
        return Bytes::new();
    }

    let tables_end = if tables.ends_with(&EOI) {
        tables.len() - 2
    } else {
        tables.len()
    };
    let tile_start = if tile_data.starts_with(&SOI) { 2 } else { 0 };

    let mut result = BytesMut::with_capacity(tables_end + tile_data.len() - tile_start);
    result.extend_from_slice(&tables[..tables_end]);
    result.extend_from_slice(&tile_data[tile_start..]);
    result.freeze()
}

/// Insert an Adobe transform-0 segment right after SOI, unless the stream
/// already carries a JFIF or Adobe segment.
pub fn mark_rgb_color_space(data: &[u8]) -> Bytes {
    if !data.starts_with(&SOI) || declares_color_space(data) {
        return Bytes::copy_from_slice(data);
    }

    let mut result = BytesMut::with_capacity(data.len() + ADOBE_RGB_SEGMENT.len());
    result.extend_from_slice(&SOI);
    result.extend_from_slice(&ADOBE_RGB_SEGMENT);
    result.extend_from_slice(&data[2..]);
    result.freeze()
}

/// Turn stored tile bytes into a stream a standard decoder accepts.
///
/// Tables are merged only into abbreviated tiles; `rgb` pins the colour
/// space for IFDs with RGB photometric interpretation.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile_data: &[u8], rgb: bool) -> Bytes {
    let stream = match tables {
        Some(tables) if is_abbreviated_stream(tile_data) => merge_jpeg_tables(tables, tile_data),
        _ => Bytes::copy_from_slice(tile_data),
    };

    if rgb {
        mark_rgb_color_space(&stream)
    } else {
        stream
    }
}

// =============================================================================
// Tests
// =============================================================================
