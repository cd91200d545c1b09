// SPDX-License-Identifier: CC0-1.0

//! Validation of plot images.
//!
//! Only classic Windows bitmaps are accepted: `BM` signature, a 40-byte
//! `BITMAPINFOHEADER`, a single plane, 24 or 32 bits per pixel and no
//! compression (`BI_RGB`). Palette formats are rejected. Top-down images
//! (negative height) are permitted and their height is stored as an absolute
//! value. Pixel data is not decoded, only bounds-checked.

use core::fmt;

use bitcoin::hashes::{sha256, Hash as _};

use crate::CANVAS_SIZE;

/// Byte length of the file header (14) plus a `BITMAPINFOHEADER` (40).
const HEADERS_LEN: usize = 54;

/// Dimensions and canonical digest of a validated BMP.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BmpInfo {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels (absolute value for top-down images).
    pub height: u32,
    /// SHA-256 of the exact image bytes.
    pub image_hash: sha256::Hash,
}

/// Validates `bytes` as a 24/32-bit uncompressed BMP.
///
/// Returns the image dimensions and the canonical digest of the byte blob.
pub fn validate(bytes: &[u8]) -> Result<BmpInfo, BmpError> {
    use BmpError as E;

    if bytes.len() < HEADERS_LEN {
        return Err(E::Truncated);
    }
    if &bytes[0..2] != b"BM" {
        return Err(E::BadSignature);
    }

    let file_size = read_u32(bytes, 2);
    if file_size as usize != bytes.len() {
        return Err(E::BadFileSize { declared: file_size, actual: bytes.len() });
    }

    let data_offset = read_u32(bytes, 10);
    let dib_size = read_u32(bytes, 14);
    if dib_size != 40 {
        return Err(E::UnsupportedDib(dib_size));
    }

    let width = read_i32(bytes, 18);
    let height = read_i32(bytes, 22);
    let planes = read_u16(bytes, 26);
    let bpp = read_u16(bytes, 28);
    let compression = read_u32(bytes, 30);

    if planes != 1 {
        return Err(E::BadPlanes(planes));
    }
    if bpp != 24 && bpp != 32 {
        return Err(E::UnsupportedBitDepth(bpp));
    }
    if compression != 0 {
        return Err(E::Compressed(compression));
    }
    if width <= 0 || height == 0 {
        return Err(E::ZeroDimension);
    }

    let width = width as u32; // Positive, checked above.
    let height = height.unsigned_abs();
    if width > CANVAS_SIZE || height > CANVAS_SIZE {
        return Err(E::Oversized { width, height });
    }

    let data_offset = data_offset as usize;
    if data_offset < HEADERS_LEN || data_offset > bytes.len() {
        return Err(E::BadPixelOffset(data_offset as u32));
    }

    // Rows are ceil(w * bpp / 8) bytes, padded to a 4-byte boundary.
    let stride = (u64::from(width) * u64::from(bpp)).div_ceil(8).next_multiple_of(4);
    let pixel_data_end = data_offset as u64 + stride * u64::from(height);
    if pixel_data_end > bytes.len() as u64 {
        return Err(E::PixelDataOutOfRange);
    }

    Ok(BmpInfo { width, height, image_hash: sha256::Hash::hash(bytes) })
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes(bytes[offset..offset + 2].try_into().expect("slice length is 2"))
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("slice length is 4"))
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(bytes[offset..offset + 4].try_into().expect("slice length is 4"))
}

/// Reason a byte blob was rejected as a plot image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum BmpError {
    /// Shorter than the fixed headers.
    Truncated,
    /// Missing the `BM` signature.
    BadSignature,
    /// The `file_size` header field does not match the buffer length.
    BadFileSize {
        /// Size declared in the header.
        declared: u32,
        /// Actual buffer length.
        actual: usize,
    },
    /// DIB header is not a 40-byte `BITMAPINFOHEADER`.
    UnsupportedDib(u32),
    /// The planes field must be 1.
    BadPlanes(u16),
    /// Only 24 and 32 bits per pixel are supported.
    UnsupportedBitDepth(u16),
    /// Compression must be 0 (`BI_RGB`).
    Compressed(u32),
    /// Width or height is zero (or width negative).
    ZeroDimension,
    /// Wider or taller than the canvas.
    Oversized {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// Pixel data offset points outside the buffer or into the headers.
    BadPixelOffset(u32),
    /// Declared dimensions require more pixel data than the buffer holds.
    PixelDataOutOfRange,
}

impl fmt::Display for BmpError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use BmpError as E;

        match *self {
            E::Truncated => write!(f, "buffer too short for BMP headers"),
            E::BadSignature => write!(f, "missing BM signature"),
            E::BadFileSize { declared, actual } =>
                write!(f, "file size field {} does not match buffer length {}", declared, actual),
            E::UnsupportedDib(size) =>
                write!(f, "unsupported DIB header size {} (want BITMAPINFOHEADER)", size),
            E::BadPlanes(planes) => write!(f, "planes field {} (must be 1)", planes),
            E::UnsupportedBitDepth(bpp) => write!(f, "unsupported bit depth {}", bpp),
            E::Compressed(method) => write!(f, "compressed BMP (method {})", method),
            E::ZeroDimension => write!(f, "image has a zero or negative dimension"),
            E::Oversized { width, height } =>
                write!(f, "image {}x{} exceeds the canvas", width, height),
            E::BadPixelOffset(offset) => write!(f, "pixel data offset {} out of range", offset),
            E::PixelDataOutOfRange => write!(f, "pixel data extends past end of buffer"),
        }
    }
}

impl std::error::Error for BmpError {}
