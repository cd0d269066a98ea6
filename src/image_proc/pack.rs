//! Bit-packing of binary rasters into the panel's native byte stream.
//!
//! Eight horizontally-adjacent pixels per byte, most significant bit first,
//! row-major. Rows pack independently: a width that is not a multiple of 8
//! pads the final byte of each row with zero bits.

use image::GrayImage;

/// Bytes per packed row.
pub fn row_len(width: u32) -> usize {
    width.div_ceil(8) as usize
}

/// Pack a binary raster into the panel byte stream.
///
/// A white pixel (>= 128) sets its bit; a set bit is the erased state on
/// the panel, matching the all-zero clear stream being fully white.
pub fn pack(mono: &GrayImage) -> Vec<u8> {
    let (width, height) = mono.dimensions();
    let stride = row_len(width);
    let mut out = vec![0u8; stride * height as usize];

    for y in 0..height {
        let row = y as usize * stride;
        for x in 0..width {
            if mono.get_pixel(x, y)[0] >= 128 {
                out[row + (x / 8) as usize] |= 0x80 >> (x % 8);
            }
        }
    }

    out
}
