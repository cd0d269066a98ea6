//! Grayscale reduction and error-diffusion dithering.
//!
//! The panel shows two levels per pixel; naive thresholding bands badly on
//! photographic input, so quantization error is diffused to the neighboring
//! pixels instead (Floyd-Steinberg weights: 7/16 right, 3/16 below-left,
//! 5/16 below, 1/16 below-right).
//!
//! The error buffer is two rows of i16 (current and next), which keeps the
//! working set small for an 800x480 raster.

use image::{GrayImage, Luma, RgbImage};

/// Luminance of an RGB pixel, 299/587/114 per-mille weighting.
#[inline]
fn luminance(r: u8, g: u8, b: u8) -> u8 {
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Collapse an RGB raster to a single luminance channel.
///
/// Dithering operates on one scalar per pixel; this is the only place the
/// color channels are consulted.
pub fn grayscale(img: &RgbImage) -> GrayImage {
    let (width, height) = img.dimensions();
    let mut gray = GrayImage::new(width, height);
    for (x, y, pixel) in img.enumerate_pixels() {
        gray.put_pixel(x, y, Luma([luminance(pixel[0], pixel[1], pixel[2])]));
    }
    gray
}

/// Apply Floyd-Steinberg dithering to a grayscale raster.
///
/// Returns a binary raster of the same dimensions where every pixel is 0
/// (black) or 255 (white). Deterministic: the same input always produces
/// the same output.
pub fn dither(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    let w = width as usize;

    let mut curr_row: Vec<i16> = vec![0; w];
    let mut next_row: Vec<i16> = vec![0; w];
    let mut out = GrayImage::new(width, height);

    for y in 0..height {
        // Error carried over from the previous row is already in curr_row
        for x in 0..w {
            curr_row[x] += gray.get_pixel(x as u32, y)[0] as i16;
        }

        for x in 0..w {
            let value = curr_row[x].clamp(0, 255);
            let quantized: i16 = if value >= 128 { 255 } else { 0 };
            let err = value - quantized;

            if x + 1 < w {
                curr_row[x + 1] += err * 7 / 16;
            }
            if y + 1 < height {
                if x > 0 {
                    next_row[x - 1] += err * 3 / 16;
                }
                next_row[x] += err * 5 / 16;
                if x + 1 < w {
                    next_row[x + 1] += err / 16;
                }
            }

            out.put_pixel(x as u32, y, Luma([quantized as u8]));
        }

        std::mem::swap(&mut curr_row, &mut next_row);
        next_row.fill(0);
    }

    out
}
