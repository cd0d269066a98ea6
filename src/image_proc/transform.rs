//! Fitting source images to the panel geometry.
//!
//! The dither and pack stages work on whatever bounds they are given; this
//! stage is where an arbitrary source raster gets rotated, mirrored, and
//! scaled onto the panel canvas before the pipeline proper runs.

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

/// Rotation applied before mirroring and scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl From<u16> for Rotation {
    fn from(degrees: u16) -> Self {
        match degrees {
            90 => Rotation::Rotate90,
            180 => Rotation::Rotate180,
            270 => Rotation::Rotate270,
            _ => Rotation::None,
        }
    }
}

/// Fitting options, typically derived from the configuration file.
#[derive(Debug, Clone)]
pub struct FitOptions {
    pub rotation: Rotation,
    pub mirror_h: bool,
    pub mirror_v: bool,
    /// Letterbox onto a white canvas when true, center-crop when false.
    pub scale_to_fit: bool,
    pub target_width: u32,
    pub target_height: u32,
}

/// Rotate, mirror, and scale an image onto the panel canvas.
pub fn fit_to_panel(img: DynamicImage, options: &FitOptions) -> RgbImage {
    let mut img = match options.rotation {
        Rotation::None => img,
        Rotation::Rotate90 => img.rotate90(),
        Rotation::Rotate180 => img.rotate180(),
        Rotation::Rotate270 => img.rotate270(),
    };

    if options.mirror_h {
        img = img.fliph();
    }
    if options.mirror_v {
        img = img.flipv();
    }

    if options.scale_to_fit {
        letterbox(img, options.target_width, options.target_height)
    } else {
        fill_crop(img, options.target_width, options.target_height)
    }
}

/// Scale to fit within the panel, centered on a white canvas.
fn letterbox(img: DynamicImage, max_width: u32, max_height: u32) -> RgbImage {
    let (src_width, src_height) = img.dimensions();

    let scale_w = max_width as f32 / src_width as f32;
    let scale_h = max_height as f32 / src_height as f32;
    let scale = scale_w.min(scale_h);

    let new_width = (src_width as f32 * scale) as u32;
    let new_height = (src_height as f32 * scale) as u32;

    tracing::debug!(
        "Scaling {}x{} -> {}x{} (fit into {}x{})",
        src_width,
        src_height,
        new_width,
        new_height,
        max_width,
        max_height
    );

    let resized = img.resize(new_width, new_height, image::imageops::FilterType::Triangle);

    let mut canvas = RgbImage::from_pixel(max_width, max_height, Rgb([255, 255, 255]));
    let offset_x = (max_width - new_width) / 2;
    let offset_y = (max_height - new_height) / 2;
    image::imageops::overlay(&mut canvas, &resized.to_rgb8(), offset_x as i64, offset_y as i64);

    canvas
}

/// Scale to fill the panel, cropping the overflow around the center.
fn fill_crop(img: DynamicImage, target_width: u32, target_height: u32) -> RgbImage {
    let (src_width, src_height) = img.dimensions();

    let scale_w = target_width as f32 / src_width as f32;
    let scale_h = target_height as f32 / src_height as f32;
    let scale = scale_w.max(scale_h);

    let new_width = (src_width as f32 * scale) as u32;
    let new_height = (src_height as f32 * scale) as u32;

    tracing::debug!(
        "Scaling {}x{} -> {}x{} (fill {}x{})",
        src_width,
        src_height,
        new_width,
        new_height,
        target_width,
        target_height
    );

    let resized = img.resize_exact(new_width, new_height, image::imageops::FilterType::Triangle);

    let crop_x = (new_width - target_width) / 2;
    let crop_y = (new_height - target_height) / 2;
    resized.crop_imm(crop_x, crop_y, target_width, target_height).to_rgb8()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(scale_to_fit: bool) -> FitOptions {
        FitOptions {
            rotation: Rotation::None,
            mirror_h: false,
            mirror_v: false,
            scale_to_fit,
            target_width: 80,
            target_height: 48,
        }
    }

    #[test]
    fn letterbox_pads_a_tall_image_with_white() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 48, Rgb([0, 0, 0])));
        let out = fit_to_panel(img, &options(true));

        assert_eq!(out.dimensions(), (80, 48));
        // corners are canvas, not image
        assert_eq!(*out.get_pixel(0, 0), Rgb([255, 255, 255]));
        assert_eq!(*out.get_pixel(79, 47), Rgb([255, 255, 255]));
        // center is image
        assert_eq!(*out.get_pixel(40, 24), Rgb([0, 0, 0]));
    }

    #[test]
    fn fill_crops_to_exact_panel_size() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 100, Rgb([10, 20, 30])));
        let out = fit_to_panel(img, &options(false));

        assert_eq!(out.dimensions(), (80, 48));
    }

    #[test]
    fn rotation_swaps_dimensions_before_scaling() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(48, 80, Rgb([0, 0, 0])));
        let mut opts = options(true);
        opts.rotation = Rotation::Rotate90;

        let out = fit_to_panel(img, &opts);
        assert_eq!(out.dimensions(), (80, 48));
        // a 90-degree turn makes the source match the panel exactly
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
    }
}
