//! Image pipeline for the monochrome panel.
//!
//! Fits a decoded image to the panel geometry, reduces it to a single
//! luminance channel, dithers it to black and white, and packs it into the
//! 1-bit-per-pixel stream the panel expects.

pub mod dither;
pub mod pack;
pub mod transform;

pub use transform::{FitOptions, Rotation};

use crate::config::Config;
use image::DynamicImage;
use thiserror::Error;

/// Image processing errors
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("image is empty (0x0 pixels)")]
    EmptyImage,
}

impl From<&Config> for FitOptions {
    fn from(config: &Config) -> Self {
        Self {
            rotation: Rotation::from(config.rotation),
            mirror_h: config.mirror_h,
            mirror_v: config.mirror_v,
            scale_to_fit: config.scale_to_fit,
            target_width: config.display_width,
            target_height: config.display_height,
        }
    }
}

/// Run the full pipeline on a decoded image.
///
/// The fit stage is the only one that resizes; dithering and packing
/// operate on the raster's own bounds.
pub fn prepare_frame(img: DynamicImage, config: &Config) -> Result<Vec<u8>, ProcessingError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(ProcessingError::EmptyImage);
    }

    tracing::info!("Processing {}x{} source image", img.width(), img.height());

    let rgb = transform::fit_to_panel(img, &FitOptions::from(config));
    let mono = dither::dither(&dither::grayscale(&rgb));
    let frame = pack::pack(&mono);

    tracing::debug!("Pipeline complete, frame is {} bytes", frame.len());
    Ok(frame)
}
