//! Monochrome e-paper display tool for Raspberry Pi.
//!
//! Drives a Waveshare 7.5" V2 panel over SPI: renders an image file through
//! the dithering pipeline, clears the panel, or puts it to sleep, then
//! exits.

mod config;
mod display;
mod image_proc;

use clap::Parser;
use config::Config;
use display::Epd7in5;
use display::rpi::RpiBus;
use image::{DynamicImage, Rgb, RgbImage};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "epd7in5-display")]
#[command(about = "Monochrome e-paper display tool for Raspberry Pi")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Display an image file
    #[arg(short, long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Clear the panel to white and exit
    #[arg(long)]
    clear: bool,

    /// Show a checkerboard test pattern and exit
    #[arg(long)]
    test: bool,

    /// Put the panel into deep sleep and exit
    #[arg(long)]
    sleep: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(args.verbose);

    let config = Config::load(&args.config).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {}: {}", args.config, e);
        tracing::info!("Using default configuration");
        Config::default()
    });

    let bus = RpiBus::open(&config)?;
    let mut panel = Epd7in5::new(
        bus,
        config.display_width,
        config.display_height,
        Duration::from_millis(config.busy_timeout_ms),
    )?;

    if args.clear {
        panel.init()?;
        panel.clear()?;
        panel.sleep()?;
        panel.close()?;
        tracing::info!("Display cleared");
        return Ok(());
    }

    if args.test {
        let pattern = DynamicImage::ImageRgb8(checkerboard(&config));
        let frame = image_proc::prepare_frame(pattern, &config)?;
        panel.init()?;
        panel.display(&frame)?;
        panel.sleep()?;
        panel.close()?;
        tracing::info!("Test pattern displayed");
        return Ok(());
    }

    if let Some(path) = &args.image {
        let img = image::ImageReader::open(path)?
            .with_guessed_format()?
            .decode()?;
        let frame = image_proc::prepare_frame(img, &config)?;
        panel.init()?;
        panel.display(&frame)?;
        panel.sleep()?;
        panel.close()?;
        tracing::info!("Image displayed");
        return Ok(());
    }

    if args.sleep {
        panel.init()?;
        panel.sleep()?;
        panel.close()?;
        tracing::info!("Display sleeping");
        return Ok(());
    }

    anyhow::bail!("nothing to do: pass --image, --clear, --test, or --sleep")
}

/// Checkerboard at the panel geometry, 16 px squares.
fn checkerboard(config: &Config) -> RgbImage {
    RgbImage::from_fn(config.display_width, config.display_height, |x, y| {
        if ((x / 16) + (y / 16)) % 2 == 0 {
            Rgb([255, 255, 255])
        } else {
            Rgb([0, 0, 0])
        }
    })
}

/// Initialize tracing/logging
///
/// Default level is "warn" to minimize SD card wear from log writes.
/// Use --verbose flag for "debug" level during development/troubleshooting.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("epd7in5_display={}", level).into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
