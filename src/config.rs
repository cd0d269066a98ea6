//! Configuration management.
//!
//! Handles loading, saving, and validating configuration from JSON files.
//! Every hardware parameter is checked here, before any pin or SPI handle
//! is opened.

use crate::display::epd7in5;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "/opt/epd7in5-display/config.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Reset pin (BCM numbering)
    #[serde(default = "default_reset_pin")]
    pub reset_pin: u8,

    /// Data/command select pin
    #[serde(default = "default_dc_pin")]
    pub dc_pin: u8,

    /// Busy status pin
    #[serde(default = "default_busy_pin")]
    pub busy_pin: u8,

    /// Chip select pin
    #[serde(default = "default_cs_pin")]
    pub cs_pin: u8,

    /// SPI bus index (0 = /dev/spidev0.x)
    #[serde(default)]
    pub spi_bus: u8,

    /// SPI clock speed in Hz
    #[serde(default = "default_spi_clock_hz")]
    pub spi_clock_hz: u32,

    /// SPI word size in bits
    #[serde(default = "default_spi_bits_per_word")]
    pub spi_bits_per_word: u8,

    /// Pause between bytes in microseconds (0 = burst writes)
    #[serde(default)]
    pub spi_delay_us: u64,

    /// Panel width in pixels
    #[serde(default = "default_display_width")]
    pub display_width: u32,

    /// Panel height in pixels
    #[serde(default = "default_display_height")]
    pub display_height: u32,

    /// Busy-wait timeout in milliseconds
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Display rotation in degrees (0, 90, 180, 270)
    #[serde(default)]
    pub rotation: u16,

    /// Horizontal mirror
    #[serde(default)]
    pub mirror_h: bool,

    /// Vertical mirror
    #[serde(default)]
    pub mirror_v: bool,

    /// Scale image to fit (letterbox) instead of filling (crop)
    #[serde(default = "default_true")]
    pub scale_to_fit: bool,
}

fn default_reset_pin() -> u8 {
    17
}

fn default_dc_pin() -> u8 {
    25
}

fn default_busy_pin() -> u8 {
    24
}

fn default_cs_pin() -> u8 {
    8
}

fn default_spi_clock_hz() -> u32 {
    4_000_000
}

fn default_spi_bits_per_word() -> u8 {
    8
}

fn default_display_width() -> u32 {
    epd7in5::WIDTH
}

fn default_display_height() -> u32 {
    epd7in5::HEIGHT
}

fn default_busy_timeout_ms() -> u64 {
    30_000
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reset_pin: default_reset_pin(),
            dc_pin: default_dc_pin(),
            busy_pin: default_busy_pin(),
            cs_pin: default_cs_pin(),
            spi_bus: 0,
            spi_clock_hz: default_spi_clock_hz(),
            spi_bits_per_word: default_spi_bits_per_word(),
            spi_delay_us: 0,
            display_width: default_display_width(),
            display_height: default_display_height(),
            busy_timeout_ms: default_busy_timeout_ms(),
            rotation: 0,
            mirror_h: false,
            mirror_v: false,
            scale_to_fit: true,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file atomically
    ///
    /// Writes to a temporary file and renames it into place, so a power
    /// loss mid-write cannot leave a corrupt config behind.
    #[allow(dead_code)]
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;

        let tmp_path = path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)?;

        std::fs::rename(&tmp_path, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            ConfigError::ReadError(e)
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pins = [
            ("reset_pin", self.reset_pin),
            ("dc_pin", self.dc_pin),
            ("busy_pin", self.busy_pin),
            ("cs_pin", self.cs_pin),
        ];
        for (i, (name_a, pin_a)) in pins.iter().enumerate() {
            for (name_b, pin_b) in &pins[i + 1..] {
                if pin_a == pin_b {
                    return Err(ConfigError::ValidationError(format!(
                        "{} and {} are both assigned to GPIO {}",
                        name_a, name_b, pin_a
                    )));
                }
            }
        }

        if self.spi_bus > 2 {
            return Err(ConfigError::ValidationError(format!(
                "spi_bus must be 0, 1, or 2 (got {})",
                self.spi_bus
            )));
        }

        if self.spi_clock_hz == 0 {
            return Err(ConfigError::ValidationError(
                "spi_clock_hz must be greater than 0".to_string(),
            ));
        }

        if self.spi_bits_per_word != 8 {
            return Err(ConfigError::ValidationError(
                "spi_bits_per_word must be 8; the panel controller only speaks 8-bit words"
                    .to_string(),
            ));
        }

        if self.display_width == 0 || self.display_width > 2048 {
            return Err(ConfigError::ValidationError(
                "display_width must be between 1 and 2048".to_string(),
            ));
        }

        if self.display_height == 0 || self.display_height > 2048 {
            return Err(ConfigError::ValidationError(
                "display_height must be between 1 and 2048".to_string(),
            ));
        }

        if (self.display_width as u64 * self.display_height as u64) % 8 != 0 {
            return Err(ConfigError::ValidationError(format!(
                "display geometry {}x{} does not pack into whole bytes",
                self.display_width, self.display_height
            )));
        }

        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "busy_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if !matches!(self.rotation, 0 | 90 | 180 | 270) {
            return Err(ConfigError::ValidationError(
                "rotation must be 0, 90, 180, or 270".to_string(),
            ));
        }

        Ok(())
    }
}
