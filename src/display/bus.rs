//! Pin/bus abstraction for the display driver.
//!
//! The protocol layer talks to the panel exclusively through the [`PanelBus`]
//! trait: four logical control pins plus a byte-oriented serial channel.
//! The Raspberry Pi backend lives in [`super::rpi`]; tests drive the
//! protocol against a recording mock.

use thiserror::Error;

/// Logical roles of the four control pins.
///
/// Each role is bound to exactly one physical pin when the bus is opened;
/// the binding never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    /// Hardware reset line.
    Reset,
    /// Data/command select: low = command byte, high = data bytes.
    DataSelect,
    /// Panel status output, held low while an internal operation runs.
    Busy,
    /// Chip select, active low.
    ChipSelect,
}

/// Logic level on a control pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Transport-level errors. Always fatal to the in-flight operation; the
/// driver performs no retries.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("SPI error: {0}")]
    Spi(#[from] rppal::spi::Error),

    #[error("unsupported SPI bus index {0}")]
    BadChannel(u8),

    #[error("pin {0:?} is not an output")]
    NotAnOutput(PinRole),

    #[error("bus is closed")]
    Closed,
}

/// Contract required of the pin/bus backend.
///
/// Calls may block briefly (real hardware I/O) but must not silently drop
/// bytes.
pub trait PanelBus {
    /// Drive a control pin to the given level.
    fn write_pin(&mut self, role: PinRole, level: Level) -> Result<(), TransportError>;

    /// Sample a control pin.
    fn read_pin(&mut self, role: PinRole) -> Result<Level, TransportError>;

    /// Write a sequence of bytes on the serial channel.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Release all underlying resources. Further calls fail with
    /// [`TransportError::Closed`].
    fn close(&mut self) -> Result<(), TransportError>;
}
