//! Raspberry Pi bus backend.
//!
//! Implements [`PanelBus`] over `rppal` GPIO and SPI. Pin numbers use BCM
//! numbering; the SPI channel runs in mode 0 with the chip-select line
//! driven manually as a plain GPIO, the way the panel HAT wires it.

use super::bus::{Level, PanelBus, PinRole, TransportError};
use crate::config::Config;
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::thread;
use std::time::Duration;

/// spidev caps a single transfer; stay under the default kernel limit.
const CHUNK_SIZE: usize = 4096;

struct BusIo {
    reset: OutputPin,
    dc: OutputPin,
    cs: OutputPin,
    busy: InputPin,
    spi: Spi,
}

/// [`PanelBus`] backend over the Pi's GPIO header and spidev.
pub struct RpiBus {
    io: Option<BusIo>,
    write_delay: Duration,
}

impl RpiBus {
    /// Open the GPIO pins and the SPI channel described by `config`.
    ///
    /// Outputs are driven to their idle levels (reset high, data-select low,
    /// chip-select high) before the first transaction.
    pub fn open(config: &Config) -> Result<Self, TransportError> {
        let gpio = Gpio::new()?;

        let mut reset = gpio.get(config.reset_pin)?.into_output();
        let mut dc = gpio.get(config.dc_pin)?.into_output();
        let mut cs = gpio.get(config.cs_pin)?.into_output();
        let busy = gpio.get(config.busy_pin)?.into_input();

        reset.set_high();
        dc.set_low();
        cs.set_high();

        let bus = match config.spi_bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            other => return Err(TransportError::BadChannel(other)),
        };

        let mut spi = Spi::new(bus, SlaveSelect::Ss0, config.spi_clock_hz, Mode::Mode0)?;
        spi.set_bits_per_word(config.spi_bits_per_word)?;

        tracing::debug!(
            "Bus open: RST={}, DC={}, BUSY={}, CS={}, SPI{} @ {} Hz",
            config.reset_pin,
            config.dc_pin,
            config.busy_pin,
            config.cs_pin,
            config.spi_bus,
            config.spi_clock_hz
        );

        Ok(Self {
            io: Some(BusIo {
                reset,
                dc,
                cs,
                busy,
                spi,
            }),
            write_delay: Duration::from_micros(config.spi_delay_us),
        })
    }

    fn io(&mut self) -> Result<&mut BusIo, TransportError> {
        self.io.as_mut().ok_or(TransportError::Closed)
    }
}

impl PanelBus for RpiBus {
    fn write_pin(&mut self, role: PinRole, level: Level) -> Result<(), TransportError> {
        let io = self.io()?;
        let pin = match role {
            PinRole::Reset => &mut io.reset,
            PinRole::DataSelect => &mut io.dc,
            PinRole::ChipSelect => &mut io.cs,
            PinRole::Busy => return Err(TransportError::NotAnOutput(role)),
        };
        match level {
            Level::Low => pin.set_low(),
            Level::High => pin.set_high(),
        }
        Ok(())
    }

    fn read_pin(&mut self, role: PinRole) -> Result<Level, TransportError> {
        let io = self.io()?;
        let high = match role {
            PinRole::Reset => io.reset.is_set_high(),
            PinRole::DataSelect => io.dc.is_set_high(),
            PinRole::ChipSelect => io.cs.is_set_high(),
            PinRole::Busy => io.busy.is_high(),
        };
        Ok(if high { Level::High } else { Level::Low })
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let delay = self.write_delay;
        let io = self.io()?;

        if delay.is_zero() {
            for chunk in bytes.chunks(CHUNK_SIZE) {
                io.spi.write(chunk)?;
            }
        } else {
            for byte in bytes {
                io.spi.write(&[*byte])?;
                thread::sleep(delay);
            }
        }

        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if let Some(mut io) = self.io.take() {
            io.reset.set_low();
            io.dc.set_low();
            tracing::debug!("Bus closed");
        }
        Ok(())
    }
}

impl Drop for RpiBus {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
