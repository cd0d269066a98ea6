//! Command/data framing over the panel bus.
//!
//! The panel samples the data-select line to tell an opcode byte from its
//! parameter bytes, and only listens while chip select is held low. Every
//! transaction is bracketed by those two lines; no response bytes are read
//! here.

use super::bus::{Level, PanelBus, PinRole, TransportError};
use super::command::Command;

/// Framing wrapper around a [`PanelBus`].
pub struct Framer<B: PanelBus> {
    bus: B,
}

impl<B: PanelBus> Framer<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    /// Send a single command byte.
    pub fn send_command(&mut self, command: Command) -> Result<(), TransportError> {
        self.bus.write_pin(PinRole::DataSelect, Level::Low)?;
        self.selected(|bus| bus.write_bytes(&[command.opcode()]))
    }

    /// Send parameter bytes as one burst.
    pub fn send_data(&mut self, data: &[u8]) -> Result<(), TransportError> {
        self.bus.write_pin(PinRole::DataSelect, Level::High)?;
        self.selected(|bus| bus.write_bytes(data))
    }

    /// Send a command followed by its parameter bytes.
    pub fn send_command_data(&mut self, command: Command, data: &[u8]) -> Result<(), TransportError> {
        self.send_command(command)?;
        if !data.is_empty() {
            self.send_data(data)?;
        }
        Ok(())
    }

    /// Drive a control pin directly (reset pulse, pin parking).
    pub fn write_pin(&mut self, role: PinRole, level: Level) -> Result<(), TransportError> {
        self.bus.write_pin(role, level)
    }

    /// Sample a control pin.
    pub fn read_pin(&mut self, role: PinRole) -> Result<Level, TransportError> {
        self.bus.read_pin(role)
    }

    /// Release the underlying bus.
    pub fn close(&mut self) -> Result<(), TransportError> {
        self.bus.close()
    }

    /// Run `write` with chip select asserted.
    ///
    /// The release is unconditional: chip select returns high even when the
    /// write fails, and the write error wins over a release error.
    fn selected<F>(&mut self, write: F) -> Result<(), TransportError>
    where
        F: FnOnce(&mut B) -> Result<(), TransportError>,
    {
        self.bus.write_pin(PinRole::ChipSelect, Level::Low)?;
        let written = write(&mut self.bus);
        let released = self.bus.write_pin(PinRole::ChipSelect, Level::High);
        written.and(released)
    }

    #[cfg(test)]
    pub(crate) fn bus(&self) -> &B {
        &self.bus
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::bus::mock::{BusOp, MockBus};

    fn framer() -> Framer<MockBus> {
        Framer::new(MockBus::new())
    }

    #[test]
    fn command_sets_dc_low_and_brackets_cs() {
        let mut framer = framer();
        framer.send_command(Command::PowerOn).unwrap();

        assert_eq!(
            framer.bus().ops,
            vec![
                BusOp::Pin(PinRole::DataSelect, Level::Low),
                BusOp::Pin(PinRole::ChipSelect, Level::Low),
                BusOp::Write(vec![0x04]),
                BusOp::Pin(PinRole::ChipSelect, Level::High),
            ]
        );
    }

    #[test]
    fn data_sets_dc_high_and_writes_one_burst() {
        let mut framer = framer();
        framer.send_data(&[0xAA, 0xBB, 0xCC]).unwrap();

        assert_eq!(
            framer.bus().ops,
            vec![
                BusOp::Pin(PinRole::DataSelect, Level::High),
                BusOp::Pin(PinRole::ChipSelect, Level::Low),
                BusOp::Write(vec![0xAA, 0xBB, 0xCC]),
                BusOp::Pin(PinRole::ChipSelect, Level::High),
            ]
        );
    }

    #[test]
    fn command_data_skips_empty_data_phase() {
        let mut framer = framer();
        framer.send_command_data(Command::PowerOn, &[]).unwrap();

        let writes = framer
            .bus()
            .ops
            .iter()
            .filter(|op| matches!(op, BusOp::Write(_)))
            .count();
        assert_eq!(writes, 1);
    }

    #[test]
    fn cs_is_inactive_around_every_write() {
        let mut framer = framer();
        framer
            .send_command_data(Command::PowerSetting, &[0x07, 0x07, 0x3F, 0x3F])
            .unwrap();
        framer.send_command(Command::PowerOn).unwrap();

        let ops = &framer.bus().ops;
        for (i, op) in ops.iter().enumerate() {
            if matches!(op, BusOp::Write(_)) {
                assert_eq!(ops[i - 1], BusOp::Pin(PinRole::ChipSelect, Level::Low));
                assert_eq!(ops[i + 1], BusOp::Pin(PinRole::ChipSelect, Level::High));
            }
        }
    }

    #[test]
    fn cs_released_when_write_fails() {
        let mut bus = MockBus::new();
        bus.fail_write = Some(0);
        let mut framer = Framer::new(bus);

        assert!(framer.send_command(Command::PowerOn).is_err());
        assert_eq!(
            framer.bus().ops.last(),
            Some(&BusOp::Pin(PinRole::ChipSelect, Level::High))
        );
    }
}
