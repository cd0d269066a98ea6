//! Waveshare 7.5" V2 (EPD7IN5V2) display driver.
//!
//! 800 x 480 monochrome panel on a UC8179 controller, 1 bit per pixel. The
//! controller keeps two internal frame planes, each loaded through its own
//! start-transmission command; a display refresh latches both onto the
//! glass.
//!
//! Command sequences and timings follow the official Waveshare driver:
//! https://github.com/waveshare/e-Paper/blob/master/RaspberryPi_JetsonNano/python/lib/waveshare_epd/epd7in5_V2.py

use super::bus::{Level, PanelBus, PinRole, TransportError};
use super::command::Command;
use super::framer::Framer;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default panel dimensions
pub const WIDTH: u32 = 800;
pub const HEIGHT: u32 = 480;

/// Reset pin hold time on either side of the low pulse
const RESET_HOLD: Duration = Duration::from_millis(200);
/// Width of the low pulse within the reset cycle
const RESET_PULSE: Duration = Duration::from_millis(2);
/// Delay after the power-on command before polling status
const POWER_ON_DELAY: Duration = Duration::from_millis(100);
/// Delay after the refresh command before polling status
const REFRESH_DELAY: Duration = Duration::from_millis(100);
/// Settle time after the busy pin reports ready; the pin clears slightly
/// ahead of the controller's internal transients
const BUSY_SETTLE: Duration = Duration::from_millis(200);
/// Pause between busy polls
const BUSY_POLL: Duration = Duration::from_millis(10);
/// Byte the controller requires with the deep-sleep command; it rejects any
/// other value
const DEEP_SLEEP_UNLOCK: u8 = 0xA5;

/// Panel power state, tracked explicitly so calls outside the legal
/// lifecycle are rejected instead of corrupting the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PowerState {
    Uninitialized,
    Active,
    Asleep,
}

/// Display driver errors
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid geometry {width}x{height}: pixel count must be divisible by 8")]
    BadGeometry { width: u32, height: u32 },

    #[error("display not initialized")]
    NotInitialized,

    #[error("display is in deep sleep; init() is required to wake it")]
    Asleep,

    #[error("busy timeout: panel not ready within {0:?}")]
    BusyTimeout(Duration),
}

/// EPD7IN5V2 display driver over an abstract panel bus.
pub struct Epd7in5<B: PanelBus> {
    framer: Framer<B>,
    width: u32,
    height: u32,
    busy_timeout: Duration,
    state: PowerState,
}

impl<B: PanelBus> Epd7in5<B> {
    /// Create a driver over `bus`. Touches no hardware; `init` does.
    pub fn new(
        bus: B,
        width: u32,
        height: u32,
        busy_timeout: Duration,
    ) -> Result<Self, DisplayError> {
        if width == 0 || height == 0 || (width as u64 * height as u64) % 8 != 0 {
            return Err(DisplayError::BadGeometry { width, height });
        }

        Ok(Self {
            framer: Framer::new(bus),
            width,
            height,
            busy_timeout,
            state: PowerState::Uninitialized,
        })
    }

    /// Bytes in one frame plane.
    pub fn plane_len(&self) -> usize {
        (self.width as usize * self.height as usize) / 8
    }

    /// Power-on initialization.
    ///
    /// Hardware reset followed by the fixed register table. Later registers
    /// depend on the rails configured by the earlier ones; the order never
    /// changes and steps are never batched. Also the only legal way out of
    /// deep sleep.
    pub fn init(&mut self) -> Result<(), DisplayError> {
        tracing::info!("Initializing display ({}x{})", self.width, self.height);

        self.reset()?;

        // VGH=20V, VGL=-20V, VDH=15V, VDL=-15V
        self.framer
            .send_command_data(Command::PowerSetting, &[0x07, 0x07, 0x3F, 0x3F])?;

        self.framer.send_command(Command::PowerOn)?;
        thread::sleep(POWER_ON_DELAY);
        self.wait_until_idle()?;

        // KW mode, default scan direction
        self.framer.send_command_data(Command::PanelSetting, &[0x1F])?;

        let w = self.width as u16;
        let h = self.height as u16;
        self.framer.send_command_data(
            Command::ResolutionSetting,
            &[(w >> 8) as u8, w as u8, (h >> 8) as u8, h as u8],
        )?;

        self.framer.send_command_data(Command::DualSpi, &[0x00])?;

        self.framer
            .send_command_data(Command::VcomAndDataIntervalSetting, &[0x10, 0x07])?;

        self.framer.send_command_data(Command::TconSetting, &[0x22])?;

        self.state = PowerState::Active;
        tracing::info!("Display initialized");
        Ok(())
    }

    /// Push a packed 1-bit frame to the panel and refresh.
    ///
    /// The frame loads the second transmission plane. A frame whose length
    /// does not match the panel geometry is streamed as-is; scaling and
    /// cropping are the caller's job.
    pub fn display(&mut self, frame: &[u8]) -> Result<(), DisplayError> {
        self.ensure_active()?;

        if frame.len() != self.plane_len() {
            tracing::warn!(
                "Frame is {} bytes, panel plane is {} bytes",
                frame.len(),
                self.plane_len()
            );
        }

        tracing::info!("Sending frame ({} bytes)", frame.len());
        self.framer.send_command(Command::DataStartTransmission2)?;
        self.framer.send_data(frame)?;

        self.refresh()
    }

    /// Clear both frame planes to white and refresh.
    ///
    /// Both planes must be zeroed or the previous image ghosts through the
    /// next refresh. 0x00 is the fully-white erased pixel.
    pub fn clear(&mut self) -> Result<(), DisplayError> {
        self.ensure_active()?;

        tracing::info!("Clearing display");
        self.framer.send_command(Command::DataStartTransmission1)?;
        for _ in 0..self.plane_len() {
            self.framer.send_data(&[0x00])?;
        }

        self.framer.send_command(Command::DataStartTransmission2)?;
        for _ in 0..self.plane_len() {
            self.framer.send_data(&[0x00])?;
        }

        self.refresh()
    }

    /// Enter deep sleep. Terminal until the next `init`.
    pub fn sleep(&mut self) -> Result<(), DisplayError> {
        self.ensure_active()?;

        tracing::info!("Entering deep sleep");
        self.framer.send_command(Command::PowerOff)?;
        self.wait_until_idle()?;

        self.framer
            .send_command_data(Command::DeepSleep, &[DEEP_SLEEP_UNLOCK])?;

        self.state = PowerState::Asleep;
        Ok(())
    }

    /// Release the bus. Legal from any state.
    pub fn close(&mut self) -> Result<(), DisplayError> {
        self.framer.close()?;
        self.state = PowerState::Uninitialized;
        Ok(())
    }

    /// Hardware reset pulse. The hold times come from the vendor driver and
    /// must not be shortened.
    fn reset(&mut self) -> Result<(), DisplayError> {
        self.framer.write_pin(PinRole::Reset, Level::High)?;
        thread::sleep(RESET_HOLD);
        self.framer.write_pin(PinRole::Reset, Level::Low)?;
        thread::sleep(RESET_PULSE);
        self.framer.write_pin(PinRole::Reset, Level::High)?;
        thread::sleep(RESET_HOLD);
        Ok(())
    }

    /// Issue the refresh command and wait out the panel's update cycle.
    fn refresh(&mut self) -> Result<(), DisplayError> {
        self.framer.send_command(Command::DisplayRefresh)?;
        thread::sleep(REFRESH_DELAY);
        self.wait_until_idle()?;
        tracing::info!("Refresh complete");
        Ok(())
    }

    /// Block until the panel reports ready.
    ///
    /// The controller does not latch its status: the status-query command is
    /// re-issued before every sample of the busy pin. The pin reads low for
    /// the whole internal operation; ready is high.
    fn wait_until_idle(&mut self) -> Result<(), DisplayError> {
        let start = Instant::now();

        loop {
            self.framer.send_command(Command::GetStatus)?;
            if self.framer.read_pin(PinRole::Busy)? == Level::High {
                break;
            }
            if start.elapsed() >= self.busy_timeout {
                tracing::error!("Panel busy for {:?}, giving up", self.busy_timeout);
                return Err(DisplayError::BusyTimeout(self.busy_timeout));
            }
            thread::sleep(BUSY_POLL);
        }

        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 {
            tracing::debug!("Busy wait completed after {:?}", elapsed);
        }

        thread::sleep(BUSY_SETTLE);
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DisplayError> {
        match self.state {
            PowerState::Active => Ok(()),
            PowerState::Uninitialized => Err(DisplayError::NotInitialized),
            PowerState::Asleep => Err(DisplayError::Asleep),
        }
    }

    #[cfg(test)]
    fn bus(&self) -> &B {
        self.framer.bus()
    }
}

impl<B: PanelBus> Drop for Epd7in5<B> {
    fn drop(&mut self) {
        if self.state == PowerState::Active {
            let _ = self.sleep();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::bus::mock::{BusOp, MockBus, Tx};

    const TIMEOUT: Duration = Duration::from_millis(500);

    fn driver(bus: MockBus, width: u32, height: u32) -> Epd7in5<MockBus> {
        Epd7in5::new(bus, width, height, TIMEOUT).unwrap()
    }

    #[test]
    fn rejects_unpackable_geometry() {
        assert!(matches!(
            Epd7in5::new(MockBus::new(), 3, 3, TIMEOUT),
            Err(DisplayError::BadGeometry {
                width: 3,
                height: 3
            })
        ));
        assert!(matches!(
            Epd7in5::new(MockBus::new(), 0, 480, TIMEOUT),
            Err(DisplayError::BadGeometry { .. })
        ));
    }

    #[test]
    fn init_sends_documented_sequence() {
        let mut drv = driver(MockBus::new(), 800, 480);
        drv.init().unwrap();

        let opcodes: Vec<u8> = drv
            .bus()
            .commands()
            .into_iter()
            .filter(|op| *op != Command::GetStatus.opcode())
            .collect();
        assert_eq!(opcodes, vec![0x01, 0x04, 0x00, 0x61, 0x15, 0x50, 0x60]);

        assert_eq!(
            drv.bus().data(),
            vec![
                0x07, 0x07, 0x3F, 0x3F, // power setting
                0x1F, // panel setting
                0x03, 0x20, 0x01, 0xE0, // 800 x 480
                0x00, // dual SPI off
                0x10, 0x07, // VCOM and data interval
                0x22, // TCON
            ]
        );

        drv.close().unwrap();
    }

    #[test]
    fn init_encodes_geometry_in_resolution_setting() {
        let mut drv = driver(MockBus::new(), 640, 384);
        drv.init().unwrap();

        let txs = drv.bus().transactions(0);
        let pos = txs
            .iter()
            .position(|tx| *tx == Tx::Cmd(0x61))
            .expect("resolution setting sent");
        assert_eq!(txs[pos + 1], Tx::Data(vec![0x02, 0x80, 0x01, 0x80]));

        drv.close().unwrap();
    }

    #[test]
    fn clear_zeroes_both_planes() {
        let mut drv = driver(MockBus::new(), 8, 8);
        drv.init().unwrap();

        let start = drv.bus().ops.len();
        drv.clear().unwrap();

        let txs: Vec<Tx> = drv
            .bus()
            .transactions(start)
            .into_iter()
            .filter(|tx| *tx != Tx::Cmd(Command::GetStatus.opcode()))
            .collect();

        assert_eq!(txs[0], Tx::Cmd(0x10));
        for tx in &txs[1..9] {
            assert_eq!(*tx, Tx::Data(vec![0x00]));
        }
        assert_eq!(txs[9], Tx::Cmd(0x13));
        for tx in &txs[10..18] {
            assert_eq!(*tx, Tx::Data(vec![0x00]));
        }
        assert_eq!(txs[18], Tx::Cmd(0x12));
        assert_eq!(txs.len(), 19);

        // 2 * width * height / 8 zero bytes in total
        let zeros = txs
            .iter()
            .filter(|tx| matches!(tx, Tx::Data(bytes) if bytes == &vec![0x00]))
            .count();
        assert_eq!(zeros, 2 * 8 * 8 / 8);

        drv.close().unwrap();
    }

    #[test]
    fn display_streams_frame_then_refreshes() {
        let mut drv = driver(MockBus::new(), 8, 8);
        drv.init().unwrap();

        let frame = [0xF0, 0x0F, 0xAA, 0x55, 0x00, 0xFF, 0x81, 0x18];
        let start = drv.bus().ops.len();
        drv.display(&frame).unwrap();

        let txs: Vec<Tx> = drv
            .bus()
            .transactions(start)
            .into_iter()
            .filter(|tx| *tx != Tx::Cmd(Command::GetStatus.opcode()))
            .collect();
        assert_eq!(
            txs,
            vec![
                Tx::Cmd(0x13),
                Tx::Data(frame.to_vec()),
                Tx::Cmd(0x12),
            ]
        );

        drv.close().unwrap();
    }

    #[test]
    fn sleep_powers_off_then_unlocks_deep_sleep() {
        let mut drv = driver(MockBus::new(), 8, 8);
        drv.init().unwrap();

        let start = drv.bus().ops.len();
        drv.sleep().unwrap();

        let txs = drv.bus().transactions(start);
        assert_eq!(txs[0], Tx::Cmd(0x02));
        assert!(
            txs[1..txs.len() - 2]
                .iter()
                .all(|tx| *tx == Tx::Cmd(Command::GetStatus.opcode())),
            "only status polls between power-off and deep sleep"
        );
        assert_eq!(txs[txs.len() - 2], Tx::Cmd(0x07));
        assert_eq!(txs[txs.len() - 1], Tx::Data(vec![0xA5]));
    }

    #[test]
    fn busy_wait_requeries_status_before_every_read() {
        let mut drv = driver(MockBus::new().busy_for(2), 8, 8);
        drv.wait_until_idle().unwrap();

        // three polls: two busy reads, then the ready read
        let ops = &drv.bus().ops;
        assert_eq!(ops.len(), 3 * 5);
        for poll in ops.chunks(5) {
            assert_eq!(poll[0], BusOp::Pin(PinRole::DataSelect, Level::Low));
            assert_eq!(poll[1], BusOp::Pin(PinRole::ChipSelect, Level::Low));
            assert_eq!(poll[2], BusOp::Write(vec![Command::GetStatus.opcode()]));
            assert_eq!(poll[3], BusOp::Pin(PinRole::ChipSelect, Level::High));
            assert!(matches!(poll[4], BusOp::ReadPin(PinRole::Busy, _)));
        }

        // terminates on the first ready level
        assert_eq!(
            ops.last(),
            Some(&BusOp::ReadPin(PinRole::Busy, Level::High))
        );
    }

    #[test]
    fn busy_wait_times_out_on_stuck_panel() {
        let mut bus = MockBus::new();
        bus.busy_stuck = true;
        let mut drv = Epd7in5::new(bus, 8, 8, Duration::from_millis(50)).unwrap();

        assert!(matches!(
            drv.wait_until_idle(),
            Err(DisplayError::BusyTimeout(_))
        ));
    }

    #[test]
    fn operations_rejected_before_init() {
        let mut drv = driver(MockBus::new(), 8, 8);

        assert!(matches!(drv.display(&[0x00]), Err(DisplayError::NotInitialized)));
        assert!(matches!(drv.clear(), Err(DisplayError::NotInitialized)));
        assert!(matches!(drv.sleep(), Err(DisplayError::NotInitialized)));
    }

    #[test]
    fn operations_rejected_after_sleep() {
        let mut drv = driver(MockBus::new(), 8, 8);
        drv.init().unwrap();
        drv.sleep().unwrap();

        assert!(matches!(drv.display(&[0x00; 8]), Err(DisplayError::Asleep)));
        assert!(matches!(drv.clear(), Err(DisplayError::Asleep)));

        // init is the documented way back out of deep sleep
        drv.init().unwrap();
        drv.display(&[0x00; 8]).unwrap();

        drv.close().unwrap();
    }
}
