//! Gowin device session and register access

use alloc::boxed::Box;
use log::{debug, log_enabled, trace, Level};

use super::command::{
    CONFIG_DISABLE, CONFIG_ENABLE, NOOP, READ_IDCODE, READ_USERCODE, STATUS_REGISTER,
};
use super::quirks::Quirks;
use super::status::Status;
use crate::error::{Error, Result};
use crate::image::Image;
use crate::jtag::{JtagCable, TapState};
use crate::progress::Progress;
use crate::spi::ExternalFlashDriver;

/// Status register reads before [`Gowin::poll_flag`] gives up
pub const POLL_LIMIT: u32 = 100_000_000;

/// What a programming run targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramMode {
    /// Volatile configuration SRAM
    Sram,
    /// Embedded or external flash
    Flash,
}

/// An open programming session on one Gowin device
///
/// Built by [`Gowin::open`](super::Gowin::open), which validates the image
/// against the idcode read from the chain.
pub struct Gowin<C: JtagCable> {
    pub(crate) cable: C,
    pub(crate) idcode: u32,
    pub(crate) quirks: Quirks,
    pub(crate) mode: ProgramMode,
    pub(crate) external_flash: bool,
    pub(crate) verify: bool,
    pub(crate) unprotect: bool,
    pub(crate) poll_limit: u32,
    pub(crate) image: Option<Box<dyn Image>>,
    pub(crate) mcu_firmware: Option<Box<dyn Image>>,
    pub(crate) flash_driver: Option<Box<dyn ExternalFlashDriver>>,
    pub(crate) progress: Box<dyn Progress>,
}

/// Load `cmd` into the instruction register and let it settle
pub(crate) fn send_command(cable: &mut dyn JtagCable, cmd: u8) -> Result<()> {
    cable.shift_ir(&[cmd], 8)?;
    cable.toggle_clk(5)
}

impl<C: JtagCable> Gowin<C> {
    /// Idcode read when the session was opened
    pub fn idcode(&self) -> u32 {
        self.idcode
    }

    /// Quirks resolved from the idcode
    pub fn quirks(&self) -> &Quirks {
        &self.quirks
    }

    /// Whether flash writes go to the external SPI flash
    pub fn uses_external_flash(&self) -> bool {
        self.external_flash
    }

    /// Give the cable back
    pub fn into_cable(self) -> C {
        self.cable
    }

    /// Send one instruction
    pub fn send_command(&mut self, cmd: u8) -> Result<()> {
        send_command(&mut self.cable, cmd)
    }

    /// Read a 32-bit register selected by `cmd`
    pub fn read_reg32(&mut self, cmd: u8) -> Result<u32> {
        self.send_command(cmd)?;
        let tx = [0xFFu8; 4];
        let mut rx = [0u8; 4];
        self.cable
            .shift_dr(Some(&tx), Some(&mut rx), 32, TapState::RunTestIdle)?;
        Ok(u32::from_le_bytes(rx))
    }

    /// Read the idcode register
    pub fn read_idcode(&mut self) -> Result<u32> {
        self.read_reg32(READ_IDCODE)
    }

    /// Read the configuration status register
    pub fn read_status(&mut self) -> Result<Status> {
        Ok(Status::from_bits_retain(self.read_reg32(STATUS_REGISTER)?))
    }

    /// Read the usercode register
    pub fn read_usercode(&mut self) -> Result<u32> {
        self.read_reg32(READ_USERCODE)
    }

    /// Idle for `us` microseconds worth of TCK at the current frequency
    pub(crate) fn send_clk_us(&mut self, us: u32) -> Result<()> {
        let clocks = self.cable.clk_freq() as u64 * us as u64 / 1_000_000;
        self.cable.toggle_clk(u32::try_from(clocks).unwrap_or(u32::MAX))
    }

    /// Re-read the status register until `(status & mask) == expected`
    pub fn poll_flag(&mut self, mask: Status, expected: Status) -> Result<()> {
        for _ in 0..self.poll_limit {
            let status = self.read_status()?;
            trace!(
                "poll: 0x{:08x} mask 0x{:08x} expected 0x{:08x}",
                status.bits(),
                mask.bits(),
                expected.bits()
            );
            if status & mask == expected {
                return Ok(());
            }
        }
        debug!("poll timeout: mask 0x{:08x}", mask.bits());
        Err(Error::Timeout)
    }

    /// Open the configuration gate
    pub fn enable_config(&mut self) -> Result<()> {
        self.send_command(CONFIG_ENABLE)?;
        self.poll_flag(Status::SYSTEM_EDIT_MODE, Status::SYSTEM_EDIT_MODE)
    }

    /// Close the configuration gate
    pub fn disable_config(&mut self) -> Result<()> {
        self.send_command(CONFIG_DISABLE)?;
        self.send_command(NOOP)?;
        self.poll_flag(Status::SYSTEM_EDIT_MODE, Status::empty())
    }

    /// Log the status register and its flags at debug level
    pub(crate) fn dump_status(&mut self, when: &str) -> Result<()> {
        if !log_enabled!(Level::Debug) {
            return Ok(());
        }
        let status = self.read_status()?;
        debug!("{}: status 0x{:08x}", when, status.bits());
        for name in status.describe() {
            debug!("\t{}", name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gowin::program::ProgramConfig;
    use crate::gowin::testing::{Event, ScriptedCable};

    fn session(cable: ScriptedCable) -> Gowin<ScriptedCable> {
        Gowin::open(cable, ProgramConfig::new(ProgramMode::Sram).poll_limit(16)).unwrap()
    }

    #[test]
    fn test_send_command() {
        let mut fpga = session(ScriptedCable::new(0x0900281B));
        fpga.send_command(0x3C).unwrap();
        assert_eq!(fpga.cable.events, [Event::Ir(0x3C), Event::Clk(5)]);
    }

    #[test]
    fn test_read_reg32_little_endian() {
        let mut cable = ScriptedCable::new(0x0900281B);
        cable.script(READ_USERCODE, &[0x1234_5678, 0, 0xFFFF_FFFF]);
        let mut fpga = session(cable);

        assert_eq!(fpga.read_usercode().unwrap(), 0x1234_5678);
        assert_eq!(fpga.read_usercode().unwrap(), 0);
        assert_eq!(fpga.read_usercode().unwrap(), 0xFFFF_FFFF);
        assert_eq!(fpga.cable.dr_writes[0], [0xFF; 4]);
        assert_eq!(fpga.cable.dr_bits, [32, 32, 32]);
    }

    #[test]
    fn test_read_status() {
        let mut cable = ScriptedCable::new(0x0900281B);
        cable.script(STATUS_REGISTER, &[0x0001_2000]);
        let mut fpga = session(cable);

        let status = fpga.read_status().unwrap();
        assert_eq!(status, Status::DONE_FINAL | Status::POR);
    }

    #[test]
    fn test_poll_flag_succeeds() {
        let mut cable = ScriptedCable::new(0x0900281B);
        cable.script(STATUS_REGISTER, &[0, 0, 0x80]);
        let mut fpga = session(cable);

        fpga.poll_flag(Status::SYSTEM_EDIT_MODE, Status::SYSTEM_EDIT_MODE)
            .unwrap();
        assert_eq!(fpga.cable.dr_bits.len(), 3);
    }

    #[test]
    fn test_poll_flag_timeout() {
        let mut cable = ScriptedCable::new(0x0900281B);
        cable.script(STATUS_REGISTER, &[0]);
        let mut fpga = session(cable);

        let err = fpga
            .poll_flag(Status::MEMORY_ERASE, Status::MEMORY_ERASE)
            .unwrap_err();
        assert_eq!(err, Error::Timeout);
        assert_eq!(fpga.cable.dr_bits.len(), 16);
    }

    #[test]
    fn test_config_gate() {
        let mut cable = ScriptedCable::new(0x0900281B);
        cable.script(STATUS_REGISTER, &[0x80, 0x80, 0x00]);
        let mut fpga = session(cable);

        fpga.enable_config().unwrap();
        fpga.disable_config().unwrap();
        assert_eq!(
            fpga.cable.ir_writes,
            [
                CONFIG_ENABLE,
                STATUS_REGISTER,
                CONFIG_DISABLE,
                NOOP,
                STATUS_REGISTER,
                STATUS_REGISTER
            ]
        );
    }

    #[test]
    fn test_send_clk_us() {
        let mut cable = ScriptedCable::new(0x0900281B);
        cable.freq = 2_500_000;
        let mut fpga = session(cable);

        fpga.send_clk_us(150_000).unwrap();
        fpga.send_clk_us(16).unwrap();
        assert_eq!(fpga.cable.events, [Event::Clk(375_000), Event::Clk(40)]);
    }
}
