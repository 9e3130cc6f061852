//! Session setup and the top-level programming flows

use alloc::boxed::Box;
use alloc::vec;
use log::{error, info, warn};

use super::bscan_spi::BscanSpi;
use super::command::{
    CONFIG_DISABLE, NOOP, RELOAD, SPI_MODE_BSCAN, SWITCH_TO_MCU_JTAG, XFER_DONE,
};
use super::crc::CrcCheck;
use super::device::{Gowin, ProgramMode, POLL_LIMIT};
use super::flash::MCU_FIRMWARE_OFFSET;
use super::quirks::Quirks;
use super::status::Status;
use crate::error::{Error, Result};
use crate::image::{parse_hex_u32, Image, ImageKind};
use crate::jtag::{JtagCable, TapState};
use crate::progress::{NoProgress, Progress};
use crate::spi::{transfer_len, ExternalFlashDriver, SpiInterface, WriteOptions};

/// TCK used for embedded flash programming
pub const FLASH_CLK_HZ: u32 = 2_500_000;
/// TCK used while driving an external SPI flash
pub const EXT_FLASH_CLK_HZ: u32 = 10_000_000;

/// Operations every programmable target offers
pub trait Programmable {
    /// Erase the memory selected by the programming mode
    fn erase(&mut self) -> Result<()>;

    /// Write the configured image, `offset` is the byte offset in external
    /// flash and is ignored otherwise
    fn program(&mut self, offset: u32) -> Result<CrcCheck>;

    /// Reload the configuration
    fn reset(&mut self) -> Result<()>;
}

/// Everything needed to open a [`Gowin`] session
pub struct ProgramConfig {
    mode: ProgramMode,
    external_flash: bool,
    verify: bool,
    unprotect: bool,
    poll_limit: u32,
    image: Option<Box<dyn Image>>,
    mcu_firmware: Option<Box<dyn Image>>,
    flash_driver: Option<Box<dyn ExternalFlashDriver>>,
    progress: Box<dyn Progress>,
}

impl ProgramConfig {
    /// Empty configuration for `mode`, useful for status queries and erase
    pub fn new(mode: ProgramMode) -> Self {
        Self {
            mode,
            external_flash: false,
            verify: false,
            unprotect: false,
            poll_limit: POLL_LIMIT,
            image: None,
            mcu_firmware: None,
            flash_driver: None,
            progress: Box::new(NoProgress),
        }
    }

    /// Load `image` into SRAM
    pub fn sram(image: Box<dyn Image>) -> Self {
        Self::new(ProgramMode::Sram).image(image)
    }

    /// Write `image` to flash
    pub fn flash(image: Box<dyn Image>) -> Self {
        Self::new(ProgramMode::Flash).image(image)
    }

    /// Set the image to program
    pub fn image(mut self, image: Box<dyn Image>) -> Self {
        self.image = Some(image);
        self
    }

    /// Target the external SPI flash instead of the embedded one
    pub fn external_flash(mut self, external: bool) -> Self {
        self.external_flash = external;
        self
    }

    /// Ask the external flash driver to read back what it wrote
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Let the external flash driver lift write protection first
    pub fn unprotect_flash(mut self, unprotect: bool) -> Self {
        self.unprotect = unprotect;
        self
    }

    /// GW1NSR-4C MCU firmware written after the bitstream
    pub fn mcu_firmware(mut self, firmware: Box<dyn Image>) -> Self {
        self.mcu_firmware = Some(firmware);
        self
    }

    /// Chip driver used for external SPI flash
    pub fn flash_driver(mut self, driver: Box<dyn ExternalFlashDriver>) -> Self {
        self.flash_driver = Some(driver);
        self
    }

    /// Progress sink
    pub fn progress(mut self, progress: Box<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    /// Override [`POLL_LIMIT`]
    pub fn poll_limit(mut self, limit: u32) -> Self {
        self.poll_limit = limit;
        self
    }
}

impl<C: JtagCable> Gowin<C> {
    /// Identify the device on `cable` and check `config` against it
    ///
    /// Only the idcode is read, nothing is written to the device.
    pub fn open(mut cable: C, config: ProgramConfig) -> Result<Self> {
        let idcode = cable.read_idcode()?;
        let quirks = Quirks::for_idcode(idcode);
        info!("Found {} (idcode 0x{:08x})", quirks.family, idcode);

        if let Some(image) = config.image.as_deref() {
            match image.kind() {
                ImageKind::Bitstream => {
                    let declared = image
                        .header("idcode")
                        .and_then(parse_hex_u32)
                        .ok_or(Error::MissingIdcode)?;
                    if declared & 0x0FFF_FFFF != idcode {
                        error!(
                            "mismatch between target's idcode and bitstream idcode: \
                             bitstream has 0x{:08X}, hardware requires 0x{:08X}",
                            declared, idcode
                        );
                        return Err(Error::IdcodeMismatch {
                            image: declared,
                            device: idcode,
                        });
                    }
                }
                ImageKind::Raw if !config.external_flash => {
                    return Err(Error::IncompatibleFormat);
                }
                ImageKind::Raw => {}
            }
        }

        if config.mcu_firmware.is_some() && !quirks.mcu_firmware {
            return Err(Error::McuFirmwareUnsupported);
        }

        let external_flash = config.external_flash || quirks.external_flash_only;

        Ok(Self {
            cable,
            idcode,
            quirks,
            mode: config.mode,
            external_flash,
            verify: config.verify,
            unprotect: config.unprotect,
            poll_limit: config.poll_limit,
            image: config.image,
            mcu_firmware: config.mcu_firmware,
            flash_driver: config.flash_driver,
            progress: config.progress,
        })
    }

    /// Hand the JTAG chain to the embedded Cortex-M3
    pub fn connect_jtag_to_mcu(&mut self) -> Result<()> {
        self.send_command(SWITCH_TO_MCU_JTAG)
    }

    fn program_sram(&mut self, image: &dyn Image) -> Result<CrcCheck> {
        self.dump_status("before program sram")?;

        if self.quirks.stuck_bad_command_workaround {
            // BAD_COMMAND stays set after power-up until the device is
            // reloaded and idles for a while
            self.reset()?;
            self.cable.set_state(TapState::RunTestIdle)?;
            self.cable.toggle_clk(1_000_000)?;
        }

        self.erase_sram()?;
        self.write_sram(image)?;

        let crc = self.verify_crc(image)?;
        self.dump_status("after program sram")?;
        Ok(crc)
    }

    fn program_flash(&mut self, image: &dyn Image) -> Result<CrcCheck> {
        self.cable.set_clk_freq(FLASH_CLK_HZ)?;

        // Leave any previous mode before checking the device state
        self.send_command(CONFIG_DISABLE)?;
        self.send_command(0x00)?;
        self.cable.set_state(TapState::TestLogicReset)?;

        let status = self.read_status()?;
        if !status.intersects(Status::GOWIN_VLD | Status::POR) {
            error!("Either GOWIN_VLD or POR should be set, aborting");
            self.dump_status("before program flash")?;
            return Err(Error::DeviceNotReady(status.bits()));
        }

        self.erase_flash()?;
        self.write_flash(0, image)?;

        if let Some(firmware) = self.mcu_firmware.take() {
            let result = self.write_flash(MCU_FIRMWARE_OFFSET, firmware.as_ref());
            self.mcu_firmware = Some(firmware);
            result?;
        }

        if self.verify {
            warn!("writing verification not supported");
        }

        let crc = self.verify_crc(image)?;
        self.dump_status("after program flash")?;
        Ok(crc)
    }

    fn program_ext_flash(&mut self, offset: u32, image: &dyn Image) -> Result<CrcCheck> {
        let mut driver = self
            .flash_driver
            .take()
            .ok_or(Error::NoExternalFlashDriver)?;
        let result = self.program_ext_flash_with(driver.as_mut(), offset, image);
        self.flash_driver = Some(driver);
        result?;
        Ok(CrcCheck::Skipped)
    }

    fn program_ext_flash_with(
        &mut self,
        driver: &mut dyn ExternalFlashDriver,
        offset: u32,
        image: &dyn Image,
    ) -> Result<()> {
        self.cable.set_clk_freq(EXT_FLASH_CLK_HZ)?;

        if let Err(e) = self.enable_config() {
            error!("failed to enable configuration");
            return Err(e);
        }
        self.erase_sram()?;

        self.send_command(XFER_DONE)?;
        self.send_command(NOOP)?;

        let passthrough = self.quirks.spi.is_passthrough();
        if passthrough {
            self.disable_config()?;
            self.send_command(NOOP)?;
        } else {
            self.send_command(SPI_MODE_BSCAN)?;
        }

        let data = image.data();
        let length = (image.bit_len() / 8).min(data.len());
        let options = WriteOptions {
            verify: self.verify,
            unprotect: self.unprotect,
        };
        driver.program(self, offset, &data[..length], options)?;

        if !passthrough {
            self.disable_config()?;
        }
        self.reset()
    }

    fn verify_crc(&mut self, image: &dyn Image) -> Result<CrcCheck> {
        if self.quirks.skip_checksum {
            return Ok(CrcCheck::Skipped);
        }
        self.check_crc(image)
    }
}

impl<C: JtagCable> Programmable for Gowin<C> {
    fn erase(&mut self) -> Result<()> {
        match self.mode {
            ProgramMode::Sram => self.erase_sram(),
            ProgramMode::Flash if self.external_flash => {
                Err(Error::Unsupported("external flash erase"))
            }
            ProgramMode::Flash if self.quirks.flash_write_unsupported => {
                Err(Error::Unsupported("flash erase on this family"))
            }
            ProgramMode::Flash => {
                self.cable.set_clk_freq(FLASH_CLK_HZ)?;
                self.erase_flash()
            }
        }
    }

    fn program(&mut self, offset: u32) -> Result<CrcCheck> {
        let Some(image) = self.image.take() else {
            return Ok(CrcCheck::Skipped);
        };

        let result = match self.mode {
            ProgramMode::Flash if self.quirks.flash_write_unsupported => {
                error!("flash programming is not supported on {}", self.quirks.family);
                Err(Error::Unsupported("flash programming on this family"))
            }
            ProgramMode::Flash if self.external_flash => {
                self.program_ext_flash(offset, image.as_ref())
            }
            ProgramMode::Flash => self.program_flash(image.as_ref()),
            ProgramMode::Sram => self.program_sram(image.as_ref()),
        };

        self.image = Some(image);
        result
    }

    fn reset(&mut self) -> Result<()> {
        self.send_command(RELOAD)?;
        self.send_command(NOOP)
    }
}

impl<C: JtagCable> SpiInterface for Gowin<C> {
    fn spi_put_cmd(&mut self, cmd: u8, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()> {
        let len = transfer_len(tx, rx.as_deref());
        let mut jtx = vec![0u8; len + 1];
        jtx[0] = cmd;
        if let Some(tx) = tx {
            jtx[1..].copy_from_slice(tx);
        }

        match rx {
            Some(rx) => {
                let mut jrx = vec![0u8; len + 1];
                self.spi_put(Some(&jtx), Some(&mut jrx))?;
                let n = rx.len().min(len);
                rx[..n].copy_from_slice(&jrx[1..=n]);
                Ok(())
            }
            None => self.spi_put(Some(&jtx), None),
        }
    }

    fn spi_put(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()> {
        let spi = self.quirks.spi;
        spi.transfer(&mut self.cable, tx, rx)
    }

    fn spi_wait(
        &mut self,
        cmd: u8,
        mask: u8,
        expected: u8,
        timeout: u32,
        verbose: bool,
    ) -> Result<()> {
        let spi = self.quirks.spi;
        spi.wait(&mut self.cable, cmd, mask, expected, timeout, verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gowin::command::{CONFIG_ENABLE, ERASE_SRAM, READ_USERCODE, STATUS_REGISTER};
    use crate::gowin::testing::{Event, ScriptedCable};
    use crate::image::{Bitstream, RawImage};

    fn bitstream(idcode: &str) -> Box<dyn Image> {
        Box::new(Bitstream::new(vec![0; 8]).with_header("idcode", idcode))
    }

    #[test]
    fn test_open_matching_idcode() {
        let cable = ScriptedCable::new(0x0900281B);
        let fpga = Gowin::open(cable, ProgramConfig::sram(bitstream("0900281B"))).unwrap();
        assert_eq!(fpga.idcode(), 0x0900281B);
        assert_eq!(fpga.quirks().erase_pulses, 65);
        assert!(fpga.cable.events.is_empty());
    }

    #[test]
    fn test_open_masks_version_nibble() {
        let cable = ScriptedCable::new(0x0900281B);
        assert!(Gowin::open(cable, ProgramConfig::sram(bitstream("0x1900281B"))).is_ok());
    }

    #[test]
    fn test_open_idcode_mismatch() {
        let cable = ScriptedCable::new(0x0900281B);
        let err = Gowin::open(cable, ProgramConfig::sram(bitstream("0100381B")))
            .err()
            .unwrap();
        assert_eq!(
            err,
            Error::IdcodeMismatch {
                image: 0x0100381B,
                device: 0x0900281B
            }
        );
    }

    #[test]
    fn test_open_missing_idcode() {
        let cable = ScriptedCable::new(0x0900281B);
        let image = Box::new(Bitstream::new(vec![0; 4]));
        let err = Gowin::open(cable, ProgramConfig::sram(image)).err().unwrap();
        assert_eq!(err, Error::MissingIdcode);
    }

    #[test]
    fn test_open_raw_needs_external_flash() {
        let raw = || Box::new(RawImage::new(vec![0; 4])) as Box<dyn Image>;
        let err = Gowin::open(ScriptedCable::new(0x0000081B), ProgramConfig::flash(raw()))
            .err()
            .unwrap();
        assert_eq!(err, Error::IncompatibleFormat);

        let fpga = Gowin::open(
            ScriptedCable::new(0x0000081B),
            ProgramConfig::flash(raw()).external_flash(true),
        )
        .unwrap();
        assert!(fpga.uses_external_flash());
    }

    #[test]
    fn test_open_mcu_firmware() {
        let err = Gowin::open(
            ScriptedCable::new(0x0100381B),
            ProgramConfig::flash(bitstream("0100381B")).mcu_firmware(bitstream("0")),
        )
        .err()
        .unwrap();
        assert_eq!(err, Error::McuFirmwareUnsupported);

        assert!(Gowin::open(
            ScriptedCable::new(0x0100981B),
            ProgramConfig::flash(bitstream("0100981B")).mcu_firmware(bitstream("0")),
        )
        .is_ok());
    }

    #[test]
    fn test_external_flash_forced() {
        let fpga = Gowin::open(
            ScriptedCable::new(0x0001281B),
            ProgramConfig::flash(bitstream("0001281B")),
        )
        .unwrap();
        assert!(fpga.uses_external_flash());
    }

    #[test]
    fn test_program_without_image() {
        let mut fpga =
            Gowin::open(ScriptedCable::new(0x0900281B), ProgramConfig::new(ProgramMode::Flash))
                .unwrap();
        assert_eq!(fpga.program(0).unwrap(), CrcCheck::Skipped);
        assert!(fpga.cable.events.is_empty());
    }

    #[test]
    fn test_program_flash_unsupported_family() {
        let mut fpga = Gowin::open(
            ScriptedCable::new(0x0001081B),
            ProgramConfig::flash(bitstream("0001081B")),
        )
        .unwrap();
        assert_eq!(
            fpga.program(0).unwrap_err(),
            Error::Unsupported("flash programming on this family")
        );
    }

    #[test]
    fn test_program_ext_flash_without_driver() {
        let mut fpga = Gowin::open(
            ScriptedCable::new(0x0000081B),
            ProgramConfig::flash(bitstream("0000081B")),
        )
        .unwrap();
        assert_eq!(fpga.program(0).unwrap_err(), Error::NoExternalFlashDriver);
        assert!(fpga.cable.events.is_empty());
    }

    #[test]
    fn test_program_flash_device_not_ready() {
        let mut cable = ScriptedCable::new(0x0100381B);
        cable.script(STATUS_REGISTER, &[0]);
        let mut fpga = Gowin::open(cable, ProgramConfig::flash(bitstream("0100381B"))).unwrap();

        assert_eq!(fpga.program(0).unwrap_err(), Error::DeviceNotReady(0));
        assert_eq!(fpga.cable.freq, FLASH_CLK_HZ);
        assert_eq!(fpga.cable.ir_writes[..2], [CONFIG_DISABLE, 0x00]);
        assert!(fpga
            .cable
            .events
            .contains(&Event::State(TapState::TestLogicReset)));
    }

    #[test]
    fn test_program_sram_gw5a_workaround() {
        let edit = Status::SYSTEM_EDIT_MODE.bits();
        let erased = Status::MEMORY_ERASE.bits();
        let done = Status::DONE_FINAL.bits();
        let mut cable = ScriptedCable::new(0x0001281B);
        cable.script(STATUS_REGISTER, &[edit, edit | erased, 0, 0, done]);
        cable.script(READ_USERCODE, &[0]);
        let mut fpga = Gowin::open(cable, ProgramConfig::sram(bitstream("0001281B")))
            .unwrap();

        assert_eq!(fpga.program(0).unwrap(), CrcCheck::Skipped);
        assert_eq!(fpga.cable.ir_writes[..3], [RELOAD, NOOP, CONFIG_ENABLE]);
        assert!(fpga.cable.events.contains(&Event::Clk(1_000_000)));
        assert!(fpga.cable.ir_writes.contains(&ERASE_SRAM));
        assert!(!fpga.cable.ir_writes.contains(&READ_USERCODE));
    }

    #[test]
    fn test_erase_external_flash_unsupported() {
        let mut fpga = Gowin::open(
            ScriptedCable::new(0x0000081B),
            ProgramConfig::new(ProgramMode::Flash),
        )
        .unwrap();
        assert!(matches!(fpga.erase(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_reset_and_mcu_switch() {
        let mut fpga =
            Gowin::open(ScriptedCable::new(0x0100981B), ProgramConfig::new(ProgramMode::Sram))
                .unwrap();
        fpga.reset().unwrap();
        fpga.connect_jtag_to_mcu().unwrap();
        assert_eq!(fpga.cable.ir_writes, [RELOAD, NOOP, SWITCH_TO_MCU_JTAG]);
    }
}
