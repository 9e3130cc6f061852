//! Embedded flash erase and page programming

use log::{debug, error, info};

use super::command::{CONFIG_ENABLE, EFLASH_ERASE, EF_PROGRAM, NOOP, RELOAD};
use super::device::Gowin;
use super::status::Status;
use crate::error::{EraseStage, Error, Result, WriteStage};
use crate::image::Image;
use crate::jtag::{JtagCable, TapState};
use crate::progress::Stage;

/// Bytes per embedded flash page
pub const PAGE_SIZE: usize = 256;

/// Written over the first word of address 0 so the device boots from flash
pub const AUTOBOOT_SIGNATURE: [u8; 4] = *b"GW1N";

/// Word address of the GW1NSR-4C MCU firmware
pub const MCU_FIRMWARE_OFFSET: u32 = 0x380;

const ERASE_ATTEMPTS: usize = 100;

impl<C: JtagCable> Gowin<C> {
    /// Erase the embedded flash, clearing SRAM first if a design is running
    pub fn erase_flash(&mut self) -> Result<()> {
        if self.read_status()?.contains(Status::GOWIN_VLD) {
            self.erase_sram()?;
        }

        info!("Erase FLASH");
        self.progress.start(Stage::EraseFlash, ERASE_ATTEMPTS);
        let result = self.erase_flash_attempts();
        self.progress.finish(result.is_ok());
        result?;

        // The loop may also have run out of attempts
        if self.read_status()?.contains(Status::DONE_FINAL) {
            error!("Erase FLASH: FAIL");
            return Err(Error::EraseFailed(EraseStage::Flash));
        }
        info!("Erase FLASH: DONE");
        Ok(())
    }

    fn erase_flash_attempts(&mut self) -> Result<()> {
        for attempt in 1..=ERASE_ATTEMPTS {
            self.dump_status("before erase flash")?;
            self.enable_config()?;
            self.send_command(EFLASH_ERASE)?;
            self.cable.set_state(TapState::RunTestIdle)?;

            // Raw TAP walk, not a DR scan: the pulse count is what erases
            for _ in 0..self.quirks.erase_pulses {
                self.cable.set_state(TapState::ShiftDr)?;
                self.cable.toggle_clk(32)?;
                self.cable.set_state(TapState::RunTestIdle)?;
            }

            self.send_clk_us(150_000)?;
            self.disable_config()?;
            self.cable.flush()?;
            self.cable.sleep_ms(500);

            let status = self.read_status()?;
            debug!("erase attempt {}: status 0x{:08x}", attempt, status.bits());
            self.progress.advance(attempt);
            if !status.contains(Status::DONE_FINAL) {
                break;
            }
        }
        Ok(())
    }

    /// Program `image` into the embedded flash starting at word address
    /// `page_offset`, then reload the device from flash
    pub fn write_flash(&mut self, page_offset: u32, image: &dyn Image) -> Result<()> {
        info!("Write FLASH");
        self.dump_status("before write flash")?;

        let data = image.data();
        let length = (image.bit_len() / 8).min(data.len());

        self.progress.start(Stage::WriteFlash, length);
        let result = self.write_flash_pages(page_offset, &data[..length]);
        self.progress.finish(result.is_ok());
        result?;

        if let Err(e) = self.disable_config() {
            error!("Write FLASH: failed to disable configuration");
            return Err(e);
        }

        self.dump_status("after write flash")?;
        self.send_command(RELOAD)?;
        self.send_command(NOOP)?;
        self.dump_status("after reload")?;
        self.cable.flush()?;
        self.cable.sleep_ms(500);

        self.dump_status("after flush")?;
        if self.read_status()?.contains(Status::DONE_FINAL) {
            info!("Write FLASH: DONE");
            Ok(())
        } else {
            error!("Write FLASH: FAIL");
            Err(Error::WriteFailed(WriteStage::Flash))
        }
    }

    fn write_flash_pages(&mut self, page_offset: u32, data: &[u8]) -> Result<()> {
        let (word_delay, page_delay) = if self.quirks.long_flash_timing {
            (32, 2400)
        } else {
            (16, 6)
        };

        let mut page = [0u8; PAGE_SIZE];
        for (index, chunk) in data.chunks(PAGE_SIZE).enumerate() {
            let off = index * PAGE_SIZE;
            if chunk.len() < PAGE_SIZE {
                page.fill(0xFF);
            }
            page[..chunk.len()].copy_from_slice(chunk);

            let addr = (off / 4) as u32 + page_offset;
            if addr == 0 {
                page[..4].copy_from_slice(&AUTOBOOT_SIGNATURE);
            } else {
                self.send_clk_us(16)?;
            }

            self.send_command(CONFIG_ENABLE)?;
            self.send_command(NOOP)?;
            self.send_command(EF_PROGRAM)?;

            self.cable.shift_dr(
                Some(&addr.to_le_bytes()),
                None,
                32,
                TapState::RunTestIdle,
            )?;
            self.send_clk_us(16)?;

            for word in page.chunks_exact(4) {
                let word = u32::from_le_bytes([word[0], word[1], word[2], word[3]]).swap_bytes();
                self.cable.shift_dr(
                    Some(&word.to_le_bytes()),
                    None,
                    32,
                    TapState::RunTestIdle,
                )?;
                self.send_clk_us(word_delay)?;
            }
            self.send_clk_us(page_delay)?;

            self.progress.advance(off + chunk.len());
        }
        Ok(())
    }
}
