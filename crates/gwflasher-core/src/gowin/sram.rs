//! Volatile SRAM configuration

use log::{error, info};

use super::command::{
    CONFIG_DISABLE, CONFIG_ENABLE, ERASE_SRAM, INIT_ADDR, NOOP, SRAM_CHECKSUM_END,
    SRAM_CHECKSUM_START, XFER_DONE, XFER_WRITE,
};
use super::device::Gowin;
use super::status::Status;
use crate::error::{EraseStage, Error, Result, WriteStage};
use crate::image::Image;
use crate::jtag::{JtagCable, TapState};
use crate::progress::Stage;

/// Bits shifted per DR scan while loading SRAM
pub const SRAM_CHUNK_BITS: usize = 524_288;

impl<C: JtagCable> Gowin<C> {
    /// Clear the configuration SRAM
    ///
    /// Fails if the device still reports DONE_FINAL afterwards.
    pub fn erase_sram(&mut self) -> Result<()> {
        info!("Erase SRAM");
        self.dump_status("before erase sram")?;

        self.enable_config()?;
        self.send_command(ERASE_SRAM)?;
        self.send_command(NOOP)?;

        // Completion is signalled by MEMORY_ERASE, not by a delay
        self.poll_flag(Status::MEMORY_ERASE, Status::MEMORY_ERASE)?;

        self.send_command(XFER_DONE)?;
        self.send_command(NOOP)?;
        self.disable_config()?;

        self.dump_status("after erase sram")?;
        if self.read_status()?.contains(Status::DONE_FINAL) {
            error!("Erase SRAM: FAIL");
            return Err(Error::EraseFailed(EraseStage::Sram));
        }
        info!("Erase SRAM: DONE");
        Ok(())
    }

    /// Stream `image` into SRAM and close with its checksum
    pub fn write_sram(&mut self, image: &dyn Image) -> Result<()> {
        info!("Load SRAM");
        self.dump_status("before write sram")?;

        self.send_command(CONFIG_ENABLE)?;
        self.send_command(INIT_ADDR)?;
        self.send_command(XFER_WRITE)?;

        let data = image.data();
        let total = image.bit_len().min(data.len() * 8);
        self.progress.start(Stage::LoadSram, total);

        let mut remains = total;
        let mut offset = 0;
        while remains > 0 {
            let (bits, end_state) = if remains > SRAM_CHUNK_BITS {
                (SRAM_CHUNK_BITS, TapState::ShiftDr)
            } else {
                (remains, TapState::RunTestIdle)
            };
            let end = (offset + bits.div_ceil(8)).min(data.len());
            if let Err(e) = self
                .cable
                .shift_dr(Some(&data[offset..end]), None, bits, end_state)
            {
                self.progress.finish(false);
                return Err(e);
            }
            remains -= bits;
            offset += bits / 8;
            self.progress.advance(total - remains);
        }
        self.progress.finish(true);

        let checksum = image.checksum() as u32;
        self.send_command(SRAM_CHECKSUM_START)?;
        self.cable.shift_dr(
            Some(&checksum.to_le_bytes()),
            None,
            32,
            TapState::RunTestIdle,
        )?;
        self.send_command(SRAM_CHECKSUM_END)?;

        self.send_command(CONFIG_DISABLE)?;
        self.send_command(NOOP)?;

        self.dump_status("after write sram")?;
        if self.read_status()?.contains(Status::DONE_FINAL) {
            info!("Load SRAM: DONE");
            Ok(())
        } else {
            error!("Load SRAM: FAIL");
            Err(Error::WriteFailed(WriteStage::Sram))
        }
    }
}
