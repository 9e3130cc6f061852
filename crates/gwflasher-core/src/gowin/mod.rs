//! Gowin FPGA programming over JTAG
//!
//! A [`Gowin`] session owns the cable and the image. It is opened with a
//! [`ProgramConfig`], which is checked against the idcode on the chain, and
//! driven through the [`Programmable`] trait:
//!
//! - SRAM mode erases the configuration SRAM and streams the bitstream in
//! - flash mode erases and programs the embedded flash page by page, or
//!   hands an [`ExternalFlashDriver`](crate::spi::ExternalFlashDriver) a
//!   SPI bus tunnelled through boundary-scan
//!
//! Per-family differences live in [`Quirks`].

mod bscan_spi;
pub mod command;
mod crc;
mod device;
mod flash;
mod program;
mod quirks;
mod sram;
mod status;

#[cfg(test)]
mod testing;

pub use bscan_spi::{Bitbang, BscanSpi, ShiftRegister, SpiEncoding, SpiPins};
pub use crc::CrcCheck;
pub use device::{Gowin, ProgramMode, POLL_LIMIT};
pub use flash::{AUTOBOOT_SIGNATURE, MCU_FIRMWARE_OFFSET, PAGE_SIZE};
pub use program::{ProgramConfig, Programmable, EXT_FLASH_CLK_HZ, FLASH_CLK_HZ};
pub use quirks::{Family, Quirks};
pub use sram::SRAM_CHUNK_BITS;
pub use status::Status;
