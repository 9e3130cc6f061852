//! Byte-level SPI transport
//!
//! Gowin devices without a usable direct SPI mode expose the external SPI
//! flash through JTAG boundary-scan. This module defines the transport that
//! a flash-chip driver rides on ([`SpiInterface`]) and the driver hook the
//! programmer calls when writing an external flash ([`ExternalFlashDriver`]).
//!
//! Chip-level commands (JEDEC ID, sector erase, page program, ...) are the
//! driver's business; the transport only moves bytes and polls status.

use crate::error::Result;

/// SPI master transport
///
/// Every call is a complete transaction: chip select is asserted before the
/// first byte and released after the last one.
pub trait SpiInterface {
    /// Send `cmd` followed by `tx` (or zeros when `None`)
    ///
    /// When `rx` is given it receives the bytes clocked in after `cmd`, so
    /// its length sets the transfer length when `tx` is `None`.
    fn spi_put_cmd(&mut self, cmd: u8, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()>;

    /// Send `tx` and optionally capture the same number of bytes into `rx`
    ///
    /// At least one of `tx` / `rx` must be given; if both are, they must
    /// have the same length.
    fn spi_put(&mut self, tx: Option<&[u8]>, rx: Option<&mut [u8]>) -> Result<()>;

    /// Send `cmd` then read status bytes until `(status & mask) == expected`
    ///
    /// Gives up with [`Error::SpiTimeout`](crate::Error::SpiTimeout) after
    /// `timeout` reads. With `verbose` every sample is logged.
    fn spi_wait(&mut self, cmd: u8, mask: u8, expected: u8, timeout: u32, verbose: bool)
        -> Result<()>;
}

/// How an [`ExternalFlashDriver`] should write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Read the data back after programming
    pub verify: bool,
    /// Clear the block protection bits before erasing
    pub unprotect: bool,
}

/// Chip-level driver for an external SPI flash
///
/// Implementations issue the flash command set over the transport handed to
/// them. The programmer only brackets the call with the FPGA-side setup.
pub trait ExternalFlashDriver {
    /// Erase the needed sectors and program `data` at `offset`
    fn program(
        &mut self,
        spi: &mut dyn SpiInterface,
        offset: u32,
        data: &[u8],
        options: WriteOptions,
    ) -> Result<()>;
}

/// Length of a transfer described by optional tx/rx buffers
///
/// `tx` wins when both are present.
pub(crate) fn transfer_len(tx: Option<&[u8]>, rx: Option<&[u8]>) -> usize {
    tx.or(rx).map_or(0, <[u8]>::len)
}
