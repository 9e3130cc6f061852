//! Error types for gwflasher-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Which erase sequence failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseStage {
    /// SRAM erase left DONE_FINAL set
    Sram,
    /// Embedded flash still reports DONE_FINAL after all erase attempts
    Flash,
}

/// Which write sequence failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    /// SRAM load did not end with DONE_FINAL
    Sram,
    /// Embedded flash reload did not end with DONE_FINAL
    Flash,
}

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Construction errors
    /// Bitstream idcode does not match the idcode read from the device
    IdcodeMismatch {
        /// Idcode declared in the bitstream header
        image: u32,
        /// Idcode read from the target
        device: u32,
    },
    /// Bitstream header has no usable `idcode` field
    MissingIdcode,
    /// Raw images can only be written to an external SPI flash
    IncompatibleFormat,
    /// MCU firmware was supplied for a family without an MCU
    McuFirmwareUnsupported,

    // Protocol errors
    /// Status register never reached the expected value
    Timeout,
    /// SPI status polling over boundary-scan timed out
    SpiTimeout,
    /// Erase sequence failed
    EraseFailed(EraseStage),
    /// Write sequence failed
    WriteFailed(WriteStage),
    /// Device is neither valid nor freshly powered, status register attached
    DeviceNotReady(u32),

    // Unsupported operations
    /// Operation is not supported on this device family
    Unsupported(&'static str),
    /// External flash programming requested without a flash driver
    NoExternalFlashDriver,

    // Transport errors
    /// JTAG cable reported a failure
    Jtag,
    /// External SPI flash driver reported a failure
    ExternalFlash,
}

impl fmt::Display for EraseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sram => write!(f, "SRAM"),
            Self::Flash => write!(f, "flash"),
        }
    }
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sram => write!(f, "SRAM"),
            Self::Flash => write!(f, "flash"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdcodeMismatch { image, device } => write!(
                f,
                "mismatch between target's idcode and bitstream idcode: \
                 bitstream has 0x{:08X}, hardware requires 0x{:08X}",
                image, device
            ),
            Self::MissingIdcode => write!(f, "bitstream header has no idcode"),
            Self::IncompatibleFormat => {
                write!(f, "incompatible file format (raw images need external flash)")
            }
            Self::McuFirmwareUnsupported => write!(
                f,
                "microcontroller firmware flashing only supported on GW1NSR-4C"
            ),
            Self::Timeout => write!(f, "status register poll timed out"),
            Self::SpiTimeout => write!(f, "SPI status wait timed out"),
            Self::EraseFailed(stage) => write!(f, "{} erase failed", stage),
            Self::WriteFailed(stage) => write!(f, "{} write failed", stage),
            Self::DeviceNotReady(status) => write!(
                f,
                "either GOWIN_VLD or POR should be set (status 0x{:08X})",
                status
            ),
            Self::Unsupported(what) => write!(f, "{} is not supported", what),
            Self::NoExternalFlashDriver => write!(f, "no external SPI flash driver available"),
            Self::Jtag => write!(f, "JTAG transport error"),
            Self::ExternalFlash => write!(f, "external SPI flash operation failed"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
