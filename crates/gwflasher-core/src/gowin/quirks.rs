//! Per-family behaviour differences
//!
//! Everything that varies between Gowin parts is resolved once from the
//! idcode into a [`Quirks`] record; the programming code only ever looks at
//! the record, never at the idcode.

use core::fmt;

use super::bscan_spi::{Bitbang, ShiftRegister, SpiEncoding, SpiPins};

/// Device families with known idcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// GW1N-1
    Gw1n1,
    /// GW1N-4
    Gw1n4,
    /// GW1NZ-1
    Gw1nz1,
    /// GW1NSR-4C (with Cortex-M3)
    Gw1nsr4c,
    /// GW2A-18
    Gw2a18,
    /// GW2A-55
    Gw2a55,
    /// GW5AST-138
    Gw5ast138,
    /// GW5AT-138
    Gw5at138,
    /// GW5A-25
    Gw5a25,
    /// Any idcode not in the table
    Unknown,
}

impl Family {
    /// Marketing name of the family
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gw1n1 => "GW1N-1",
            Self::Gw1n4 => "GW1N-4",
            Self::Gw1nz1 => "GW1NZ-1",
            Self::Gw1nsr4c => "GW1NSR-4C",
            Self::Gw2a18 => "GW2A-18",
            Self::Gw2a55 => "GW2A-55",
            Self::Gw5ast138 => "GW5AST-138",
            Self::Gw5at138 => "GW5AT-138",
            Self::Gw5a25 => "GW5A-25",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Behaviour switches for one device family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// Family tag
    pub family: Family,
    /// Erase pulses per embedded flash erase attempt
    pub erase_pulses: u32,
    /// Use the slow per-word and per-page flash write delays
    pub long_flash_timing: bool,
    /// Flash programming always targets the external SPI flash
    pub external_flash_only: bool,
    /// Do not compare the usercode with the image checksum
    pub skip_checksum: bool,
    /// How the SPI flash is reached
    pub spi: SpiEncoding,
    /// Reset and idle a million clocks before loading SRAM, clears a stuck
    /// BAD_COMMAND
    pub stuck_bad_command_workaround: bool,
    /// Flash programming is not implemented for this family
    pub flash_write_unsupported: bool,
    /// An MCU firmware image can be written after the bitstream
    pub mcu_firmware: bool,
}

impl Quirks {
    /// Behaviour for families without any quirk
    pub const DEFAULT: Self = Self {
        family: Family::Unknown,
        erase_pulses: 1,
        long_flash_timing: false,
        external_flash_only: false,
        skip_checksum: false,
        spi: SpiEncoding::Bitbang(Bitbang::new(SpiPins::DEFAULT)),
        stuck_bad_command_workaround: false,
        flash_write_unsupported: false,
        mcu_firmware: false,
    };

    /// Look up the quirks of a device by idcode
    ///
    /// Unknown idcodes get [`Quirks::DEFAULT`].
    pub fn for_idcode(idcode: u32) -> Self {
        DEVICES
            .iter()
            .find(|(code, _)| *code == idcode)
            .map_or(Self::DEFAULT, |(_, quirks)| *quirks)
    }

    /// All known idcodes with their quirks
    pub fn known() -> &'static [(u32, Quirks)] {
        DEVICES
    }
}

const GW2A: Quirks = Quirks {
    external_flash_only: true,
    skip_checksum: true,
    spi: SpiEncoding::ShiftRegister(ShiftRegister),
    ..Quirks::DEFAULT
};

const GW5A: Quirks = Quirks {
    external_flash_only: true,
    skip_checksum: true,
    stuck_bad_command_workaround: true,
    flash_write_unsupported: true,
    ..Quirks::DEFAULT
};

static DEVICES: &[(u32, Quirks)] = &[
    (
        0x0900_281B,
        Quirks {
            family: Family::Gw1n1,
            erase_pulses: 65,
            long_flash_timing: true,
            ..Quirks::DEFAULT
        },
    ),
    (
        0x0100_381B,
        Quirks {
            family: Family::Gw1n4,
            ..Quirks::DEFAULT
        },
    ),
    (
        0x0100_681B,
        Quirks {
            family: Family::Gw1nz1,
            ..Quirks::DEFAULT
        },
    ),
    (
        0x0100_981B,
        Quirks {
            family: Family::Gw1nsr4c,
            spi: SpiEncoding::Bitbang(Bitbang::new(SpiPins::GW1NSR_4C)),
            mcu_firmware: true,
            ..Quirks::DEFAULT
        },
    ),
    (
        0x0000_081B,
        Quirks {
            family: Family::Gw2a18,
            ..GW2A
        },
    ),
    (
        0x0000_281B,
        Quirks {
            family: Family::Gw2a55,
            ..GW2A
        },
    ),
    (
        0x0001_081B,
        Quirks {
            family: Family::Gw5ast138,
            ..GW5A
        },
    ),
    (
        0x0001_181B,
        Quirks {
            family: Family::Gw5at138,
            ..GW5A
        },
    ),
    (
        0x0001_281B,
        Quirks {
            family: Family::Gw5a25,
            ..GW5A
        },
    ),
];
