//! Configuration status register

use bitflags::bitflags;

bitflags! {
    /// Gowin configuration status register (opcode 0x41)
    ///
    /// Always re-read before testing a flag: the hardware updates it on its
    /// own while erase and load operations progress.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u32 {
        /// Bitstream CRC error
        const CRC_ERROR           = 1 << 0;
        /// Unknown or illegal command
        const BAD_COMMAND         = 1 << 1;
        /// Bitstream idcode does not match the device
        const ID_VERIFY_FAILED    = 1 << 2;
        /// Configuration timed out
        const TIMEOUT             = 1 << 3;
        /// Reserved
        const RESERVED4           = 1 << 4;
        /// SRAM erase finished
        const MEMORY_ERASE        = 1 << 5;
        /// Bitstream preamble detected
        const PREAMBLE            = 1 << 6;
        /// Configuration gate open
        const SYSTEM_EDIT_MODE    = 1 << 7;
        /// SPI flash is being programmed directly
        const PRG_SPIFLASH_DIRECT = 1 << 8;
        /// Reserved
        const RESERVED9           = 1 << 9;
        /// A non-JTAG configuration mode is active
        const NON_JTAG_CNF_ACTIVE = 1 << 10;
        /// Bypass mode
        const BYPASS              = 1 << 11;
        /// A valid bitstream is loaded
        const GOWIN_VLD           = 1 << 12;
        /// Configuration completed
        const DONE_FINAL          = 1 << 13;
        /// Security bits applied
        const SECURITY_FINAL      = 1 << 14;
        /// Device ready
        const READY               = 1 << 15;
        /// Power-on reset seen
        const POR                 = 1 << 16;
        /// Embedded flash locked
        const FLASH_LOCK          = 1 << 17;
        /// Second embedded flash locked
        const FLASH2_LOCK         = 1 << 18;
    }
}

const NAMES: [&str; 19] = [
    "CRC Error",
    "Bad Command",
    "ID Verify Failed",
    "Timeout",
    "Reserved4",
    "Memory Erase",
    "Preamble",
    "System Edit Mode",
    "Program SPI FLASH directly",
    "Reserved9",
    "Non-JTAG configuration is active",
    "Bypass",
    "Gowin VLD",
    "Done Final",
    "Security Final",
    "Ready",
    "POR",
    "FLASH lock",
    "FLASH2 lock",
];

impl Status {
    /// Names of the set flags, lowest bit first
    pub fn describe(&self) -> impl Iterator<Item = &'static str> {
        let bits = self.bits();
        NAMES
            .iter()
            .enumerate()
            .filter(move |(i, _)| bits & (1 << i) != 0)
            .map(|(_, name)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_describe() {
        let status = Status::SYSTEM_EDIT_MODE | Status::DONE_FINAL | Status::FLASH2_LOCK;
        let names: Vec<_> = status.describe().collect();
        assert_eq!(names, ["System Edit Mode", "Done Final", "FLASH2 lock"]);
    }

    #[test]
    fn test_unknown_bits_retained() {
        let status = Status::from_bits_retain(0x8000_2000);
        assert!(status.contains(Status::DONE_FINAL));
        assert_eq!(status.bits(), 0x8000_2000);
        assert_eq!(status.describe().count(), 1);
    }
}
