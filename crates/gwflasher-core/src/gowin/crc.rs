//! Post-load checksum verification

use log::{error, info};

use super::device::Gowin;
use crate::error::Result;
use crate::image::{parse_hex_u32, Image};
use crate::jtag::JtagCable;

/// Outcome of comparing the device usercode with the image checksum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrcCheck {
    /// Usercode matches the checksum
    Match,
    /// Usercode matches neither the computed nor the declared checksum
    Mismatch {
        /// Usercode read back from the device
        usercode: u32,
        /// Checksum computed over the image
        checksum: u16,
    },
    /// The family does not report a usable usercode
    Skipped,
}

impl CrcCheck {
    /// True unless the check ran and failed
    pub fn is_ok(&self) -> bool {
        !matches!(self, Self::Mismatch { .. })
    }
}

impl<C: JtagCable> Gowin<C> {
    /// Compare the usercode register with the checksum of `image`
    ///
    /// The low half of the usercode is checked against the computed checksum
    /// first, then the whole register against the `checkSum` header field.
    /// A mismatch is reported in the result, it is not an error.
    pub fn check_crc(&mut self, image: &dyn Image) -> Result<CrcCheck> {
        let usercode = self.read_usercode()?;
        let checksum = image.checksum();

        let declared = image.header("checkSum").and_then(parse_hex_u32);
        if usercode as u16 == checksum || declared == Some(usercode) {
            info!("CRC check: Success");
            return Ok(CrcCheck::Match);
        }

        error!("CRC check: FAIL");
        error!("read: 0x{:08x} checksum: 0x{:04x}", usercode, checksum);
        Ok(CrcCheck::Mismatch { usercode, checksum })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gowin::command::READ_USERCODE;
    use crate::gowin::device::ProgramMode;
    use crate::gowin::program::ProgramConfig;
    use crate::gowin::testing::ScriptedCable;
    use crate::image::Bitstream;
    use alloc::vec;

    fn check(usercode: u32, image: &Bitstream) -> CrcCheck {
        let mut cable = ScriptedCable::new(0x0900281B);
        cable.script(READ_USERCODE, &[usercode]);
        let mut fpga = Gowin::open(cable, ProgramConfig::new(ProgramMode::Sram)).unwrap();
        fpga.check_crc(image).unwrap()
    }

    #[test]
    fn test_low_half_matches() {
        let image = Bitstream::new(vec![0x12, 0x34]);
        assert_eq!(check(0xABCD_1234, &image), CrcCheck::Match);
    }

    #[test]
    fn test_header_fallback() {
        let image = Bitstream::new(vec![0x12, 0x34]).with_header("checkSum", "0xDEADBEEF");
        assert_eq!(check(0xDEAD_BEEF, &image), CrcCheck::Match);
    }

    #[test]
    fn test_parser_supplied_checksum() {
        // the payload alone would sum to 0x1234
        let image = Bitstream::new(vec![0x12, 0x34]).with_checksum(0x5A5A);
        assert_eq!(check(0x0000_5A5A, &image), CrcCheck::Match);
        assert_eq!(
            check(0x0000_1234, &image),
            CrcCheck::Mismatch {
                usercode: 0x1234,
                checksum: 0x5A5A
            }
        );
    }

    #[test]
    fn test_mismatch_is_not_an_error() {
        let image = Bitstream::new(vec![0x12, 0x34]).with_header("checkSum", "garbage");
        let result = check(0x0000_4321, &image);
        assert_eq!(
            result,
            CrcCheck::Mismatch {
                usercode: 0x4321,
                checksum: 0x1234
            }
        );
        assert!(!result.is_ok());
        assert!(CrcCheck::Skipped.is_ok());
    }
}
