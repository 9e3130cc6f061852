//! Configuration images
//!
//! The programmer does not parse bitstream files itself. It consumes any
//! [`Image`]: a read-only payload, its length in bits, optional header fields
//! and the 16-bit checksum the FPGA is expected to report after loading.
//!
//! Two concrete images are provided:
//! - [`Bitstream`] - payload plus the key/value header of a Gowin bitstream
//!   (`idcode`, `checkSum`, ...), produced by whatever parser the caller uses
//! - [`RawImage`] - a plain binary blob, only valid for external SPI flash

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// Origin format of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    /// Gowin bitstream with header fields
    Bitstream,
    /// Raw binary blob
    Raw,
}

/// Read-only view of a configuration image
pub trait Image {
    /// Source format
    fn kind(&self) -> ImageKind;

    /// Payload bytes, bit 0 of byte 0 is shifted first
    fn data(&self) -> &[u8];

    /// Payload length in bits
    fn bit_len(&self) -> usize;

    /// Look up a header field by name
    fn header(&self, name: &str) -> Option<&str>;

    /// 16-bit checksum of the payload
    fn checksum(&self) -> u16;
}

/// Sum of the payload read as big-endian 16-bit words
///
/// A trailing odd byte counts as the high half of a final word.
pub fn checksum16(data: &[u8]) -> u16 {
    data.chunks(2).fold(0u16, |acc, word| {
        let hi = word[0] as u16;
        let lo = word.get(1).copied().unwrap_or(0) as u16;
        acc.wrapping_add((hi << 8) | lo)
    })
}

/// A Gowin bitstream: payload plus header fields
#[derive(Debug, Clone)]
pub struct Bitstream {
    data: Vec<u8>,
    bit_len: usize,
    header: BTreeMap<String, String>,
    checksum: u16,
}

impl Bitstream {
    /// Create a bitstream from its payload, checksum computed over the payload
    pub fn new(data: Vec<u8>) -> Self {
        let checksum = checksum16(&data);
        let bit_len = data.len() * 8;
        Self {
            data,
            bit_len,
            header: BTreeMap::new(),
            checksum,
        }
    }

    /// Add a header field
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }

    /// Override the checksum, for parsers that compute it themselves
    pub fn with_checksum(mut self, checksum: u16) -> Self {
        self.checksum = checksum;
        self
    }

    /// All header fields, sorted by key
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.header.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Image for Bitstream {
    fn kind(&self) -> ImageKind {
        ImageKind::Bitstream
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn bit_len(&self) -> usize {
        self.bit_len
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.header.get(name).map(String::as_str)
    }

    fn checksum(&self) -> u16 {
        self.checksum
    }
}

/// Raw binary image without any header
#[derive(Debug, Clone)]
pub struct RawImage {
    data: Vec<u8>,
}

impl RawImage {
    /// Wrap a binary blob
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}

impl Image for RawImage {
    fn kind(&self) -> ImageKind {
        ImageKind::Raw
    }

    fn data(&self) -> &[u8] {
        &self.data
    }

    fn bit_len(&self) -> usize {
        self.data.len() * 8
    }

    fn header(&self, _name: &str) -> Option<&str> {
        None
    }

    fn checksum(&self) -> u16 {
        checksum16(&self.data)
    }
}

/// Parse a hex header value such as `0x0900281B` or `0900281b`
pub fn parse_hex_u32(s: &str) -> Option<u32> {
    let s = s.trim();
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u32::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_checksum16() {
        assert_eq!(checksum16(&[]), 0);
        assert_eq!(checksum16(&[0x12, 0x34, 0x00, 0x01]), 0x1235);
        assert_eq!(checksum16(&[0xFF, 0xFF, 0x00, 0x02]), 0x0001);
        assert_eq!(checksum16(&[0xAB]), 0xAB00);
    }

    #[test]
    fn test_bitstream_header() {
        let bs = Bitstream::new(vec![0u8; 4])
            .with_header("idcode", "0900281B")
            .with_header("checkSum", "0x1234");
        assert_eq!(bs.header("idcode"), Some("0900281B"));
        assert_eq!(bs.header("missing"), None);
        assert_eq!(bs.bit_len(), 32);
        assert_eq!(bs.kind(), ImageKind::Bitstream);
        assert_eq!(bs.headers().count(), 2);
    }

    #[test]
    fn test_parse_hex_u32() {
        assert_eq!(parse_hex_u32("0900281B"), Some(0x0900281B));
        assert_eq!(parse_hex_u32("0x1234"), Some(0x1234));
        assert_eq!(parse_hex_u32(" ffffffff "), Some(0xFFFF_FFFF));
        assert_eq!(parse_hex_u32("zz"), None);
        assert_eq!(parse_hex_u32(""), None);
    }
}
