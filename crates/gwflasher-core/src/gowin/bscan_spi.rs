//! SPI master over JTAG boundary-scan
//!
//! Two encodings exist. Most families expose the SPI flash pins as bits of an
//! 8-bit boundary-scan vector that has to be toggled one clock edge at a time
//! ([`Bitbang`]). GW2A parts instead route the data register straight to the
//! flash through instruction 0x16 ([`ShiftRegister`]), which moves a whole
//! transfer per DR scan at the cost of a one-bit skew on the response.

use alloc::vec;
use log::{debug, error};

use super::command::SPI_PASSTHROUGH;
use super::device::send_command;
use crate::error::{Error, Result};
use crate::jtag::{JtagCable, TapState};
use crate::spi::transfer_len;

/// Positions of the SPI signals in the boundary-scan vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiPins {
    /// Clock
    pub sck: u8,
    /// Chip select, active low
    pub cs: u8,
    /// Data towards the flash (MOSI)
    pub di: u8,
    /// Data from the flash (MISO)
    pub do_: u8,
    /// Output enable mask
    pub msk: u8,
}

impl SpiPins {
    /// Mapping used by every family except GW1NSR-4C
    pub const DEFAULT: Self = Self {
        sck: 1 << 1,
        cs: 1 << 3,
        di: 1 << 5,
        do_: 1 << 7,
        msk: 1 << 6,
    };

    /// GW1NSR-4C mapping
    pub const GW1NSR_4C: Self = Self {
        sck: 1 << 7,
        cs: 1 << 5,
        di: 1 << 3,
        do_: 1 << 1,
        msk: 1 << 0,
    };

    /// Idle vector: output enables set, chip select asserted, clock low
    fn idle(&self) -> u8 {
        self.msk | self.do_
    }
}

/// One way of driving the SPI bus through JTAG
pub trait BscanSpi {
    /// Run one complete SPI transaction
    ///
    /// `tx` of `None` sends zeros. `rx`, when given, receives one byte per
    /// byte sent.
    fn transfer(
        &self,
        cable: &mut dyn JtagCable,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
    ) -> Result<()>;

    /// Send `cmd` and poll the returned byte until `(byte & mask) == expected`
    fn wait(
        &self,
        cable: &mut dyn JtagCable,
        cmd: u8,
        mask: u8,
        expected: u8,
        timeout: u32,
        verbose: bool,
    ) -> Result<()>;
}

/// Bit-banged SPI: one boundary-scan vector per clock edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitbang {
    /// Vector layout
    pub pins: SpiPins,
}

impl Bitbang {
    /// Bit-bang over the given pin layout
    pub const fn new(pins: SpiPins) -> Self {
        Self { pins }
    }

    // DR shift of one vector, then 6 clocks so the pins settle
    fn write_vector(&self, cable: &mut dyn JtagCable, vector: u8, capture: bool) -> Result<u8> {
        let mut rx = [0u8; 1];
        if capture {
            cable.shift_dr(Some(&[vector]), Some(&mut rx), 8, TapState::RunTestIdle)?;
        } else {
            cable.shift_dr(Some(&[vector]), None, 8, TapState::RunTestIdle)?;
        }
        cable.toggle_clk(6)?;
        Ok(rx[0])
    }

    /// Clock one byte MSB first, returns the byte sampled on DO
    fn clock_byte(&self, cable: &mut dyn JtagCable, out: u8) -> Result<u8> {
        let pins = &self.pins;
        let mut byte = 0u8;
        for bit in (0..8).rev() {
            let mask = 1u8 << bit;
            let mut vector = pins.idle();
            if out & mask != 0 {
                vector |= pins.di;
            }
            self.write_vector(cable, vector, false)?;
            vector |= pins.sck;
            let sampled = self.write_vector(cable, vector, true)?;
            cable.flush()?;
            if sampled & pins.do_ != 0 {
                byte |= mask;
            }
        }
        Ok(byte)
    }

    fn select(&self, cable: &mut dyn JtagCable) -> Result<()> {
        self.write_vector(cable, self.pins.idle(), false)?;
        cable.flush()
    }

    /// Clock low, chip select released
    fn release(&self, cable: &mut dyn JtagCable) -> Result<()> {
        let vector = (self.pins.idle() & !self.pins.sck) | self.pins.cs;
        self.write_vector(cable, vector, false)?;
        cable.flush()
    }

    fn poll(
        &self,
        cable: &mut dyn JtagCable,
        cmd: u8,
        mask: u8,
        expected: u8,
        timeout: u32,
        verbose: bool,
    ) -> Result<()> {
        self.clock_byte(cable, cmd)?;

        let mut count = 0u32;
        loop {
            let value = self.clock_byte(cable, 0)?;
            count += 1;
            if verbose {
                debug!("SPI wait: 0x{:02x} 0x{:02x} 0x{:02x} ({})", value, mask, expected, count);
            }
            if value & mask == expected {
                return Ok(());
            }
            if count >= timeout {
                error!("SPI wait timeout: 0x{:02x} 0x{:02x} 0x{:02x}", value, mask, expected);
                return Err(Error::SpiTimeout);
            }
        }
    }
}

impl BscanSpi for Bitbang {
    fn transfer(
        &self,
        cable: &mut dyn JtagCable,
        tx: Option<&[u8]>,
        mut rx: Option<&mut [u8]>,
    ) -> Result<()> {
        let len = transfer_len(tx, rx.as_deref());

        self.select(cable)?;
        for i in 0..len {
            let out = tx.and_then(|tx| tx.get(i).copied()).unwrap_or(0);
            let byte = self.clock_byte(cable, out)?;
            if let Some(slot) = rx.as_deref_mut().and_then(|rx| rx.get_mut(i)) {
                *slot = byte;
            }
        }
        self.release(cable)
    }

    fn wait(
        &self,
        cable: &mut dyn JtagCable,
        cmd: u8,
        mask: u8,
        expected: u8,
        timeout: u32,
        verbose: bool,
    ) -> Result<()> {
        self.select(cable)?;
        let result = self.poll(cable, cmd, mask, expected, timeout, verbose);
        let released = self.release(cable);
        result.and(released)
    }
}

/// GW2A direct SPI access through the data register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftRegister;

impl ShiftRegister {
    // The response trails the request by one TCK
    fn decode(jrx: &[u8], i: usize) -> u8 {
        (jrx[i] >> 1).reverse_bits() | (jrx[i + 1] & 1)
    }
}

impl BscanSpi for ShiftRegister {
    fn transfer(
        &self,
        cable: &mut dyn JtagCable,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
    ) -> Result<()> {
        let len = transfer_len(tx, rx.as_deref());
        // One extra byte to catch the skewed last bit
        let shifted = if rx.is_some() { len + 1 } else { len };

        let mut jtx = vec![0u8; shifted];
        if let Some(tx) = tx {
            for (dst, src) in jtx.iter_mut().zip(tx) {
                *dst = src.reverse_bits();
            }
        }

        send_command(cable, SPI_PASSTHROUGH)?;
        cable.set_state(TapState::Exit2Dr)?;

        match rx {
            Some(rx) => {
                let mut jrx = vec![0u8; shifted];
                cable.shift_dr(Some(&jtx), Some(&mut jrx), 8 * shifted, TapState::RunTestIdle)?;
                for (i, slot) in rx.iter_mut().take(len).enumerate() {
                    *slot = Self::decode(&jrx, i);
                }
                Ok(())
            }
            None => cable.shift_dr(Some(&jtx), None, 8 * shifted, TapState::RunTestIdle),
        }
    }

    fn wait(
        &self,
        cable: &mut dyn JtagCable,
        cmd: u8,
        mask: u8,
        expected: u8,
        timeout: u32,
        verbose: bool,
    ) -> Result<()> {
        let tx = [cmd.reverse_bits(), 0, 0];
        let mut rx = [0u8; 3];
        let mut count = 0u32;

        loop {
            send_command(cable, SPI_PASSTHROUGH)?;
            cable.set_state(TapState::Exit2Dr)?;
            cable.shift_dr(Some(&tx), Some(&mut rx), 24, TapState::RunTestIdle)?;
            let value = Self::decode(&rx, 1);
            count += 1;
            if verbose {
                debug!("SPI wait: 0x{:02x} 0x{:02x} 0x{:02x} ({})", value, mask, expected, count);
            }
            if value & mask == expected {
                return Ok(());
            }
            if count >= timeout {
                error!("SPI wait timeout: 0x{:02x} 0x{:02x} 0x{:02x}", value, mask, expected);
                return Err(Error::SpiTimeout);
            }
        }
    }
}

/// SPI encoding selected for a device family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpiEncoding {
    /// Boundary-scan bit-bang
    Bitbang(Bitbang),
    /// Direct data register access (GW2A)
    ShiftRegister(ShiftRegister),
}

impl SpiEncoding {
    /// Whether the device routes SPI through instruction 0x16 rather than the
    /// boundary-scan register
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Self::ShiftRegister(_))
    }

    fn inner(&self) -> &dyn BscanSpi {
        match self {
            Self::Bitbang(bitbang) => bitbang,
            Self::ShiftRegister(shift) => shift,
        }
    }
}

impl BscanSpi for SpiEncoding {
    fn transfer(
        &self,
        cable: &mut dyn JtagCable,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
    ) -> Result<()> {
        self.inner().transfer(cable, tx, rx)
    }

    fn wait(
        &self,
        cable: &mut dyn JtagCable,
        cmd: u8,
        mask: u8,
        expected: u8,
        timeout: u32,
        verbose: bool,
    ) -> Result<()> {
        self.inner().wait(cable, cmd, mask, expected, timeout, verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gowin::testing::ScriptedCable;
    use alloc::vec::Vec;

    /// Loops MOSI back on MISO one bit late, like a shift register
    fn echo_bitbang(cable: &mut ScriptedCable, pins: SpiPins) {
        let mut last_di = false;
        cable.on_dr = Some(alloc::boxed::Box::new(move |tx: &[u8], rx: &mut [u8]| {
            let vector = tx[0];
            rx[0] = vector & !pins.do_;
            if vector & pins.sck != 0 {
                if last_di {
                    rx[0] |= pins.do_;
                }
                last_di = vector & pins.di != 0;
            }
        }));
    }

    #[test]
    fn test_bitbang_vectors() {
        let mut cable = ScriptedCable::new(0x0900281B);
        let spi = Bitbang::new(SpiPins::DEFAULT);
        spi.transfer(&mut cable, Some(&[0x80]), None).unwrap();

        let vectors: Vec<u8> = cable.dr_writes.iter().map(|w| w[0]).collect();
        // select + 8 bits * 2 edges + release
        assert_eq!(vectors.len(), 18);
        assert_eq!(vectors[0], 0xC0);
        assert_eq!(vectors[1], 0xC0 | 0x20);
        assert_eq!(vectors[2], 0xC0 | 0x20 | 0x02);
        assert_eq!(vectors[3], 0xC0);
        assert_eq!(vectors[17], 0xC0 | 0x08);
        assert_eq!(cable.clocks, 18 * 6);
    }

    #[test]
    fn test_bitbang_loopback() {
        let mut cable = ScriptedCable::new(0x0900281B);
        echo_bitbang(&mut cable, SpiPins::DEFAULT);
        let spi = Bitbang::new(SpiPins::DEFAULT);

        let mut rx = [0u8; 3];
        spi.transfer(&mut cable, Some(&[0xA5, 0x3C, 0xFF]), Some(&mut rx)).unwrap();
        // every bit comes back one clock later
        assert_eq!(rx, [0x52, 0x9E, 0x7F]);
    }

    #[test]
    fn test_bitbang_wait_releases_on_timeout() {
        let mut cable = ScriptedCable::new(0x0100981B);
        let pins = SpiPins::GW1NSR_4C;
        let spi = Bitbang::new(pins);

        let err = spi.wait(&mut cable, 0x05, 0x01, 0x01, 3, false).unwrap_err();
        assert_eq!(err, Error::SpiTimeout);

        let last = cable.dr_writes.last().unwrap()[0];
        assert_ne!(last & pins.cs, 0);
        assert_eq!(last & pins.sck, 0);
        // select + cmd + 3 status bytes + release
        assert_eq!(cable.dr_writes.len(), 1 + 16 + 3 * 16 + 1);
    }

    #[test]
    fn test_shift_register_encoding() {
        let mut cable = ScriptedCable::new(0x0000081B);
        // Response 0x9F, 0x01 skewed by one bit
        cable.on_dr = Some(alloc::boxed::Box::new(|_tx: &[u8], rx: &mut [u8]| {
            let stream = [0x9Fu8, 0x01];
            for (i, byte) in stream.iter().enumerate() {
                for bit in 0..8 {
                    if byte & (0x80 >> bit) != 0 {
                        let pos = i * 8 + bit + 1;
                        rx[pos / 8] |= 1 << (pos % 8);
                    }
                }
            }
        }));

        let mut rx = [0u8; 2];
        ShiftRegister.transfer(&mut cable, Some(&[0x9F, 0x00]), Some(&mut rx)).unwrap();
        assert_eq!(rx, [0x9F, 0x01]);
        assert_eq!(cable.ir_writes, [SPI_PASSTHROUGH]);
        assert_eq!(cable.states, [TapState::Exit2Dr]);
        assert_eq!(cable.dr_bits, [24]);
        assert_eq!(cable.dr_writes[0], [0xF9, 0x00, 0x00]);
    }

    #[test]
    fn test_shift_register_write_only_length() {
        let mut cable = ScriptedCable::new(0x0000081B);
        ShiftRegister.transfer(&mut cable, Some(&[0x06]), None).unwrap();
        assert_eq!(cable.dr_bits, [8]);
        assert_eq!(cable.dr_writes[0], [0x60]);
    }

    #[test]
    fn test_shift_register_wait() {
        let mut cable = ScriptedCable::new(0x0000081B);
        let mut polls = 0;
        // busy twice, then idle
        cable.on_dr = Some(alloc::boxed::Box::new(move |_tx: &[u8], rx: &mut [u8]| {
            polls += 1;
            let status: u8 = if polls < 3 { 0x01 } else { 0x00 };
            let pos = 8 + 7 + 1;
            if status & 1 != 0 {
                rx[pos / 8] |= 1 << (pos % 8);
            }
        }));

        ShiftRegister.wait(&mut cable, 0x05, 0x01, 0x00, 10, true).unwrap();
        assert_eq!(cable.dr_bits, [24, 24, 24]);
        assert_eq!(cable.ir_writes.len(), 3);
    }

    #[test]
    fn test_encoding_dispatch() {
        let legacy = SpiEncoding::Bitbang(Bitbang::new(SpiPins::DEFAULT));
        assert!(!legacy.is_passthrough());
        assert!(SpiEncoding::ShiftRegister(ShiftRegister).is_passthrough());
    }
}
