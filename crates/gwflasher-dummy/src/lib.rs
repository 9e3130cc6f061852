//! gwflasher-dummy - Simulated Gowin FPGA for testing
//!
//! This crate provides a [`JtagCable`] whose far end is a model of a Gowin
//! FPGA: the configuration status register, the system edit mode gate, SRAM
//! loading with checksum, the embedded flash and an SPI NOR flash hanging off
//! the boundary-scan pins. It is useful for testing and development without
//! real hardware.

pub mod error;
pub mod spi_flash;

use std::collections::BTreeMap;

use gwflasher_core::error::Result;
use gwflasher_core::gowin::command::*;
use gwflasher_core::gowin::{Quirks, SpiEncoding, SpiPins, Status, AUTOBOOT_SIGNATURE};
use gwflasher_core::image::{checksum16, parse_hex_u32};
use gwflasher_core::jtag::{JtagCable, TapState};

pub use error::DummyError;
pub use spi_flash::{SpiFlash, SpiFlashConfig};

/// Configuration for the simulated device
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// JTAG idcode, also selects the family behaviour
    pub idcode: u32,
    /// Fixed usercode; `None` reports the checksum of the last SRAM load
    pub usercode: Option<u32>,
    /// Device has just been powered up (POR flag set)
    pub power_on: bool,
    /// Status reads between ERASE_SRAM and MEMORY_ERASE showing up
    pub erase_latency: u32,
    /// The device never enters system edit mode
    pub stuck_edit_mode: bool,
    /// Embedded flash erase attempts that fail before one takes
    pub stubborn_erases: u32,
    /// External SPI flash
    pub spi_flash: SpiFlashConfig,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            idcode: 0x0900_281B, // GW1N-1
            usercode: None,
            power_on: true,
            erase_latency: 2,
            stuck_edit_mode: false,
            stubborn_erases: 0,
            spi_flash: SpiFlashConfig::default(),
        }
    }
}

/// Parse `dummy:` programmer options
///
/// Supported keys: `idcode`, `usercode` (hex), `flash_size` (bytes),
/// `erase_latency`.
pub fn parse_options(options: &[(&str, &str)]) -> error::Result<DummyConfig> {
    let mut config = DummyConfig::default();

    for (key, value) in options {
        let invalid = || DummyError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match *key {
            "idcode" => config.idcode = parse_hex_u32(value).ok_or_else(invalid)?,
            "usercode" => config.usercode = Some(parse_hex_u32(value).ok_or_else(invalid)?),
            "flash_size" => {
                let size: usize = value.parse().map_err(|_| invalid())?;
                if size == 0 || !size.is_power_of_two() {
                    return Err(DummyError::OutOfRange(format!(
                        "flash_size must be a power of two, got {}",
                        size
                    )));
                }
                config.spi_flash.size = size;
            }
            "erase_latency" => config.erase_latency = value.parse().map_err(|_| invalid())?,
            _ => {
                log::warn!("dummy: Unknown option: {}={}", key, value);
            }
        }
    }

    Ok(config)
}

/// Page being received through EF_PROGRAM
#[derive(Debug, Default)]
struct PageWrite {
    addr: Option<u32>,
    data: Vec<u8>,
}

/// Boundary-scan SPI pin state
#[derive(Debug, Default)]
struct BscanBus {
    selected: bool,
    sck: bool,
    miso: bool,
    bit: u8,
    shift_in: u8,
    shift_out: u8,
}

/// Simulated Gowin FPGA behind a JTAG cable
pub struct DummyGowin {
    config: DummyConfig,
    pins: SpiPins,
    erase_pulses_needed: u32,
    freq: u32,
    ir: u8,
    tap: TapState,
    commands: Vec<u8>,
    clocks: u64,
    slept_ms: u64,

    edit_mode: bool,
    erase_countdown: Option<u32>,
    memory_erased: bool,
    done_final: bool,
    gowin_vld: bool,
    por: bool,
    usercode: u32,

    sram: Vec<u8>,
    sram_chunks: Vec<(usize, TapState)>,
    sram_checksum: Option<u32>,
    sram_valid: bool,

    eflash: BTreeMap<u32, Vec<u8>>,
    erase_armed: bool,
    pulses: u32,
    erase_log: Vec<u32>,
    page_write: Option<PageWrite>,

    spi_flash: SpiFlash,
    bus: BscanBus,
}

impl DummyGowin {
    /// Create a powered-up device with empty SRAM and flash
    pub fn new(config: DummyConfig) -> Self {
        let quirks = Quirks::for_idcode(config.idcode);
        let pins = match quirks.spi {
            SpiEncoding::Bitbang(bitbang) => bitbang.pins,
            SpiEncoding::ShiftRegister(_) => SpiPins::DEFAULT,
        };
        let spi_flash = SpiFlash::new(config.spi_flash.clone());
        Self {
            pins,
            erase_pulses_needed: quirks.erase_pulses,
            freq: 6_000_000,
            ir: 0,
            tap: TapState::TestLogicReset,
            commands: Vec::new(),
            clocks: 0,
            slept_ms: 0,
            edit_mode: false,
            erase_countdown: None,
            memory_erased: false,
            done_final: false,
            gowin_vld: false,
            por: config.power_on,
            usercode: config.usercode.unwrap_or(0),
            sram: Vec::new(),
            sram_chunks: Vec::new(),
            sram_checksum: None,
            sram_valid: false,
            eflash: BTreeMap::new(),
            erase_armed: false,
            pulses: 0,
            erase_log: Vec::new(),
            page_write: None,
            spi_flash,
            bus: BscanBus::default(),
            config,
        }
    }

    /// Store a page in the embedded flash and boot from it
    pub fn preload_eflash(&mut self, addr: u32, page: &[u8]) {
        self.eflash.insert(addr, page.to_vec());
        self.reload();
    }

    /// Every instruction shifted so far
    pub fn commands(&self) -> &[u8] {
        &self.commands
    }

    /// Bits loaded into SRAM, as bytes
    pub fn sram(&self) -> &[u8] {
        &self.sram
    }

    /// Size and end state of every SRAM data scan
    pub fn sram_chunks(&self) -> &[(usize, TapState)] {
        &self.sram_chunks
    }

    /// Embedded flash page at word address `addr`
    pub fn eflash_page(&self, addr: u32) -> Option<&[u8]> {
        self.eflash.get(&addr).map(Vec::as_slice)
    }

    /// Number of programmed embedded flash pages
    pub fn eflash_pages(&self) -> usize {
        self.eflash.len()
    }

    /// Erase pulses seen by each embedded flash erase attempt
    pub fn erase_log(&self) -> &[u32] {
        &self.erase_log
    }

    /// The SPI flash on the boundary-scan pins
    pub fn spi_flash(&self) -> &SpiFlash {
        &self.spi_flash
    }

    /// Total TCK cycles toggled outside of scans
    pub fn clocks(&self) -> u64 {
        self.clocks
    }

    /// Wall-clock time the host asked to wait
    pub fn slept_ms(&self) -> u64 {
        self.slept_ms
    }

    /// Current status register, without side effects
    pub fn peek_status(&self) -> Status {
        let mut status = Status::empty();
        status.set(Status::SYSTEM_EDIT_MODE, self.edit_mode);
        status.set(Status::MEMORY_ERASE, self.memory_erased);
        status.set(Status::DONE_FINAL, self.done_final);
        status.set(Status::GOWIN_VLD, self.gowin_vld);
        status.set(Status::POR, self.por);
        status
    }

    fn read_status(&mut self) -> u32 {
        if let Some(left) = self.erase_countdown {
            if left == 0 {
                self.memory_erased = true;
                self.erase_countdown = None;
            } else {
                self.erase_countdown = Some(left - 1);
            }
        }
        self.peek_status().bits()
    }

    fn reload(&mut self) {
        let signed = self
            .eflash
            .get(&0)
            .is_some_and(|page| page.starts_with(&AUTOBOOT_SIGNATURE));
        let spi_boot = self.spi_flash.data().first().is_some_and(|&b| b != 0xFF);
        self.done_final = signed || spi_boot;
        self.gowin_vld = self.done_final;
    }

    fn instruction(&mut self, cmd: u8) {
        self.commands.push(cmd);
        self.ir = cmd;

        match cmd {
            CONFIG_ENABLE => {
                if !self.config.stuck_edit_mode {
                    self.edit_mode = true;
                }
            }
            CONFIG_DISABLE => {
                self.edit_mode = false;
                self.finish_erase_attempt();
                if self.sram_valid {
                    self.sram_valid = false;
                    self.done_final = true;
                    self.gowin_vld = true;
                    self.por = false;
                }
            }
            ERASE_SRAM if self.edit_mode => {
                self.done_final = false;
                self.gowin_vld = false;
                self.memory_erased = false;
                self.erase_countdown = Some(self.config.erase_latency);
            }
            XFER_DONE => self.memory_erased = false,
            INIT_ADDR => {
                self.sram.clear();
                self.sram_chunks.clear();
                self.sram_checksum = None;
            }
            SRAM_CHECKSUM_END => {
                let expected = checksum16(&self.sram) as u32;
                self.sram_valid = self.sram_checksum == Some(expected);
                if self.sram_valid {
                    self.usercode = self.config.usercode.unwrap_or(expected);
                }
            }
            EFLASH_ERASE if self.edit_mode => {
                self.erase_armed = true;
                self.pulses = 0;
            }
            EF_PROGRAM if self.edit_mode => self.page_write = Some(PageWrite::default()),
            RELOAD => self.reload(),
            _ => {}
        }
    }

    fn finish_erase_attempt(&mut self) {
        if !self.erase_armed {
            return;
        }
        self.erase_armed = false;
        self.erase_log.push(self.pulses);

        let attempt = self.erase_log.len() as u32;
        if self.pulses >= self.erase_pulses_needed && attempt > self.config.stubborn_erases {
            self.eflash.clear();
            self.done_final = false;
            self.gowin_vld = false;
        } else {
            // The old design comes back up
            self.reload();
        }
    }

    fn page_data(&mut self, tx: &[u8]) {
        let Some(write) = self.page_write.as_mut() else {
            return;
        };
        let word = u32::from_le_bytes([tx[0], tx[1], tx[2], tx[3]]);
        match write.addr {
            None => write.addr = Some(word),
            // Words arrive byte-swapped
            Some(_) => write.data.extend_from_slice(&word.to_be_bytes()),
        }
        if write.data.len() == 256 {
            if let Some(PageWrite {
                addr: Some(addr),
                data,
            }) = self.page_write.take()
            {
                self.eflash.insert(addr, data);
            }
        }
    }

    fn bscan_vector(&mut self, vector: u8) -> u8 {
        let pins = self.pins;
        let selected = vector & pins.cs == 0;
        let sck = vector & pins.sck != 0;

        if selected && !self.bus.selected {
            self.spi_flash.begin();
            self.bus.selected = true;
            self.bus.bit = 0;
            self.bus.shift_in = 0;
            self.bus.shift_out = self.spi_flash.next_out();
        } else if !selected && self.bus.selected {
            self.spi_flash.end();
            self.bus.selected = false;
        }

        if self.bus.selected && sck && !self.bus.sck {
            let mask = 0x80 >> self.bus.bit;
            self.bus.miso = self.bus.shift_out & mask != 0;
            if vector & pins.di != 0 {
                self.bus.shift_in |= mask;
            }
            self.bus.bit += 1;
            if self.bus.bit == 8 {
                self.spi_flash.byte_in(self.bus.shift_in);
                self.bus.bit = 0;
                self.bus.shift_in = 0;
                self.bus.shift_out = self.spi_flash.next_out();
            }
        }
        self.bus.sck = sck;

        let mut out = vector & !pins.do_;
        if self.bus.miso {
            out |= pins.do_;
        }
        out
    }

    // One full SPI transaction per scan, the response trails by one bit
    fn passthrough(&mut self, tx: &[u8], rx: &mut [u8], bits: usize) {
        let mut miso = Vec::with_capacity(bits);
        self.spi_flash.begin();
        for byte in tx.iter().take(bits / 8) {
            let out = self.spi_flash.next_out();
            self.spi_flash.byte_in(byte.reverse_bits());
            miso.extend((0..8).rev().map(|b| out >> b & 1 != 0));
        }
        self.spi_flash.end();

        rx.fill(0);
        for (pos, _) in miso.iter().enumerate().filter(|(_, bit)| **bit) {
            let pos = pos + 1;
            if pos < bits {
                rx[pos / 8] |= 1 << (pos % 8);
            }
        }
    }
}

impl JtagCable for DummyGowin {
    fn shift_ir(&mut self, data: &[u8], _bits: usize) -> Result<()> {
        self.instruction(data.first().copied().unwrap_or(0));
        self.tap = TapState::RunTestIdle;
        Ok(())
    }

    fn shift_dr(
        &mut self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
        bits: usize,
        end_state: TapState,
    ) -> Result<()> {
        let bytes = bits.div_ceil(8);
        let mut tx_buf = vec![0u8; bytes];
        if let Some(tx) = tx {
            let n = tx.len().min(bytes);
            tx_buf[..n].copy_from_slice(&tx[..n]);
        }
        let mut captured = vec![0u8; bytes];

        match self.ir {
            READ_IDCODE if bytes >= 4 => {
                captured[..4].copy_from_slice(&self.config.idcode.to_le_bytes())
            }
            READ_USERCODE if bytes >= 4 => {
                captured[..4].copy_from_slice(&self.usercode.to_le_bytes())
            }
            STATUS_REGISTER if bytes >= 4 => {
                let status = self.read_status();
                captured[..4].copy_from_slice(&status.to_le_bytes());
            }
            XFER_WRITE if self.edit_mode => {
                self.sram.extend_from_slice(&tx_buf);
                self.sram_chunks.push((bits, end_state));
            }
            SRAM_CHECKSUM_START if bytes >= 4 => {
                self.sram_checksum = Some(u32::from_le_bytes([
                    tx_buf[0], tx_buf[1], tx_buf[2], tx_buf[3],
                ]));
            }
            EF_PROGRAM if bits == 32 => self.page_data(&tx_buf),
            SPI_PASSTHROUGH => self.passthrough(&tx_buf, &mut captured, bits),
            SPI_MODE_BSCAN if bits == 8 => captured[0] = self.bscan_vector(tx_buf[0]),
            _ => {}
        }

        if let Some(rx) = rx {
            let n = rx.len().min(bytes);
            rx[..n].copy_from_slice(&captured[..n]);
        }
        self.tap = end_state;
        Ok(())
    }

    fn set_state(&mut self, state: TapState) -> Result<()> {
        self.tap = state;
        Ok(())
    }

    fn toggle_clk(&mut self, cycles: u32) -> Result<()> {
        if self.erase_armed && self.tap == TapState::ShiftDr && cycles == 32 {
            self.pulses += 1;
        }
        self.clocks += cycles as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn clk_freq(&self) -> u32 {
        self.freq
    }

    fn set_clk_freq(&mut self, hz: u32) -> Result<u32> {
        self.freq = hz;
        Ok(hz)
    }

    fn read_idcode(&mut self) -> Result<u32> {
        Ok(self.config.idcode)
    }

    fn sleep_ms(&mut self, ms: u32) {
        // Simulated time only
        self.slept_ms += ms as u64;
    }
}
