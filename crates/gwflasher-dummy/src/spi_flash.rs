//! Byte-level SPI NOR flash responder
//!
//! Sits behind the simulated boundary-scan pins. Bytes are exchanged one at
//! a time: [`SpiFlash::next_out`] is what the chip drives while the master
//! clocks in the next byte, [`SpiFlash::byte_in`] delivers that byte. Writes
//! and erases take effect when chip select is released.

/// Opcodes understood by the responder
pub mod opcodes {
    /// Write status register 1
    pub const WRSR: u8 = 0x01;
    /// Page program
    pub const PP: u8 = 0x02;
    /// Read data
    pub const READ: u8 = 0x03;
    /// Write disable
    pub const WRDI: u8 = 0x04;
    /// Read status register 1
    pub const RDSR: u8 = 0x05;
    /// Write enable
    pub const WREN: u8 = 0x06;
    /// 4 KiB sector erase
    pub const SE_20: u8 = 0x20;
    /// Chip erase
    pub const CE_60: u8 = 0x60;
    /// JEDEC ID
    pub const RDID: u8 = 0x9F;
    /// Chip erase
    pub const CE_C7: u8 = 0xC7;
    /// 64 KiB block erase
    pub const BE_D8: u8 = 0xD8;

    /// Write in progress
    pub const SR1_WIP: u8 = 0x01;
    /// Write enable latch
    pub const SR1_WEL: u8 = 0x02;
    /// Block protect bits
    pub const SR1_BP: u8 = 0x1C;
}

use opcodes::*;

/// Configuration for the simulated SPI flash
#[derive(Debug, Clone)]
pub struct SpiFlashConfig {
    /// JEDEC manufacturer ID
    pub manufacturer_id: u8,
    /// JEDEC device ID
    pub device_id: u16,
    /// Flash size in bytes
    pub size: usize,
    /// Status reads that report WIP after a program or erase
    pub busy_polls: u32,
    /// Block protect bits set at power-up
    pub protected: bool,
}

impl Default for SpiFlashConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: 0xEF, // Winbond
            device_id: 0x4016,     // W25Q32
            size: 4 * 1024 * 1024,
            busy_polls: 3,
            protected: false,
        }
    }
}

/// Simulated SPI NOR flash
#[derive(Debug, Clone)]
pub struct SpiFlash {
    config: SpiFlashConfig,
    data: Vec<u8>,
    write_enabled: bool,
    block_protect: u8,
    busy: u32,
    received: Vec<u8>,
}

impl SpiFlash {
    /// Create an erased flash
    pub fn new(config: SpiFlashConfig) -> Self {
        let data = vec![0xFF; config.size];
        let block_protect = if config.protected { SR1_BP } else { 0 };
        Self {
            config,
            data,
            write_enabled: false,
            block_protect,
            busy: 0,
            received: Vec::new(),
        }
    }

    /// Flash content
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether a program or erase is still running
    pub fn is_busy(&self) -> bool {
        self.busy > 0
    }

    fn status(&self) -> u8 {
        let mut status = self.block_protect;
        if self.busy > 0 {
            status |= SR1_WIP;
        }
        if self.write_enabled {
            status |= SR1_WEL;
        }
        status
    }

    fn address(&self) -> Option<usize> {
        match self.received.get(1..4)? {
            [a, b, c] => Some(((*a as usize) << 16) | ((*b as usize) << 8) | *c as usize),
            _ => None,
        }
    }

    /// Chip select asserted
    pub fn begin(&mut self) {
        self.received.clear();
    }

    /// Byte driven on MISO during the next byte period
    pub fn next_out(&self) -> u8 {
        let Some(&cmd) = self.received.first() else {
            return 0xFF;
        };
        let index = self.received.len();
        match cmd {
            RDID => {
                let id = [
                    self.config.manufacturer_id,
                    (self.config.device_id >> 8) as u8,
                    self.config.device_id as u8,
                ];
                id.get(index - 1).copied().unwrap_or(0xFF)
            }
            RDSR => self.status(),
            READ if index >= 4 => self
                .address()
                .and_then(|addr| self.data.get(addr + index - 4))
                .copied()
                .unwrap_or(0xFF),
            _ => 0xFF,
        }
    }

    /// Byte received on MOSI
    pub fn byte_in(&mut self, byte: u8) {
        self.received.push(byte);
        if self.received[0] == RDSR && self.received.len() > 1 {
            self.busy = self.busy.saturating_sub(1);
        }
    }

    /// Chip select released
    pub fn end(&mut self) {
        let Some(&cmd) = self.received.first() else {
            return;
        };
        match cmd {
            WREN => self.write_enabled = true,
            WRDI => self.write_enabled = false,
            WRSR => self.write_status(),
            PP => self.page_program(),
            SE_20 => self.erase_block(4 * 1024),
            BE_D8 => self.erase_block(64 * 1024),
            CE_60 | CE_C7 => {
                if self.writable() {
                    self.data.fill(0xFF);
                    self.finish_write();
                }
            }
            _ => {}
        }
        self.received.clear();
    }

    /// Any block protect bit locks the whole array
    fn writable(&self) -> bool {
        self.write_enabled && self.block_protect == 0
    }

    fn write_status(&mut self) {
        let Some(&value) = self.received.get(1) else {
            return;
        };
        if self.write_enabled {
            self.block_protect = value & SR1_BP;
            self.finish_write();
        }
    }

    fn finish_write(&mut self) {
        self.write_enabled = false;
        self.busy = self.config.busy_polls;
    }

    fn page_program(&mut self) {
        let Some(addr) = self.address() else {
            return;
        };
        if !self.writable() || self.received.len() <= 4 {
            return;
        }
        // Wraps within the 256-byte page like real parts
        let page = addr & !0xFF;
        for (i, byte) in self.received[4..].iter().enumerate() {
            let target = page | ((addr + i) & 0xFF);
            if let Some(cell) = self.data.get_mut(target) {
                *cell &= byte;
            }
        }
        self.finish_write();
    }

    fn erase_block(&mut self, size: usize) {
        let Some(addr) = self.address() else {
            return;
        };
        if !self.writable() {
            return;
        }
        let start = addr & !(size - 1);
        let end = (start + size).min(self.data.len());
        if start < end {
            self.data[start..end].fill(0xFF);
        }
        self.finish_write();
    }
}
