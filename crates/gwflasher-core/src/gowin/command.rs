//! Gowin JTAG instruction opcodes
//!
//! All instructions are 8 bits wide. References are to Gowin TN653
//! ("Programming Guide") and UG704 where the opcode is documented.

// ============================================================================
// Housekeeping
// ============================================================================

/// No operation, used to latch the previous instruction
pub const NOOP: u8 = 0x02;
/// Reload the configuration from flash
pub const RELOAD: u8 = 0x3C;

// ============================================================================
// Register reads (32-bit data register)
// ============================================================================

/// Read the JTAG idcode
pub const READ_IDCODE: u8 = 0x11;
/// Read the user code / checksum register
pub const READ_USERCODE: u8 = 0x13;
/// Read the configuration status register
pub const STATUS_REGISTER: u8 = 0x41;

// ============================================================================
// Configuration gate
// ============================================================================

/// Enter system edit mode
pub const CONFIG_ENABLE: u8 = 0x15;
/// Leave system edit mode
pub const CONFIG_DISABLE: u8 = 0x3A;

// ============================================================================
// SRAM
// ============================================================================

/// Read back SRAM content
pub const READ_SRAM: u8 = 0x03;
/// Erase the configuration SRAM
pub const ERASE_SRAM: u8 = 0x05;
/// Mark the end of a configuration transfer
pub const XFER_DONE: u8 = 0x09;
/// Reset the SRAM address counter (UG704 3.4.3)
pub const INIT_ADDR: u8 = 0x12;
/// Stream configuration data into SRAM
pub const XFER_WRITE: u8 = 0x17;
/// Announce the checksum word following an SRAM load
pub const SRAM_CHECKSUM_START: u8 = 0x0A;
/// Latch the checksum word following an SRAM load
pub const SRAM_CHECKSUM_END: u8 = 0x08;

// ============================================================================
// Embedded flash
// ============================================================================

/// Program one 256-byte flash page
pub const EF_PROGRAM: u8 = 0x71;
/// Erase the embedded flash
pub const EFLASH_ERASE: u8 = 0x75;

// ============================================================================
// External SPI flash and MCU
// ============================================================================

/// Route the data register straight to the SPI flash (GW2A)
pub const SPI_PASSTHROUGH: u8 = 0x16;
/// Hand the SPI flash pins to the boundary-scan register
pub const SPI_MODE_BSCAN: u8 = 0x3D;
/// Switch the JTAG chain to the embedded Cortex-M3 (GW1NSR-4C)
pub const SWITCH_TO_MCU_JTAG: u8 = 0x7A;
