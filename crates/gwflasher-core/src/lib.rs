//! gwflasher-core - Core library for Gowin FPGA programming
//!
//! This crate implements the device-side protocol used to load Gowin FPGAs
//! over JTAG: volatile SRAM configuration, on-chip flash programming and a
//! bit-banged SPI bus over boundary-scan for external SPI flash chips. It is
//! designed to be `no_std` compatible (it needs `alloc` for image buffers).
//!
//! The raw JTAG adapter is not part of this crate. Anything implementing
//! [`jtag::JtagCable`] can drive a [`gowin::Gowin`] session.
//!
//! # Features
//!
//! - `std` - Implement `std::error::Error` for the core error type
//!
//! # Example
//!
//! ```ignore
//! use gwflasher_core::gowin::{Gowin, ProgramConfig, Programmable};
//! use gwflasher_core::image::Bitstream;
//!
//! fn load<C: gwflasher_core::jtag::JtagCable>(cable: C, image: Bitstream) {
//!     let config = ProgramConfig::sram(Box::new(image));
//!     let mut fpga = Gowin::open(cable, config).unwrap();
//!     fpga.program(0).unwrap();
//! }
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod gowin;
pub mod image;
pub mod jtag;
pub mod progress;
pub mod spi;

pub use error::{Error, Result};
