//! CLI command implementations
//!
//! Every command opens the cable named by the programmer string, identifies
//! the FPGA through [`Gowin::open`](gwflasher_core::gowin::Gowin::open) and
//! then drives it through the core library.

mod device;
mod list;
mod program;

pub use device::{run_erase, run_idcode, run_reset, run_status};
pub use list::{list_devices, list_programmers};
pub use program::{run_program, ProgramOptions};
