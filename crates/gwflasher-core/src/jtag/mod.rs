//! JTAG transport abstraction
//!
//! The Gowin protocol only needs a handful of primitives from the adapter:
//! shifting the instruction and data registers, moving the TAP state machine,
//! free-running the clock and flushing whatever the adapter queued. Any USB
//! cable (or the simulator in `gwflasher-dummy`) implements [`JtagCable`].
//!
//! Data is always passed LSB first: bit 0 of byte 0 is the first bit shifted
//! into TDI, and captured TDO bits are stored the same way.

use crate::error::Result;

/// JTAG TAP controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapState {
    /// Test-Logic-Reset
    TestLogicReset,
    /// Run-Test/Idle
    RunTestIdle,
    /// Select-DR-Scan
    SelectDr,
    /// Capture-DR
    CaptureDr,
    /// Shift-DR
    ShiftDr,
    /// Exit1-DR
    Exit1Dr,
    /// Pause-DR
    PauseDr,
    /// Exit2-DR
    Exit2Dr,
    /// Update-DR
    UpdateDr,
    /// Select-IR-Scan
    SelectIr,
    /// Capture-IR
    CaptureIr,
    /// Shift-IR
    ShiftIr,
    /// Exit1-IR
    Exit1Ir,
    /// Pause-IR
    PauseIr,
    /// Exit2-IR
    Exit2Ir,
    /// Update-IR
    UpdateIr,
}

/// Low-level JTAG adapter
///
/// Implementations are free to queue operations; nothing is guaranteed to
/// have reached the target until [`flush`](JtagCable::flush) returns, except
/// for shifts that capture TDO, which must complete before returning.
pub trait JtagCable {
    /// Shift `bits` bits of `data` into the instruction register and return
    /// to Run-Test/Idle
    fn shift_ir(&mut self, data: &[u8], bits: usize) -> Result<()>;

    /// Shift `bits` bits through the data register
    ///
    /// `tx` of `None` shifts zeros. When `rx` is given the captured TDO bits
    /// are written into it. The TAP is left in `end_state` afterwards; passing
    /// [`TapState::ShiftDr`] keeps the register open so the next call
    /// continues the same scan.
    fn shift_dr(
        &mut self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
        bits: usize,
        end_state: TapState,
    ) -> Result<()>;

    /// Move the TAP state machine to `state`
    fn set_state(&mut self, state: TapState) -> Result<()>;

    /// Generate `cycles` TCK pulses without changing state
    fn toggle_clk(&mut self, cycles: u32) -> Result<()>;

    /// Push queued operations to the target
    fn flush(&mut self) -> Result<()>;

    /// Current TCK frequency in Hz
    fn clk_freq(&self) -> u32;

    /// Request a TCK frequency, returns the frequency actually applied
    fn set_clk_freq(&mut self, hz: u32) -> Result<u32>;

    /// Idcode of the target device on the chain
    fn read_idcode(&mut self) -> Result<u32>;

    /// Block for `ms` milliseconds of wall-clock time
    fn sleep_ms(&mut self, ms: u32);
}

// Blanket impl for boxed cables so the CLI can pick one at runtime
impl JtagCable for alloc::boxed::Box<dyn JtagCable + Send> {
    fn shift_ir(&mut self, data: &[u8], bits: usize) -> Result<()> {
        (**self).shift_ir(data, bits)
    }

    fn shift_dr(
        &mut self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
        bits: usize,
        end_state: TapState,
    ) -> Result<()> {
        (**self).shift_dr(tx, rx, bits, end_state)
    }

    fn set_state(&mut self, state: TapState) -> Result<()> {
        (**self).set_state(state)
    }

    fn toggle_clk(&mut self, cycles: u32) -> Result<()> {
        (**self).toggle_clk(cycles)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn clk_freq(&self) -> u32 {
        (**self).clk_freq()
    }

    fn set_clk_freq(&mut self, hz: u32) -> Result<u32> {
        (**self).set_clk_freq(hz)
    }

    fn read_idcode(&mut self) -> Result<u32> {
        (**self).read_idcode()
    }

    fn sleep_ms(&mut self, ms: u32) {
        (**self).sleep_ms(ms)
    }
}

impl<T: JtagCable + ?Sized> JtagCable for &mut T {
    fn shift_ir(&mut self, data: &[u8], bits: usize) -> Result<()> {
        (**self).shift_ir(data, bits)
    }

    fn shift_dr(
        &mut self,
        tx: Option<&[u8]>,
        rx: Option<&mut [u8]>,
        bits: usize,
        end_state: TapState,
    ) -> Result<()> {
        (**self).shift_dr(tx, rx, bits, end_state)
    }

    fn set_state(&mut self, state: TapState) -> Result<()> {
        (**self).set_state(state)
    }

    fn toggle_clk(&mut self, cycles: u32) -> Result<()> {
        (**self).toggle_clk(cycles)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn clk_freq(&self) -> u32 {
        (**self).clk_freq()
    }

    fn set_clk_freq(&mut self, hz: u32) -> Result<u32> {
        (**self).set_clk_freq(hz)
    }

    fn read_idcode(&mut self) -> Result<u32> {
        (**self).read_idcode()
    }

    fn sleep_ms(&mut self, ms: u32) {
        (**self).sleep_ms(ms)
    }
}
