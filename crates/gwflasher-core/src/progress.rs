//! Progress reporting for long-running operations

/// Which operation is reporting progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Streaming a bitstream into SRAM (units: bits)
    LoadSram,
    /// Erasing the embedded flash (units: attempts)
    EraseFlash,
    /// Writing embedded flash pages (units: bytes)
    WriteFlash,
}

impl Stage {
    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Stage::LoadSram => "Load SRAM",
            Stage::EraseFlash => "Erasing FLASH",
            Stage::WriteFlash => "Writing to FLASH",
        }
    }
}

/// Progress sink, implemented by the CLI with progress bars
pub trait Progress {
    /// Called when a stage starts, `total` is in stage units
    fn start(&mut self, stage: Stage, total: usize);

    /// Called with the amount done so far
    fn advance(&mut self, done: usize);

    /// Called when the stage ends
    fn finish(&mut self, ok: bool);
}

/// A no-op progress reporter
pub struct NoProgress;

impl Progress for NoProgress {
    fn start(&mut self, _stage: Stage, _total: usize) {}
    fn advance(&mut self, _done: usize) {}
    fn finish(&mut self, _ok: bool) {}
}
