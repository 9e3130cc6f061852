//! Scripted cable for unit tests

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec;
use alloc::vec::Vec;

use crate::error::Result;
use crate::jtag::{JtagCable, TapState};

/// Everything the cable saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Ir(u8),
    Dr(usize, TapState),
    State(TapState),
    Clk(u32),
    Flush,
    Sleep(u32),
}

type DrHook = Box<dyn FnMut(&[u8], &mut [u8])>;

pub struct ScriptedCable {
    pub idcode: u32,
    pub freq: u32,
    pub ir: u8,
    pub ir_writes: Vec<u8>,
    pub dr_writes: Vec<Vec<u8>>,
    pub dr_bits: Vec<usize>,
    pub states: Vec<TapState>,
    pub clocks: u64,
    pub events: Vec<Event>,
    /// 32-bit registers keyed by instruction, the last value sticks
    pub registers: BTreeMap<u8, VecDeque<u32>>,
    pub on_dr: Option<DrHook>,
}

impl ScriptedCable {
    pub fn new(idcode: u32) -> Self {
        Self {
            idcode,
            freq: 6_000_000,
            ir: 0,
            ir_writes: Vec::new(),
            dr_writes: Vec::new(),
            dr_bits: Vec::new(),
            states: Vec::new(),
            clocks: 0,
            events: Vec::new(),
            registers: BTreeMap::new(),
            on_dr: None,
        }
    }

    pub fn script(&mut self, cmd: u8, values: &[u32]) {
        self.registers.insert(cmd, values.iter().copied().collect());
    }

    fn register(&mut self, cmd: u8) -> Option<u32> {
        let queue = self.registers.get_mut(&cmd)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        }
    }
}

impl JtagCable for ScriptedCable {
    fn shift_ir(&mut self, data: &[u8], _bits: usize) -> Result<()> {
        self.ir = data[0];
        self.ir_writes.push(data[0]);
        self.events.push(Event::Ir(data[0]));
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
        let tx = tx.map(<[u8]>::to_vec).unwrap_or_else(|| vec![0; bytes]);
        let mut captured = vec![0u8; bytes];

        if bits == 32 {
            if let Some(value) = self.register(self.ir) {
                captured.copy_from_slice(&value.to_le_bytes());
            }
        }
        if let Some(hook) = self.on_dr.as_mut() {
            hook(&tx, &mut captured);
        }
        if let Some(rx) = rx {
            let n = rx.len().min(bytes);
            rx[..n].copy_from_slice(&captured[..n]);
        }

        self.dr_writes.push(tx);
        self.dr_bits.push(bits);
        self.events.push(Event::Dr(bits, end_state));
        Ok(())
    }

    fn set_state(&mut self, state: TapState) -> Result<()> {
        self.states.push(state);
        self.events.push(Event::State(state));
        Ok(())
    }

    fn toggle_clk(&mut self, cycles: u32) -> Result<()> {
        self.clocks += cycles as u64;
        self.events.push(Event::Clk(cycles));
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.events.push(Event::Flush);
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
        Ok(self.idcode)
    }

    fn sleep_ms(&mut self, ms: u32) {
        self.events.push(Event::Sleep(ms));
    }
}
