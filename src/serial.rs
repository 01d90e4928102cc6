//! Serial transfer unit (SB/SC).
//!
//! Models the byte-shift timing of an internally-clocked transfer with no
//! link partner attached: the line reads all 1s, so 0xFF shifts in while
//! the outgoing byte shifts out. Completed outgoing bytes are captured in
//! an output buffer for headless harnesses. Externally-clocked transfers
//! (SC bit 0 clear) stay pending forever, as on hardware with no cable.

use crate::bus::BusDevice;
use crate::interrupts::{Interrupt, InterruptController};

pub const SB_ADDR: u16 = 0xFF01;
pub const SC_ADDR: u16 = 0xFF02;

/// 8192 Hz transfer clock: one bit every 512 cycles.
const CYCLES_PER_BIT: u32 = 512;

#[derive(Debug)]
struct TransferState {
    remaining_bits: u8,
    outgoing: u8,
    countdown: u32,
}

#[derive(Debug, Default)]
pub struct Serial {
    sb: u8,
    sc: u8,
    out_buf: Vec<u8>,
    transfer: Option<TransferState>,
}

impl Serial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&mut self, cycles: u32, interrupts: &mut InterruptController) {
        let Some(state) = self.transfer.as_mut() else {
            return;
        };
        // External clock: no partner means no clock edges.
        if self.sc & 0x01 == 0 {
            return;
        }

        let mut budget = cycles;
        while budget >= state.countdown {
            budget -= state.countdown;
            state.countdown = CYCLES_PER_BIT;
            self.sb = (self.sb << 1) | 1;
            state.remaining_bits -= 1;
            if state.remaining_bits == 0 {
                let outgoing = state.outgoing;
                self.transfer = None;
                self.sc &= 0x7F;
                self.out_buf.push(outgoing);
                interrupts.request(Interrupt::Serial);
                return;
            }
        }
        state.countdown -= budget;
    }

    /// Drain the bytes this machine has sent since the last call.
    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out_buf)
    }

    pub fn peek_output(&self) -> &[u8] {
        &self.out_buf
    }
}

impl BusDevice for Serial {
    fn claims(&self, addr: u16) -> bool {
        addr == SB_ADDR || addr == SC_ADDR
    }

    fn read(&self, addr: u16) -> u8 {
        match addr {
            SB_ADDR => self.sb,
            _ => self.sc | 0x7E,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            SB_ADDR => self.sb = val,
            _ => {
                self.sc = val & 0x81;
                if val & 0x80 != 0 {
                    // Start (or restart) shifting the current SB value.
                    self.transfer = Some(TransferState {
                        remaining_bits: 8,
                        outgoing: self.sb,
                        countdown: CYCLES_PER_BIT,
                    });
                } else {
                    self.transfer = None;
                }
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
