//! Divider/timer unit (DIV, TIMA, TMA, TAC).
//!
//! DIV advances every 256 cycles no matter what. TIMA accumulates raw
//! cycles in a sub-counter while TAC bit 2 is set and increments each time
//! the sub-counter crosses the selected threshold; overflow reloads from
//! TMA and requests a timer interrupt in the same batch. Rewriting TAC
//! re-checks the existing sub-counter against the new threshold right away,
//! so a frequency change can produce an immediate increment.

use crate::bus::BusDevice;
use crate::interrupts::{Interrupt, InterruptController};

pub const DIV_ADDR: u16 = 0xFF04;
pub const TIMA_ADDR: u16 = 0xFF05;
pub const TMA_ADDR: u16 = 0xFF06;
pub const TAC_ADDR: u16 = 0xFF07;

const DIV_PERIOD: u32 = 256;

#[derive(Debug, Default)]
pub struct Timer {
    pub div: u8,
    pub tima: u8,
    pub tma: u8,
    pub tac: u8,
    div_counter: u32,
    tima_counter: u32,
    irq_pending: bool,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    fn enabled(&self) -> bool {
        self.tac & 0x04 != 0
    }

    fn threshold(&self) -> u32 {
        match self.tac & 0x03 {
            0 => 1024,
            1 => 16,
            2 => 64,
            _ => 256,
        }
    }

    pub fn tick(&mut self, cycles: u32, interrupts: &mut InterruptController) {
        self.div_counter += cycles;
        while self.div_counter >= DIV_PERIOD {
            self.div_counter -= DIV_PERIOD;
            self.div = self.div.wrapping_add(1);
        }

        if self.enabled() {
            self.tima_counter += cycles;
            self.drain_sub_counter();
        }

        if self.irq_pending {
            self.irq_pending = false;
            interrupts.request(Interrupt::Timer);
        }
    }

    fn drain_sub_counter(&mut self) {
        let threshold = self.threshold();
        while self.tima_counter >= threshold {
            self.tima_counter -= threshold;
            let (next, overflow) = self.tima.overflowing_add(1);
            if overflow {
                self.tima = self.tma;
                self.irq_pending = true;
            } else {
                self.tima = next;
            }
        }
    }
}

impl BusDevice for Timer {
    fn claims(&self, addr: u16) -> bool {
        (DIV_ADDR..=TAC_ADDR).contains(&addr)
    }

    fn read(&self, addr: u16) -> u8 {
        match addr {
            DIV_ADDR => self.div,
            TIMA_ADDR => self.tima,
            TMA_ADDR => self.tma,
            _ => self.tac | 0xF8,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            DIV_ADDR => {
                self.div = 0;
                self.div_counter = 0;
            }
            TIMA_ADDR => self.tima = val,
            TMA_ADDR => self.tma = val,
            _ => {
                self.tac = val & 0x07;
                if self.enabled() {
                    self.drain_sub_counter();
                }
            }
        }
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
