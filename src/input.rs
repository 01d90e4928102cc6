//! Joypad register (0xFF00) and edge-triggered input interrupt.
//!
//! The register exposes a 2x4 matrix: bits 4 and 5 select the d-pad and
//! button groups (0 selects), the low nibble reads the selected groups'
//! lines active-low. Pressing a button whose group is currently selected
//! pulls its line from 1 to 0, which requests the joypad interrupt.

use crate::bus::BusDevice;
use crate::interrupts::{Interrupt, InterruptController};

pub const JOYP_ADDR: u16 = 0xFF00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Right,
    Left,
    Up,
    Down,
    A,
    B,
    Select,
    Start,
}

impl Button {
    /// Group (true = d-pad) and line bit within the group's nibble.
    const fn line(self) -> (bool, u8) {
        match self {
            Button::Right => (true, 0x01),
            Button::Left => (true, 0x02),
            Button::Up => (true, 0x04),
            Button::Down => (true, 0x08),
            Button::A => (false, 0x01),
            Button::B => (false, 0x02),
            Button::Select => (false, 0x04),
            Button::Start => (false, 0x08),
        }
    }
}

#[derive(Debug, Default)]
pub struct Joypad {
    /// Select bits 4-5 as last written (0 selects the group).
    select: u8,
    /// Pressed state, 1 = held.
    dpad: u8,
    buttons: u8,
}

impl Joypad {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&mut self, button: Button, interrupts: &mut InterruptController) {
        let (is_dpad, bit) = button.line();
        let group = if is_dpad {
            &mut self.dpad
        } else {
            &mut self.buttons
        };
        let was_down = *group & bit != 0;
        *group |= bit;

        let selected = if is_dpad {
            self.select & 0x10 == 0
        } else {
            self.select & 0x20 == 0
        };
        if selected && !was_down {
            interrupts.request(Interrupt::Joypad);
        }
    }

    pub fn release(&mut self, button: Button) {
        let (is_dpad, bit) = button.line();
        if is_dpad {
            self.dpad &= !bit;
        } else {
            self.buttons &= !bit;
        }
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        let (is_dpad, bit) = button.line();
        let group = if is_dpad { self.dpad } else { self.buttons };
        group & bit != 0
    }
}

impl BusDevice for Joypad {
    fn claims(&self, addr: u16) -> bool {
        addr == JOYP_ADDR
    }

    fn read(&self, _addr: u16) -> u8 {
        // Bits 7-6 always read 1; the low nibble is read-only and ANDs
        // together every selected group, active-low.
        let mut low = 0x0F;
        if self.select & 0x10 == 0 {
            low &= !self.dpad & 0x0F;
        }
        if self.select & 0x20 == 0 {
            low &= !self.buttons & 0x0F;
        }
        0xC0 | self.select | low
    }

    fn write(&mut self, _addr: u16, val: u8) {
        self.select = val & 0x30;
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
