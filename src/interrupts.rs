//! Interrupt controller: the IF/IE register pair and the fixed priority
//! order used when the CPU dispatches.

use crate::bus::BusDevice;

pub const IF_ADDR: u16 = 0xFF0F;
pub const IE_ADDR: u16 = 0xFFFF;

/// The five interrupt sources, in priority order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    VBlank,
    Stat,
    Timer,
    Serial,
    Joypad,
}

impl Interrupt {
    pub const fn mask(self) -> u8 {
        match self {
            Interrupt::VBlank => 0x01,
            Interrupt::Stat => 0x02,
            Interrupt::Timer => 0x04,
            Interrupt::Serial => 0x08,
            Interrupt::Joypad => 0x10,
        }
    }

    pub const fn vector(self) -> u16 {
        match self {
            Interrupt::VBlank => 0x0040,
            Interrupt::Stat => 0x0048,
            Interrupt::Timer => 0x0050,
            Interrupt::Serial => 0x0058,
            Interrupt::Joypad => 0x0060,
        }
    }
}

#[derive(Debug, Default)]
pub struct InterruptController {
    /// Pending flags, low 5 bits.
    pub if_reg: u8,
    /// Enable mask. All 8 bits are writable and read back.
    pub ie_reg: u8,
}

impl InterruptController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an interrupt pending.
    pub fn request(&mut self, interrupt: Interrupt) {
        self.if_reg |= interrupt.mask();
    }

    /// Pending-and-enabled bits.
    pub fn ready(&self) -> u8 {
        self.ie_reg & self.if_reg & 0x1F
    }

    /// Highest-priority interrupt among `bits` (VBlank > Stat > Timer >
    /// Serial > Joypad).
    pub fn highest_priority(bits: u8) -> Option<Interrupt> {
        if bits & 0x01 != 0 {
            Some(Interrupt::VBlank)
        } else if bits & 0x02 != 0 {
            Some(Interrupt::Stat)
        } else if bits & 0x04 != 0 {
            Some(Interrupt::Timer)
        } else if bits & 0x08 != 0 {
            Some(Interrupt::Serial)
        } else if bits & 0x10 != 0 {
            Some(Interrupt::Joypad)
        } else {
            None
        }
    }

    /// Clear an interrupt's pending bit (CPU dispatch).
    pub fn acknowledge(&mut self, interrupt: Interrupt) {
        self.if_reg &= !interrupt.mask();
    }
}

impl BusDevice for InterruptController {
    fn claims(&self, addr: u16) -> bool {
        addr == IF_ADDR || addr == IE_ADDR
    }

    fn read(&self, addr: u16) -> u8 {
        match addr {
            // Upper three bits of IF are unimplemented and read as 1.
            IF_ADDR => 0xE0 | (self.if_reg & 0x1F),
            _ => self.ie_reg,
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        match addr {
            IF_ADDR => self.if_reg = val & 0x1F,
            _ => self.ie_reg = val,
        }
    }

    fn reset(&mut self) {
        self.if_reg = 0;
        self.ie_reg = 0;
    }
}
