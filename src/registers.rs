//! CPU register file: eight 8-bit registers, the 16-bit PC/SP, and the
//! flag bits packed into the high nibble of F.

/// Zero flag (bit 7 of F).
pub const FLAG_Z: u8 = 0x80;
/// Subtract flag (bit 6 of F).
pub const FLAG_N: u8 = 0x40;
/// Half-carry flag (bit 5 of F).
pub const FLAG_H: u8 = 0x20;
/// Carry flag (bit 4 of F).
pub const FLAG_C: u8 = 0x10;

/// The low nibble of F never holds data; every write masks with this.
const F_MASK: u8 = 0xF0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub pc: u16,
    pub sp: u16,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn af(&self) -> u16 {
        ((self.a as u16) << 8) | self.f as u16
    }

    pub fn set_af(&mut self, val: u16) {
        self.a = (val >> 8) as u8;
        self.f = val as u8 & F_MASK;
    }

    pub fn bc(&self) -> u16 {
        ((self.b as u16) << 8) | self.c as u16
    }

    pub fn set_bc(&mut self, val: u16) {
        self.b = (val >> 8) as u8;
        self.c = val as u8;
    }

    pub fn de(&self) -> u16 {
        ((self.d as u16) << 8) | self.e as u16
    }

    pub fn set_de(&mut self, val: u16) {
        self.d = (val >> 8) as u8;
        self.e = val as u8;
    }

    pub fn hl(&self) -> u16 {
        ((self.h as u16) << 8) | self.l as u16
    }

    pub fn set_hl(&mut self, val: u16) {
        self.h = (val >> 8) as u8;
        self.l = val as u8;
    }

    pub fn set_f(&mut self, val: u8) {
        self.f = val & F_MASK;
    }

    pub fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    pub fn set_flag(&mut self, mask: u8, on: bool) {
        if on {
            self.f |= mask;
        } else {
            self.f &= !mask;
        }
        self.f &= F_MASK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_pack_and_unpack() {
        let mut regs = Registers::new();
        regs.set_bc(0x1234);
        assert_eq!(regs.b, 0x12);
        assert_eq!(regs.c, 0x34);
        assert_eq!(regs.bc(), 0x1234);

        regs.set_hl(0xBEEF);
        assert_eq!(regs.hl(), 0xBEEF);
    }

    #[test]
    fn f_low_nibble_always_zero() {
        let mut regs = Registers::new();
        regs.set_af(0xABCD);
        assert_eq!(regs.f, 0xC0);
        assert_eq!(regs.af(), 0xABC0);

        regs.set_f(0xFF);
        assert_eq!(regs.f, 0xF0);
    }

    #[test]
    fn flag_helpers() {
        let mut regs = Registers::new();
        regs.set_flag(FLAG_Z, true);
        regs.set_flag(FLAG_C, true);
        assert!(regs.flag(FLAG_Z));
        assert!(!regs.flag(FLAG_N));
        regs.set_flag(FLAG_Z, false);
        assert_eq!(regs.f, FLAG_C);
    }
}
