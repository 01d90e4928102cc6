//! SM83 CPU core: interrupt dispatch, instruction fetch/decode/execute.
//!
//! `execute` runs at most one instruction (or one interrupt entry) per call
//! and returns the T-cycles it consumed; the caller advances every clocked
//! device by that amount afterwards, so device-raised interrupts become
//! visible on the following call, never mid-instruction.

use crate::bus::Bus;
use crate::interrupts::{Interrupt, InterruptController};
use crate::isa::{self, Cond, Instruction, Op, Operand, Reg16, Reg8};
use crate::registers::{FLAG_C, FLAG_H, FLAG_N, FLAG_Z, Registers};

/// Interrupt entry: two idle machine cycles, two stack pushes, vector jump.
const INTERRUPT_DISPATCH_CYCLES: u32 = 20;

// Post-boot register state (DMG).
const BOOT_A: u8 = 0x01;
const BOOT_F: u8 = 0xB0;
const BOOT_B: u8 = 0x00;
const BOOT_C: u8 = 0x13;
const BOOT_D: u8 = 0x00;
const BOOT_E: u8 = 0xD8;
const BOOT_H: u8 = 0x01;
const BOOT_L: u8 = 0x4D;
const BOOT_PC: u16 = 0x0100;
const BOOT_SP: u16 = 0xFFFE;

#[derive(Debug, Default)]
pub struct Cpu {
    pub regs: Registers,
    /// Interrupt master enable. Gates dispatch only; IF bits still latch
    /// while it is clear.
    pub ime: bool,
    pub halted: bool,
    pub stopped: bool,
    /// Total T-cycles executed since power-on.
    pub cycles: u64,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register state as the boot ROM leaves it, for running without one.
    pub fn apply_post_boot_state(&mut self) {
        self.regs.a = BOOT_A;
        self.regs.f = BOOT_F;
        self.regs.b = BOOT_B;
        self.regs.c = BOOT_C;
        self.regs.d = BOOT_D;
        self.regs.e = BOOT_E;
        self.regs.h = BOOT_H;
        self.regs.l = BOOT_L;
        self.regs.pc = BOOT_PC;
        self.regs.sp = BOOT_SP;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Run one interrupt entry or one instruction and return its T-cycle
    /// cost. Stopped and halted states burn idle cycles instead.
    pub fn execute(&mut self, bus: &mut Bus) -> u32 {
        if self.stopped {
            self.cycles += 4;
            return 4;
        }

        let ready = bus.interrupts.ready();

        if self.halted {
            // HALT exits on any enabled pending interrupt, IME or not.
            if ready == 0 {
                self.cycles += 4;
                return 4;
            }
            self.halted = false;
        }

        if self.ime
            && let Some(interrupt) = InterruptController::highest_priority(ready)
        {
            return self.dispatch_interrupt(bus, interrupt);
        }

        self.step_instruction(bus)
    }

    fn dispatch_interrupt(&mut self, bus: &mut Bus, interrupt: Interrupt) -> u32 {
        #[cfg(feature = "cpu-trace")]
        eprintln!(
            "[INT] {:?} -> {:04X} from PC={:04X}",
            interrupt,
            interrupt.vector(),
            self.regs.pc
        );

        self.ime = false;
        bus.interrupts.acknowledge(interrupt);
        self.push_word(bus, self.regs.pc);
        self.regs.pc = interrupt.vector();
        self.cycles += INTERRUPT_DISPATCH_CYCLES as u64;
        INTERRUPT_DISPATCH_CYCLES
    }

    fn step_instruction(&mut self, bus: &mut Bus) -> u32 {
        #[cfg(feature = "cpu-trace")]
        let start_pc = self.regs.pc;

        let opcode = self.fetch8(bus);
        let inst = if opcode == 0xCB {
            let extended = self.fetch8(bus);
            isa::decode_extended(extended)
        } else {
            isa::decode(opcode)
        };

        #[cfg(feature = "cpu-trace")]
        eprintln!(
            "[CPU] {start_pc:04X}: {opcode:02X} {:?} {:?} AF:{:04X} BC:{:04X} DE:{:04X} HL:{:04X} SP:{:04X}",
            inst.op,
            inst.operand,
            self.regs.af(),
            self.regs.bc(),
            self.regs.de(),
            self.regs.hl(),
            self.regs.sp
        );

        let cycles = self.run(bus, inst);
        self.cycles += cycles as u64;
        cycles
    }

    fn fetch8(&mut self, bus: &Bus) -> u8 {
        let val = bus.read(self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        val
    }

    fn fetch16(&mut self, bus: &Bus) -> u16 {
        let lo = self.fetch8(bus) as u16;
        let hi = self.fetch8(bus) as u16;
        (hi << 8) | lo
    }

    fn push_word(&mut self, bus: &mut Bus, val: u16) {
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, (val >> 8) as u8);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        bus.write(self.regs.sp, val as u8);
    }

    fn pop_word(&mut self, bus: &Bus) -> u16 {
        let lo = bus.read(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = bus.read(self.regs.sp) as u16;
        self.regs.sp = self.regs.sp.wrapping_add(1);
        (hi << 8) | lo
    }

    fn reg8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.regs.a,
            Reg8::B => self.regs.b,
            Reg8::C => self.regs.c,
            Reg8::D => self.regs.d,
            Reg8::E => self.regs.e,
            Reg8::H => self.regs.h,
            Reg8::L => self.regs.l,
        }
    }

    fn set_reg8(&mut self, reg: Reg8, val: u8) {
        match reg {
            Reg8::A => self.regs.a = val,
            Reg8::B => self.regs.b = val,
            Reg8::C => self.regs.c = val,
            Reg8::D => self.regs.d = val,
            Reg8::E => self.regs.e = val,
            Reg8::H => self.regs.h = val,
            Reg8::L => self.regs.l = val,
        }
    }

    fn pair(&self, pair: Reg16) -> u16 {
        match pair {
            Reg16::Af => self.regs.af(),
            Reg16::Bc => self.regs.bc(),
            Reg16::De => self.regs.de(),
            Reg16::Hl => self.regs.hl(),
            Reg16::Sp => self.regs.sp,
        }
    }

    fn set_pair(&mut self, pair: Reg16, val: u16) {
        match pair {
            Reg16::Af => self.regs.set_af(val),
            Reg16::Bc => self.regs.set_bc(val),
            Reg16::De => self.regs.set_de(val),
            Reg16::Hl => self.regs.set_hl(val),
            Reg16::Sp => self.regs.sp = val,
        }
    }

    fn cond_met(&self, cond: Cond) -> bool {
        match cond {
            Cond::Nz => !self.regs.flag(FLAG_Z),
            Cond::Z => self.regs.flag(FLAG_Z),
            Cond::Nc => !self.regs.flag(FLAG_C),
            Cond::C => self.regs.flag(FLAG_C),
        }
    }

    /// Dispatch one decoded instruction. Returns the T-cycle cost, which
    /// for conditional control flow depends on whether the branch was
    /// taken. Operand bytes are fetched here, so PC always advances by the
    /// instruction's full length even on a failed condition.
    fn run(&mut self, bus: &mut Bus, inst: Instruction) -> u32 {
        let mut cycles = inst.cycles as u32;

        match inst.op {
            Op::Nop | Op::Invalid => {}
            Op::Stop => {
                // STOP carries a padding byte.
                let _ = self.fetch8(bus);
                self.stopped = true;
            }
            Op::Halt => self.halted = true,
            Op::Di => self.ime = false,
            Op::Ei => self.ime = true,

            Op::Ld => match inst.operand {
                Operand::RegReg(dst, src) => {
                    let val = self.reg8(src);
                    self.set_reg8(dst, val);
                }
                Operand::RegImm(dst) => {
                    let val = self.fetch8(bus);
                    self.set_reg8(dst, val);
                }
                Operand::PairImm(pair) => {
                    let val = self.fetch16(bus);
                    self.set_pair(pair, val);
                }
                Operand::RegPairPtr(dst, pair) => {
                    let val = bus.read(self.pair(pair));
                    self.set_reg8(dst, val);
                }
                Operand::PairPtrReg(pair, src) => {
                    bus.write(self.pair(pair), self.reg8(src));
                }
                Operand::PairPtrImm(pair) => {
                    let val = self.fetch8(bus);
                    bus.write(self.pair(pair), val);
                }
                Operand::RegHliPtr(dst) => {
                    let hl = self.regs.hl();
                    let val = bus.read(hl);
                    self.set_reg8(dst, val);
                    self.regs.set_hl(hl.wrapping_add(1));
                }
                Operand::RegHldPtr(dst) => {
                    let hl = self.regs.hl();
                    let val = bus.read(hl);
                    self.set_reg8(dst, val);
                    self.regs.set_hl(hl.wrapping_sub(1));
                }
                Operand::HliPtrReg(src) => {
                    let hl = self.regs.hl();
                    bus.write(hl, self.reg8(src));
                    self.regs.set_hl(hl.wrapping_add(1));
                }
                Operand::HldPtrReg(src) => {
                    let hl = self.regs.hl();
                    bus.write(hl, self.reg8(src));
                    self.regs.set_hl(hl.wrapping_sub(1));
                }
                Operand::AddrReg(src) => {
                    let addr = self.fetch16(bus);
                    bus.write(addr, self.reg8(src));
                }
                Operand::RegAddr(dst) => {
                    let addr = self.fetch16(bus);
                    let val = bus.read(addr);
                    self.set_reg8(dst, val);
                }
                Operand::AddrSp => {
                    let addr = self.fetch16(bus);
                    bus.write_word(addr, self.regs.sp);
                }
                Operand::HighImmReg(src) => {
                    let offset = self.fetch8(bus);
                    bus.write(0xFF00 | offset as u16, self.reg8(src));
                }
                Operand::RegHighImm(dst) => {
                    let offset = self.fetch8(bus);
                    let val = bus.read(0xFF00 | offset as u16);
                    self.set_reg8(dst, val);
                }
                Operand::HighCReg => {
                    bus.write(0xFF00 | self.regs.c as u16, self.regs.a);
                }
                Operand::RegHighC => {
                    self.regs.a = bus.read(0xFF00 | self.regs.c as u16);
                }
                Operand::SpHl => self.regs.sp = self.regs.hl(),
                Operand::HlSpImm => {
                    let val = self.add_sp_offset(bus);
                    self.regs.set_hl(val);
                }
                _ => unreachable!(),
            },

            Op::Push => match inst.operand {
                Operand::Pair(pair) => {
                    let val = self.pair(pair);
                    self.push_word(bus, val);
                }
                _ => unreachable!(),
            },
            Op::Pop => match inst.operand {
                Operand::Pair(pair) => {
                    let val = self.pop_word(bus);
                    self.set_pair(pair, val);
                }
                _ => unreachable!(),
            },

            Op::Add => match inst.operand {
                Operand::Reg(reg) => {
                    let val = self.reg8(reg);
                    self.alu_add(val, false);
                }
                Operand::PairPtr(pair) => {
                    let val = bus.read(self.pair(pair));
                    self.alu_add(val, false);
                }
                Operand::Imm => {
                    let val = self.fetch8(bus);
                    self.alu_add(val, false);
                }
                Operand::Pair(pair) => {
                    let val = self.pair(pair);
                    self.add16(val);
                }
                Operand::SpImm => {
                    self.regs.sp = self.add_sp_offset(bus);
                }
                _ => unreachable!(),
            },
            Op::Adc => {
                let val = self.alu_source(bus, inst.operand);
                self.alu_add(val, true);
            }
            Op::Sub => {
                let val = self.alu_source(bus, inst.operand);
                self.regs.a = self.alu_sub(val, false);
            }
            Op::Sbc => {
                let val = self.alu_source(bus, inst.operand);
                self.regs.a = self.alu_sub(val, true);
            }
            Op::And => {
                let val = self.alu_source(bus, inst.operand);
                self.regs.a &= val;
                self.regs.f = FLAG_H | if self.regs.a == 0 { FLAG_Z } else { 0 };
            }
            Op::Xor => {
                let val = self.alu_source(bus, inst.operand);
                self.regs.a ^= val;
                self.regs.f = if self.regs.a == 0 { FLAG_Z } else { 0 };
            }
            Op::Or => {
                let val = self.alu_source(bus, inst.operand);
                self.regs.a |= val;
                self.regs.f = if self.regs.a == 0 { FLAG_Z } else { 0 };
            }
            Op::Cp => {
                let val = self.alu_source(bus, inst.operand);
                let _ = self.alu_sub(val, false);
            }

            Op::Inc => match inst.operand {
                Operand::Reg(reg) => {
                    let res = self.alu_inc(self.reg8(reg));
                    self.set_reg8(reg, res);
                }
                Operand::PairPtr(pair) => {
                    let addr = self.pair(pair);
                    let res = self.alu_inc(bus.read(addr));
                    bus.write(addr, res);
                }
                Operand::Pair(pair) => {
                    // 16-bit INC touches no flags.
                    let val = self.pair(pair).wrapping_add(1);
                    self.set_pair(pair, val);
                }
                _ => unreachable!(),
            },
            Op::Dec => match inst.operand {
                Operand::Reg(reg) => {
                    let res = self.alu_dec(self.reg8(reg));
                    self.set_reg8(reg, res);
                }
                Operand::PairPtr(pair) => {
                    let addr = self.pair(pair);
                    let res = self.alu_dec(bus.read(addr));
                    bus.write(addr, res);
                }
                Operand::Pair(pair) => {
                    let val = self.pair(pair).wrapping_sub(1);
                    self.set_pair(pair, val);
                }
                _ => unreachable!(),
            },

            Op::Daa => self.daa(),
            Op::Cpl => {
                self.regs.a = !self.regs.a;
                self.regs.f |= FLAG_N | FLAG_H;
            }
            Op::Scf => {
                self.regs.f = (self.regs.f & FLAG_Z) | FLAG_C;
            }
            Op::Ccf => {
                self.regs.f = (self.regs.f & FLAG_Z) | ((self.regs.f ^ FLAG_C) & FLAG_C);
            }

            // Accumulator rotate short forms always clear Z.
            Op::Rlca => {
                let a = self.regs.a;
                self.regs.a = a.rotate_left(1);
                self.regs.f = if a & 0x80 != 0 { FLAG_C } else { 0 };
            }
            Op::Rrca => {
                let a = self.regs.a;
                self.regs.a = a.rotate_right(1);
                self.regs.f = if a & 0x01 != 0 { FLAG_C } else { 0 };
            }
            Op::Rla => {
                let a = self.regs.a;
                let carry_in = (self.regs.f & FLAG_C != 0) as u8;
                self.regs.a = (a << 1) | carry_in;
                self.regs.f = if a & 0x80 != 0 { FLAG_C } else { 0 };
            }
            Op::Rra => {
                let a = self.regs.a;
                let carry_in = (self.regs.f & FLAG_C != 0) as u8;
                self.regs.a = (a >> 1) | (carry_in << 7);
                self.regs.f = if a & 0x01 != 0 { FLAG_C } else { 0 };
            }

            Op::Jp => match inst.operand {
                Operand::Addr => {
                    self.regs.pc = self.fetch16(bus);
                }
                Operand::Pair(pair) => {
                    self.regs.pc = self.pair(pair);
                }
                Operand::CondAddr(cond) => {
                    let target = self.fetch16(bus);
                    if self.cond_met(cond) {
                        self.regs.pc = target;
                    } else {
                        cycles = inst.cycles_not_taken as u32;
                    }
                }
                _ => unreachable!(),
            },
            Op::Jr => match inst.operand {
                Operand::Rel => {
                    let offset = self.fetch8(bus) as i8;
                    self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                }
                Operand::CondRel(cond) => {
                    let offset = self.fetch8(bus) as i8;
                    if self.cond_met(cond) {
                        self.regs.pc = self.regs.pc.wrapping_add(offset as i16 as u16);
                    } else {
                        cycles = inst.cycles_not_taken as u32;
                    }
                }
                _ => unreachable!(),
            },
            Op::Call => match inst.operand {
                Operand::Addr => {
                    let target = self.fetch16(bus);
                    self.push_word(bus, self.regs.pc);
                    self.regs.pc = target;
                }
                Operand::CondAddr(cond) => {
                    let target = self.fetch16(bus);
                    if self.cond_met(cond) {
                        self.push_word(bus, self.regs.pc);
                        self.regs.pc = target;
                    } else {
                        cycles = inst.cycles_not_taken as u32;
                    }
                }
                _ => unreachable!(),
            },
            Op::Ret => match inst.operand {
                Operand::Implied => {
                    self.regs.pc = self.pop_word(bus);
                }
                Operand::CondImplied(cond) => {
                    if self.cond_met(cond) {
                        self.regs.pc = self.pop_word(bus);
                    } else {
                        cycles = inst.cycles_not_taken as u32;
                    }
                }
                _ => unreachable!(),
            },
            Op::Reti => {
                self.regs.pc = self.pop_word(bus);
                self.ime = true;
            }
            Op::Rst => match inst.operand {
                Operand::Vector(vector) => {
                    self.push_word(bus, self.regs.pc);
                    self.regs.pc = vector as u16;
                }
                _ => unreachable!(),
            },

            Op::Rlc | Op::Rrc | Op::Rl | Op::Rr | Op::Sla | Op::Sra | Op::Swap | Op::Srl => {
                let val = self.shift_target_read(bus, inst.operand);
                let res = match inst.op {
                    Op::Rlc => self.alu_rlc(val),
                    Op::Rrc => self.alu_rrc(val),
                    Op::Rl => self.alu_rl(val),
                    Op::Rr => self.alu_rr(val),
                    Op::Sla => self.alu_sla(val),
                    Op::Sra => self.alu_sra(val),
                    Op::Swap => self.alu_swap(val),
                    _ => self.alu_srl(val),
                };
                self.shift_target_write(bus, inst.operand, res);
            }

            Op::Bit => {
                let (bit, val) = self.bit_target_read(bus, inst.operand);
                self.regs.f = (self.regs.f & FLAG_C)
                    | FLAG_H
                    | if val & (1 << bit) == 0 { FLAG_Z } else { 0 };
            }
            Op::Res => {
                let (bit, val) = self.bit_target_read(bus, inst.operand);
                self.bit_target_write(bus, inst.operand, val & !(1 << bit));
            }
            Op::Set => {
                let (bit, val) = self.bit_target_read(bus, inst.operand);
                self.bit_target_write(bus, inst.operand, val | (1 << bit));
            }

            // The escape byte itself never reaches dispatch; the fetch loop
            // decodes the byte after it instead.
            Op::Prefix => unreachable!(),
        }

        cycles
    }

    /// Source value for the accumulator-implicit ALU forms.
    fn alu_source(&mut self, bus: &Bus, operand: Operand) -> u8 {
        match operand {
            Operand::Reg(reg) => self.reg8(reg),
            Operand::PairPtr(pair) => bus.read(self.pair(pair)),
            Operand::Imm => self.fetch8(bus),
            _ => unreachable!(),
        }
    }

    fn shift_target_read(&self, bus: &Bus, operand: Operand) -> u8 {
        match operand {
            Operand::Reg(reg) => self.reg8(reg),
            Operand::PairPtr(pair) => bus.read(self.pair(pair)),
            _ => unreachable!(),
        }
    }

    fn shift_target_write(&mut self, bus: &mut Bus, operand: Operand, val: u8) {
        match operand {
            Operand::Reg(reg) => self.set_reg8(reg, val),
            Operand::PairPtr(pair) => bus.write(self.pair(pair), val),
            _ => unreachable!(),
        }
    }

    fn bit_target_read(&self, bus: &Bus, operand: Operand) -> (u8, u8) {
        match operand {
            Operand::BitReg(bit, reg) => (bit, self.reg8(reg)),
            Operand::BitHlPtr(bit) => (bit, bus.read(self.regs.hl())),
            _ => unreachable!(),
        }
    }

    fn bit_target_write(&mut self, bus: &mut Bus, operand: Operand, val: u8) {
        match operand {
            Operand::BitReg(_, reg) => self.set_reg8(reg, val),
            Operand::BitHlPtr(_) => bus.write(self.regs.hl(), val),
            _ => unreachable!(),
        }
    }

    fn alu_add(&mut self, val: u8, use_carry: bool) {
        let a = self.regs.a;
        let carry = (use_carry && self.regs.f & FLAG_C != 0) as u8;
        let res = a.wrapping_add(val).wrapping_add(carry);
        let mut f = 0;
        if res == 0 {
            f |= FLAG_Z;
        }
        if (a & 0x0F) + (val & 0x0F) + carry > 0x0F {
            f |= FLAG_H;
        }
        if (a as u16) + (val as u16) + (carry as u16) > 0xFF {
            f |= FLAG_C;
        }
        self.regs.a = res;
        self.regs.f = f;
    }

    fn alu_sub(&mut self, val: u8, use_carry: bool) -> u8 {
        let a = self.regs.a;
        let carry = (use_carry && self.regs.f & FLAG_C != 0) as u8;
        let res = a.wrapping_sub(val).wrapping_sub(carry);
        let mut f = FLAG_N;
        if res == 0 {
            f |= FLAG_Z;
        }
        if (a & 0x0F) < (val & 0x0F) + carry {
            f |= FLAG_H;
        }
        if (a as u16) < (val as u16) + (carry as u16) {
            f |= FLAG_C;
        }
        self.regs.f = f;
        res
    }

    fn alu_inc(&mut self, val: u8) -> u8 {
        let res = val.wrapping_add(1);
        self.regs.f = (self.regs.f & FLAG_C)
            | if res == 0 { FLAG_Z } else { 0 }
            | if (val & 0x0F) + 1 > 0x0F { FLAG_H } else { 0 };
        res
    }

    fn alu_dec(&mut self, val: u8) -> u8 {
        let res = val.wrapping_sub(1);
        self.regs.f = (self.regs.f & FLAG_C)
            | FLAG_N
            | if res == 0 { FLAG_Z } else { 0 }
            | if val & 0x0F == 0 { FLAG_H } else { 0 };
        res
    }

    /// ADD HL, rr: half-carry from bit 11, carry from bit 15, Z untouched.
    fn add16(&mut self, val: u16) {
        let hl = self.regs.hl();
        let (res, overflow) = hl.overflowing_add(val);
        self.regs.f = (self.regs.f & FLAG_Z)
            | if (hl & 0x0FFF) + (val & 0x0FFF) > 0x0FFF {
                FLAG_H
            } else {
                0
            }
            | if overflow { FLAG_C } else { 0 };
        self.regs.set_hl(res);
    }

    /// ADD SP, e8 and LD HL, SP+e8: flags come from unsigned addition of
    /// the offset byte to SP's low byte; Z and N are always clear.
    fn add_sp_offset(&mut self, bus: &Bus) -> u16 {
        let offset = self.fetch8(bus);
        let sp = self.regs.sp;
        let mut f = 0;
        if (sp & 0x000F) + (offset as u16 & 0x000F) > 0x000F {
            f |= FLAG_H;
        }
        if (sp & 0x00FF) + offset as u16 > 0x00FF {
            f |= FLAG_C;
        }
        self.regs.f = f;
        sp.wrapping_add(offset as i8 as i16 as u16)
    }

    fn daa(&mut self) {
        let mut a = self.regs.a;
        let mut carry = self.regs.flag(FLAG_C);
        if self.regs.flag(FLAG_N) {
            // After a subtraction only the recorded carries matter.
            if self.regs.flag(FLAG_H) {
                a = a.wrapping_sub(0x06);
            }
            if carry {
                a = a.wrapping_sub(0x60);
            }
        } else {
            let mut adjust = 0;
            if self.regs.flag(FLAG_H) || a & 0x0F > 0x09 {
                adjust |= 0x06;
            }
            if carry || a > 0x99 {
                adjust |= 0x60;
                carry = true;
            }
            a = a.wrapping_add(adjust);
        }
        self.regs.a = a;
        self.regs.f = (self.regs.f & FLAG_N)
            | if a == 0 { FLAG_Z } else { 0 }
            | if carry { FLAG_C } else { 0 };
    }

    fn set_shift_flags(&mut self, res: u8, carry: bool) {
        self.regs.f = if res == 0 { FLAG_Z } else { 0 } | if carry { FLAG_C } else { 0 };
    }

    fn alu_rlc(&mut self, val: u8) -> u8 {
        let res = val.rotate_left(1);
        self.set_shift_flags(res, val & 0x80 != 0);
        res
    }

    fn alu_rrc(&mut self, val: u8) -> u8 {
        let res = val.rotate_right(1);
        self.set_shift_flags(res, val & 0x01 != 0);
        res
    }

    fn alu_rl(&mut self, val: u8) -> u8 {
        let carry_in = (self.regs.f & FLAG_C != 0) as u8;
        let res = (val << 1) | carry_in;
        self.set_shift_flags(res, val & 0x80 != 0);
        res
    }

    fn alu_rr(&mut self, val: u8) -> u8 {
        let carry_in = (self.regs.f & FLAG_C != 0) as u8;
        let res = (val >> 1) | (carry_in << 7);
        self.set_shift_flags(res, val & 0x01 != 0);
        res
    }

    fn alu_sla(&mut self, val: u8) -> u8 {
        let res = val << 1;
        self.set_shift_flags(res, val & 0x80 != 0);
        res
    }

    fn alu_sra(&mut self, val: u8) -> u8 {
        // Arithmetic shift keeps the sign bit.
        let res = (val >> 1) | (val & 0x80);
        self.set_shift_flags(res, val & 0x01 != 0);
        res
    }

    fn alu_swap(&mut self, val: u8) -> u8 {
        let res = val.rotate_left(4);
        self.set_shift_flags(res, false);
        res
    }

    fn alu_srl(&mut self, val: u8) -> u8 {
        let res = val >> 1;
        self.set_shift_flags(res, val & 0x01 != 0);
        res
    }
}
